//! Count expansion and count orphan detection.

use dag::Graph;

use addrs::{AbsResource, InstanceKey};

use crate::diag::Diagnostics;
use crate::state::StateSnapshot;
use crate::transform::{GraphTransformer, TransformError};
use crate::vertex::{InstanceNode, Vertex};

/// Builds the concrete vertex for one instance. The same count pass can
/// emit planning, refresh, or destroy flavors depending on the factory
/// the caller supplies.
pub type InstanceFactory = Box<dyn Fn(InstanceNode) -> Vertex>;

/// Expands one declared resource into its instances: `count` many keyed
/// vertices, or a single no-key vertex when count is unset (-1).
pub struct CountTransformer {
    pub concrete: InstanceFactory,
    pub count: i64,
    pub addr: AbsResource,
}

impl GraphTransformer for CountTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        if self.count < 0 {
            let node = InstanceNode::new(self.addr.instance(None));
            log::trace!("count: adding single instance {}", node.addr);
            graph.add((self.concrete)(node));
            return Ok(());
        }

        for i in 0..self.count as u64 {
            let node = InstanceNode::new(self.addr.instance(Some(InstanceKey::Index(i))));
            log::trace!("count: adding instance {}", node.addr);
            graph.add((self.concrete)(node));
        }
        Ok(())
    }
}

/// Emits destroyable vertices for state instances the new count no
/// longer covers: indexes at or beyond the count, every keyed instance
/// when count went away, and a stale no-key instance when count is now
/// set.
pub struct OrphanCountTransformer {
    pub concrete: InstanceFactory,
    pub count: i64,
    pub addr: AbsResource,
    pub state: StateSnapshot,
}

impl OrphanCountTransformer {
    fn is_orphan(&self, key: &Option<InstanceKey>) -> bool {
        match (self.count, key) {
            // Count unset: every keyed instance is surplus.
            (c, Some(_)) if c < 0 => true,
            (c, None) if c < 0 => false,
            // Count set: the no-key instance should have been renamed
            // to [0]; if it is still here it is surplus.
            (_, None) => true,
            (c, Some(InstanceKey::Index(i))) => *i >= c as u64,
            // String keys are not produced by count; leave them alone.
            (_, Some(InstanceKey::Str(_))) => false,
        }
    }
}

impl GraphTransformer for OrphanCountTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        for (key, id) in self.state.instances_of(&self.addr) {
            if !self.is_orphan(&key) {
                continue;
            }
            log::trace!("count orphan: adding destroy vertex for {id}");
            let node = InstanceNode::new(self.addr.instance(key));
            graph.add((self.concrete)(node));
        }
        Ok(())
    }
}
