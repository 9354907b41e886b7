//! Operator-supplied targeting.

use std::collections::BTreeSet;

use dag::Graph;

use addrs::Address;

use crate::diag::Diagnostics;
use crate::transform::{GraphTransformer, TransformError};
use crate::vertex::Vertex;

/// Prunes the graph down to the vertices matching the operator's target
/// addresses plus everything those vertices depend on. An empty target
/// list targets everything.
pub struct TargetsTransformer {
    pub targets: Vec<Address>,
}

impl TargetsTransformer {
    fn matches(&self, vertex: &Vertex) -> bool {
        self.targets.iter().any(|t| target_matches(t, vertex))
    }
}

fn target_matches(target: &Address, vertex: &Vertex) -> bool {
    match target {
        Address::Module(path) => vertex
            .path()
            .is_some_and(|p| p.steps().starts_with(path.steps())),
        Address::Resource(r) => vertex
            .resource_addr()
            .is_some_and(|addr| addr.resource == *r),
        Address::ResourceInstance(ri) => vertex
            .instance_addr()
            .is_some_and(|addr| addr.instance == *ri),
        _ => false,
    }
}

impl GraphTransformer for TargetsTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        if self.targets.is_empty() {
            return Ok(());
        }

        let mut keep = BTreeSet::new();
        for (id, vertex) in graph.vertices() {
            if self.matches(vertex) {
                keep.insert(id);
                keep.extend(graph.ancestors(id));
            }
        }

        for id in graph.ids() {
            if !keep.contains(&id) {
                if let Some(vertex) = graph.remove(id) {
                    log::trace!("targets: pruning {vertex}");
                }
            }
        }
        Ok(())
    }
}
