//! State and dependency attachment passes.

use std::collections::BTreeMap;

use dag::Graph;

use addrs::{AbsResource, ResourceMode};

use crate::diag::Diagnostics;
use crate::state::{StateSnapshot, legacy_instance_id};
use crate::transform::{GraphTransformer, TransformError};
use crate::vertex::Vertex;

/// Attaches each instance vertex's existing state record, when one
/// exists.
pub struct AttachStateTransformer {
    pub state: StateSnapshot,
}

impl GraphTransformer for AttachStateTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        for id in graph.ids() {
            let Some(addr) = graph.get(id).and_then(|v| v.instance_addr()).cloned() else {
                continue;
            };
            let state_id = legacy_instance_id(&addr);
            if let Some(record) = self.state.get(&state_id) {
                log::trace!("attach state: {state_id}");
                if let Some(vertex) = graph.get_mut(id) {
                    vertex.attach_state(record.clone());
                }
            }
        }
        Ok(())
    }
}

/// Records, on each managed instance, the distinct absolute resources
/// it transitively depends on. The list excludes data resources and the
/// instance's own resource, is deduplicated, and is sorted on rendered
/// addresses so equal inputs always produce equal lists. It is what
/// gets persisted into state for destroy ordering later.
pub struct AttachDependenciesTransformer;

impl GraphTransformer for AttachDependenciesTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        for id in graph.ids() {
            let Some(vertex) = graph.get(id) else {
                continue;
            };
            if !vertex.wants_dependencies() {
                continue;
            }
            let Some(self_addr) = vertex.resource_addr() else {
                continue;
            };

            let mut dep_map: BTreeMap<String, AbsResource> = BTreeMap::new();
            for ancestor in graph.ancestors(id) {
                let Some(addr) = graph.get(ancestor).and_then(|v| v.resource_addr()) else {
                    continue;
                };
                if addr.resource.mode == ResourceMode::Data {
                    continue;
                }
                if addr == self_addr {
                    continue;
                }
                dep_map.insert(addr.to_string(), addr);
            }

            let deps: Vec<AbsResource> = dep_map.into_values().collect();
            log::trace!(
                "attach dependencies: {} depends on {:?}",
                vertex,
                deps.iter().map(|d| d.to_string()).collect::<Vec<_>>()
            );
            if let Some(vertex) = graph.get_mut(id) {
                vertex.attach_dependencies(deps);
            }
        }
        Ok(())
    }
}
