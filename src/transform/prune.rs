//! Unused value pruning.

use dag::Graph;

use crate::diag::Diagnostics;
use crate::transform::{GraphTransformer, TransformError};
use crate::vertex::Vertex;

/// Removes locals, input variables, and outputs that nothing depends
/// on. A value whose only dependant is a destroy-output counts as
/// unused too. Removing one value can orphan another, so the sweep
/// repeats until a fixpoint.
///
/// Root-module outputs are kept unless this is a destroy, where they
/// are surplus like everything else.
pub struct PruneUnusedValuesTransformer {
    pub destroy: bool,
}

impl GraphTransformer for PruneUnusedValuesTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        loop {
            let mut removed = 0;
            for id in graph.ids() {
                let Some(vertex) = graph.get(id) else {
                    continue;
                };
                if !vertex.is_prunable_value(self.destroy) {
                    continue;
                }

                let dependants = graph.up_edges(id);
                let unused = match dependants.as_slice() {
                    [] => true,
                    [only] => graph
                        .get(*only)
                        .is_some_and(Vertex::is_destroy_output),
                    _ => false,
                };
                if unused {
                    if let Some(vertex) = graph.remove(id) {
                        log::trace!("prune: removing unused value {vertex}");
                        removed += 1;
                    }
                }
            }
            if removed == 0 {
                return Ok(());
            }
        }
    }
}
