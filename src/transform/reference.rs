//! Reference wiring.

use dag::Graph;

use crate::diag::Diagnostics;
use crate::refmap::ReferenceMap;
use crate::transform::{GraphTransformer, TransformError};
use crate::vertex::Vertex;

/// Connects every vertex to the vertices it references, so the walk
/// order respects declared dependencies. Destroyer vertices are left
/// alone: their inputs come from state only.
///
/// Unresolvable subjects are non-fatal: they surface as warnings and
/// their edges are simply not drawn.
pub struct ReferenceTransformer;

impl GraphTransformer for ReferenceTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        let map = ReferenceMap::new(graph);

        for id in graph.ids() {
            let Some(vertex) = graph.get(id) else {
                continue;
            };
            if vertex.is_destroyer() {
                continue;
            }

            let (parents, missing) = map.references(graph, id);
            log::debug!(
                "reference: {} references {} vertices",
                vertex,
                parents.len()
            );

            for subject in missing {
                diags.warning(
                    "reference to unknown object",
                    format!("{vertex} refers to {subject}, which is not in the graph"),
                );
            }
            for parent in parents {
                graph.connect(id, parent);
            }
        }
        Ok(())
    }
}
