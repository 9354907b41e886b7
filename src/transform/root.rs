//! Root insertion.

use dag::Graph;

use crate::diag::Diagnostics;
use crate::transform::{GraphTransformer, TransformError};
use crate::vertex::Vertex;

/// Adds a synthetic root vertex depending on every current sink, so the
/// finished graph converges on exactly one final vertex.
pub struct RootTransformer;

impl GraphTransformer for RootTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        _diags: &mut Diagnostics,
    ) -> Result<(), TransformError> {
        let existing = graph
            .vertices()
            .find(|(_, v)| matches!(v, Vertex::Root))
            .map(|(id, _)| id);
        let root = match existing {
            Some(id) => id,
            None => graph.add(Vertex::Root),
        };

        for sink in graph.sinks() {
            if sink != root {
                graph.connect(root, sink);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use addrs::ModuleInstance;

    use crate::vertex::ValueNode;

    fn local(name: &str) -> Vertex {
        Vertex::Local(ValueNode::new(ModuleInstance::root(), name))
    }

    #[test]
    fn test_root_depends_on_all_sinks() {
        let mut g = Graph::new();
        let a = g.add(local("a"));
        let b = g.add(local("b"));
        let c = g.add(local("c"));
        g.connect(b, a); // a is not a sink; b and c are

        RootTransformer
            .transform(&mut g, &mut Diagnostics::new())
            .unwrap();

        g.validate().unwrap();
        let sinks = g.sinks();
        assert_eq!(sinks.len(), 1);
        let root = sinks[0];
        assert!(g.down_edges(root).contains(&b));
        assert!(g.down_edges(root).contains(&c));
        assert!(!g.down_edges(root).contains(&a));
    }

    #[test]
    fn test_idempotent_with_existing_root() {
        let mut g = Graph::new();
        g.add(local("a"));
        RootTransformer
            .transform(&mut g, &mut Diagnostics::new())
            .unwrap();
        let before = g.len();

        RootTransformer
            .transform(&mut g, &mut Diagnostics::new())
            .unwrap();
        assert_eq!(g.len(), before, "no second root vertex");
        g.validate().unwrap();
    }
}
