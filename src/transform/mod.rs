//! Composable graph transformers and the builder that runs them.
//!
//! A transformer is one pass over the graph: it may add vertices, draw
//! or remove edges, or prune. Passes run single-threaded, in order, and
//! must be deterministic: any iteration over unordered data is sorted
//! on rendered addresses before it affects the edge set.

mod attach;
mod count;
mod prune;
mod reference;
mod root;
mod targets;

pub use attach::{AttachDependenciesTransformer, AttachStateTransformer};
pub use count::{CountTransformer, InstanceFactory, OrphanCountTransformer};
pub use prune::PruneUnusedValuesTransformer;
pub use reference::ReferenceTransformer;
pub use root::RootTransformer;
pub use targets::TargetsTransformer;

use dag::Graph;
use thiserror::Error;

use crate::diag::Diagnostics;
use crate::vertex::Vertex;

/// Errors that abort a graph build.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Graph(#[from] dag::GraphError),

    #[error("{0}")]
    Message(String),
}

/// One pass over the graph. Warnings (missing references and the like)
/// go to the diagnostics sink; returning an error aborts the build.
pub trait GraphTransformer {
    fn transform(
        &self,
        graph: &mut Graph<Vertex>,
        diags: &mut Diagnostics,
    ) -> Result<(), TransformError>;
}

/// Applies a step list to an empty graph and validates the result.
pub struct GraphBuilder {
    pub steps: Vec<Box<dyn GraphTransformer>>,
    pub validate: bool,
    pub name: &'static str,
}

impl GraphBuilder {
    /// Run every step in order. On success the returned diagnostics
    /// carry only warnings; on failure they carry at least one error.
    pub fn build(&self) -> Result<(Graph<Vertex>, Diagnostics), Diagnostics> {
        let mut graph = Graph::new();
        let mut diags = Diagnostics::new();
        self.run(&mut graph, &mut diags).map_err(|()| diags.clone())?;
        Ok((graph, diags))
    }

    /// Like `build`, but over an existing graph.
    pub fn extend(
        &self,
        graph: &mut Graph<Vertex>,
    ) -> Result<Diagnostics, Diagnostics> {
        let mut diags = Diagnostics::new();
        self.run(graph, &mut diags).map_err(|()| diags.clone())?;
        Ok(diags)
    }

    fn run(&self, graph: &mut Graph<Vertex>, diags: &mut Diagnostics) -> Result<(), ()> {
        for step in &self.steps {
            if let Err(e) = step.transform(graph, diags) {
                diags.error(format!("graph build {:?} failed", self.name), e.to_string());
                return Err(());
            }
        }
        if self.validate {
            if let Err(e) = graph.validate() {
                diags.error(
                    format!("graph {:?} failed validation", self.name),
                    e.to_string(),
                );
                return Err(());
            }
        }
        log::debug!(
            "graph build {:?} complete: {} vertices, {} edges",
            self.name,
            graph.len(),
            graph.edges().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use addrs::{ModuleInstance, Resource};

    use crate::config::ConfigBlock;
    use crate::state::StateSnapshot;
    use crate::vertex::InstanceNode;

    fn pipeline_for(
        count: i64,
        state: StateSnapshot,
    ) -> (Vec<Box<dyn GraphTransformer>>, addrs::AbsResource) {
        let addr = Resource::managed("disk", "web").absolute(ModuleInstance::root());
        let live: InstanceFactory = Box::new(|mut node: InstanceNode| {
            node.config = Some(ConfigBlock::new());
            Vertex::Instance(node)
        });
        let destroy: InstanceFactory = Box::new(Vertex::DestroyInstance);
        let steps: Vec<Box<dyn GraphTransformer>> = vec![
            Box::new(CountTransformer {
                concrete: live,
                count,
                addr: addr.clone(),
            }),
            Box::new(OrphanCountTransformer {
                concrete: destroy,
                count,
                addr: addr.clone(),
                state: state.clone(),
            }),
            Box::new(AttachStateTransformer { state }),
            Box::new(ReferenceTransformer),
            Box::new(RootTransformer),
        ];
        (steps, addr)
    }

    #[test]
    fn test_full_pipeline_validates() {
        let (steps, _) = pipeline_for(3, StateSnapshot::empty());
        let builder = GraphBuilder {
            steps,
            validate: true,
            name: "test",
        };
        let (graph, diags) = builder.build().unwrap();
        assert!(!diags.has_errors());
        // 3 instances + root
        assert_eq!(graph.len(), 4);
        graph.validate().unwrap();
    }

    #[test]
    fn test_count_down_emits_live_and_destroyable() {
        // State has three instances, new config sets count = 1: one
        // live vertex and two destroyable ones, and the live instance's
        // recorded dependencies name what it references but never
        // itself.
        let mut state = StateSnapshot::empty();
        for id in ["disk.web.0", "disk.web.1", "disk.web.2"] {
            state.put(
                id,
                crate::state::ResourceRecord {
                    type_name: "disk".to_string(),
                    provider: "registry/core".to_string(),
                    dependencies: Vec::new(),
                    value: None,
                },
            );
        }

        let addr = Resource::managed("disk", "web").absolute(ModuleInstance::root());
        let live: InstanceFactory = Box::new(|mut node: InstanceNode| {
            let mut config = ConfigBlock::new();
            config
                .refs
                .push(addrs::Reference::new(addrs::Referenceable::Resource(
                    Resource::managed("net", "b"),
                )));
            node.config = Some(config);
            Vertex::Instance(node)
        });
        let destroy: InstanceFactory = Box::new(Vertex::DestroyInstance);

        struct AddVertex(Vertex);
        impl GraphTransformer for AddVertex {
            fn transform(
                &self,
                graph: &mut dag::Graph<Vertex>,
                _diags: &mut Diagnostics,
            ) -> Result<(), TransformError> {
                graph.add(self.0.clone());
                Ok(())
            }
        }
        let referenced = AddVertex(Vertex::Instance({
            let mut node = InstanceNode::new(
                Resource::managed("net", "b")
                    .absolute(ModuleInstance::root())
                    .instance(None),
            );
            node.config = Some(ConfigBlock::new());
            node
        }));

        let steps: Vec<Box<dyn GraphTransformer>> = vec![
            Box::new(referenced),
            Box::new(CountTransformer {
                concrete: live,
                count: 1,
                addr: addr.clone(),
            }),
            Box::new(OrphanCountTransformer {
                concrete: destroy,
                count: 1,
                addr,
                state: state.clone(),
            }),
            Box::new(AttachStateTransformer { state }),
            Box::new(ReferenceTransformer),
            Box::new(AttachDependenciesTransformer),
            Box::new(RootTransformer),
        ];
        let builder = GraphBuilder {
            steps,
            validate: true,
            name: "count-down",
        };
        let (graph, _) = builder.build().unwrap();

        let mut live_names = Vec::new();
        let mut destroy_names = Vec::new();
        for (_, v) in graph.vertices() {
            match v {
                Vertex::Instance(n) if n.addr.instance.resource.name == "web" => {
                    live_names.push(v.to_string());
                    let deps: Vec<String> =
                        n.dependencies.iter().map(|d| d.to_string()).collect();
                    assert_eq!(deps, vec!["net.b"], "references yes, self no");
                }
                Vertex::DestroyInstance(_) => destroy_names.push(v.to_string()),
                _ => {}
            }
        }
        assert_eq!(live_names, vec!["disk.web[0]"]);
        assert_eq!(
            destroy_names,
            vec!["disk.web[1] (destroy)", "disk.web[2] (destroy)"]
        );
    }

    #[test]
    fn test_pipeline_idempotent_on_rebuild() {
        let (steps, _) = pipeline_for(2, StateSnapshot::empty());
        let builder = GraphBuilder {
            steps,
            validate: true,
            name: "test",
        };
        let (mut graph, _) = builder.build().unwrap();
        let before_vertices = graph.len();
        let before_edges = graph.edges().len();

        // Re-applying the idempotent tail passes must not change the
        // shape of an already-built graph.
        let tail = GraphBuilder {
            steps: vec![Box::new(ReferenceTransformer), Box::new(RootTransformer)],
            validate: true,
            name: "tail",
        };
        tail.extend(&mut graph).unwrap();
        assert_eq!(graph.len(), before_vertices);
        assert_eq!(graph.edges().len(), before_edges);
    }
}
