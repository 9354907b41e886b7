//! Driving a built graph through evaluation.
//!
//! The walk itself (rank parallelism, dependant skipping, stop/cancel)
//! lives in the `dag` crate; this module decides what running one
//! vertex means: data resources expand and recurse, live data instances
//! run their read sequence, orphaned data instances fall out of state.

use std::sync::Mutex;

use dag::Graph;

use addrs::ResourceMode;

use crate::diag::Diagnostics;
use crate::eval::{EvalContext, EvalError};
use crate::expand::{data_instance_sequence, expand_data_resource};
use crate::state::legacy_instance_id;
use crate::vertex::Vertex;

/// Walk the graph in dependency order, evaluating each vertex. Returns
/// the accumulated diagnostics; any error in the bundle means the
/// resulting state must not be persisted.
pub fn walk_graph(graph: &Graph<Vertex>, ctx: &EvalContext) -> Diagnostics {
    let warnings = Mutex::new(Diagnostics::new());

    let outcome = dag::walk(graph, &ctx.signals, |_, vertex| {
        match evaluate_vertex(vertex, ctx) {
            Ok(vertex_warnings) => {
                warnings.lock().unwrap().append(vertex_warnings);
                Ok(())
            }
            Err(diags) => Err(diags),
        }
    });

    let mut diags = warnings.into_inner().unwrap();
    match outcome {
        Ok(walked) => {
            if walked.stopped {
                log::debug!("walk stopped before completion");
            }
            for (_, vertex_diags) in walked.errors {
                diags.append(vertex_diags);
            }
        }
        Err(e) => diags.error("graph walk failed", e.to_string()),
    }
    diags
}

/// Evaluate one vertex. Warnings come back in `Ok`; errors abort the
/// vertex and skip its dependants.
fn evaluate_vertex(vertex: &Vertex, ctx: &EvalContext) -> Result<Diagnostics, Diagnostics> {
    if let Some(node) = vertex.dynamic_expandable() {
        let (subgraph, mut diags) = expand_data_resource(node, ctx)?;
        diags.append(walk_graph(&subgraph, ctx));
        if diags.has_errors() {
            return Err(diags);
        }
        return Ok(diags);
    }

    match vertex {
        Vertex::Instance(node)
            if node.addr.instance.resource.mode == ResourceMode::Data =>
        {
            let sequence = data_instance_sequence(node);
            match sequence.run(ctx) {
                // An early exit is a clean finish: the read waits for
                // apply and must not contaminate diagnostics.
                Ok(_) => Ok(Diagnostics::new()),
                Err(EvalError::Cancelled) => {
                    let mut diags = Diagnostics::new();
                    diags.error("evaluation cancelled", vertex.to_string());
                    Err(diags)
                }
                Err(e) => {
                    let mut diags = Diagnostics::new();
                    diags.error(format!("failed to read {vertex}"), e.to_string());
                    Err(diags)
                }
            }
        }
        Vertex::DestroyInstance(node)
            if node.addr.instance.resource.mode == ResourceMode::Data =>
        {
            // An orphaned data instance has nothing real to destroy;
            // its state entry just goes away.
            let id = legacy_instance_id(&node.addr);
            log::trace!("walk: dropping orphaned data instance state {id}");
            ctx.state.write().remove(&id);
            Ok(Diagnostics::new())
        }
        _ => Ok(Diagnostics::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use addrs::{ModuleInstance, Resource};

    use crate::config::{ConfigBlock, ConfigValue, CountExpr};
    use crate::provider::{DataDiff, InstanceState, Provider, ProviderResolver};
    use crate::state::{ResourceRecord, SharedState, StateSnapshot};
    use crate::vertex::ResourceNode;

    struct CountingProvider {
        applies: AtomicUsize,
    }

    impl Provider for CountingProvider {
        fn read_data_diff(
            &self,
            _addr: &Resource,
            _config: &ConfigBlock,
        ) -> anyhow::Result<DataDiff> {
            Ok(DataDiff::default())
        }

        fn read_data_apply(
            &self,
            _addr: &Resource,
            _diff: &DataDiff,
        ) -> anyhow::Result<InstanceState> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            let mut attributes = BTreeMap::new();
            attributes.insert("id".to_string(), serde_json::json!("read"));
            Ok(InstanceState { attributes })
        }
    }

    struct SharedResolver(Arc<CountingProvider>);

    impl ProviderResolver for SharedResolver {
        fn resolve(&self, _fqn: &str) -> anyhow::Result<Arc<dyn Provider>> {
            Ok(self.0.clone())
        }
    }

    fn setup(state: StateSnapshot) -> (EvalContext, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider {
            applies: AtomicUsize::new(0),
        });
        let ctx = EvalContext::new(
            SharedState::new(state),
            Arc::new(SharedResolver(provider.clone())),
        );
        (ctx, provider)
    }

    fn data_resource(config: ConfigBlock) -> Vertex {
        Vertex::Resource(ResourceNode {
            addr: Resource::data("image", "base").absolute(ModuleInstance::root()),
            config,
            provider: "registry/core".to_string(),
        })
    }

    #[test]
    fn test_walk_expands_and_reads_data_source() {
        let mut config = ConfigBlock::new();
        config
            .attrs
            .insert("name".into(), ConfigValue::Known(serde_json::json!("x")));
        config.count = CountExpr::Literal(2);

        let mut g = Graph::new();
        g.add(data_resource(config));

        let (ctx, provider) = setup(StateSnapshot::empty());
        let diags = walk_graph(&g, &ctx);
        assert!(!diags.has_errors(), "{diags}");
        assert_eq!(provider.applies.load(Ordering::SeqCst), 2);

        let state = ctx.state.read();
        assert!(state.get("data.image.base.0").is_some());
        assert!(state.get("data.image.base.1").is_some());
    }

    #[test]
    fn test_walk_drops_orphaned_data_state() {
        let mut state = StateSnapshot::empty();
        for id in ["data.image.base.0", "data.image.base.1"] {
            state.put(
                id,
                ResourceRecord {
                    type_name: "image".into(),
                    provider: "registry/core".into(),
                    dependencies: vec![],
                    value: None,
                },
            );
        }

        let mut config = ConfigBlock::new();
        config
            .attrs
            .insert("name".into(), ConfigValue::Known(serde_json::json!("x")));
        config.count = CountExpr::Literal(1);

        let mut g = Graph::new();
        g.add(data_resource(config));

        let (ctx, _) = setup(state);
        let diags = walk_graph(&g, &ctx);
        assert!(!diags.has_errors(), "{diags}");

        let state = ctx.state.read();
        assert!(state.get("data.image.base.0").is_some());
        assert!(state.get("data.image.base.1").is_none(), "orphan removed");
    }

    #[test]
    fn test_walk_count_error_surfaces() {
        let mut config = ConfigBlock::new();
        config.count = CountExpr::Variable("missing".into());

        let mut g = Graph::new();
        g.add(data_resource(config));

        let (ctx, _) = setup(StateSnapshot::empty());
        let diags = walk_graph(&g, &ctx);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_walk_deferred_read_is_not_an_error() {
        let mut config = ConfigBlock::new();
        config.attrs.insert("ref".into(), ConfigValue::Unknown);

        let mut g = Graph::new();
        g.add(data_resource(config));

        let (ctx, provider) = setup(StateSnapshot::empty());
        let diags = walk_graph(&g, &ctx);
        assert!(!diags.has_errors(), "{diags}");
        assert_eq!(
            provider.applies.load(Ordering::SeqCst),
            0,
            "read deferred to apply"
        );
        assert!(ctx.state.read().get("data.image.base").is_none());
    }
}
