//! Dynamic expansion of declared data resources.
//!
//! A single declared data source becomes a per-instance subgraph during
//! the walk: count expansion, orphan detection, state attachment,
//! targeting, reference wiring, and a root, built with the standard
//! transformer pipeline. Each live instance then evaluates the fixed
//! read sequence, deferring to apply time when its configuration is not
//! wholly known yet.

use std::collections::BTreeSet;

use dag::Graph;

use addrs::{AbsResourceInstance, Referenceable};

use crate::config::CountExpr;
use crate::diag::{Diagnostic, Diagnostics};
use crate::eval::{
    EvalCond, EvalContext, EvalNode, EvalSequence, GetProvider, IfNode, ReadDataApply,
    ReadDataDiff, UpdateStateHook, WriteState,
};
use crate::state::legacy_instance_id;
use crate::transform::{
    AttachStateTransformer, CountTransformer, GraphBuilder, GraphTransformer, InstanceFactory,
    OrphanCountTransformer, ReferenceTransformer, RootTransformer, TargetsTransformer,
};
use crate::vertex::{InstanceNode, ResourceNode, Vertex};

/// Evaluate a count expression to the instance count, with `-1` meaning
/// count is unset. Expression problems are configuration errors.
pub fn evaluate_count(
    expr: &CountExpr,
    variables: &std::collections::BTreeMap<String, serde_json::Value>,
) -> Result<i64, Diagnostic> {
    match expr {
        CountExpr::Unset => Ok(-1),
        CountExpr::Literal(n) => Ok(*n as i64),
        CountExpr::Variable(name) => {
            let Some(value) = variables.get(name) else {
                return Err(Diagnostic::error(
                    "invalid count expression",
                    format!("count refers to undeclared variable {name:?}"),
                ));
            };
            match value.as_u64() {
                Some(n) => Ok(n as i64),
                None => Err(Diagnostic::error(
                    "invalid count expression",
                    format!("variable {name:?} is not a whole number: {value}"),
                )),
            }
        }
    }
}

/// Expand one declared data resource into its evaluation subgraph.
///
/// On success the diagnostics carry only warnings (missing references
/// and the like); count expression errors and build failures come back
/// as the error bundle.
pub fn expand_data_resource(
    node: &ResourceNode,
    ctx: &EvalContext,
) -> Result<(Graph<Vertex>, Diagnostics), Diagnostics> {
    let count = evaluate_count(&node.config.count, &ctx.variables).map_err(Diagnostics::from)?;

    // Rename single-instance state if count-set-ness changed since the
    // snapshot was taken.
    ctx.state
        .write()
        .fix_count_set_transition(&node.addr, count != -1);

    // The snapshot stays read-locked for the whole expansion.
    let state = ctx.state.read();
    let snapshot = state.clone();

    let live_config = node.config.clone();
    let live_provider = node.provider.clone();
    let concrete: InstanceFactory = Box::new(move |mut inst: InstanceNode| {
        inst.config = Some(live_config.clone());
        inst.provider = live_provider.clone();
        Vertex::Instance(inst)
    });

    let orphan_config = node.config.clone();
    let destroyable: InstanceFactory = Box::new(move |mut inst: InstanceNode| {
        inst.config = Some(orphan_config.clone());
        Vertex::DestroyInstance(inst)
    });

    let steps: Vec<Box<dyn GraphTransformer>> = vec![
        Box::new(CountTransformer {
            concrete,
            count,
            addr: node.addr.clone(),
        }),
        Box::new(OrphanCountTransformer {
            concrete: destroyable,
            count,
            addr: node.addr.clone(),
            state: snapshot.clone(),
        }),
        Box::new(AttachStateTransformer { state: snapshot }),
        Box::new(TargetsTransformer {
            targets: ctx.targets.clone(),
        }),
        Box::new(ReferenceTransformer),
        Box::new(RootTransformer),
    ];

    let builder = GraphBuilder {
        steps,
        validate: true,
        name: "data-resource-expand",
    };
    builder.build()
}

/// The fixed read sequence for one live data-source instance.
///
/// The leading nil-state write matters: if the sequence early-exits
/// because the read must wait for apply, no stale values from an
/// earlier plan can be interpolated into downstream references.
pub fn data_instance_sequence(node: &InstanceNode) -> EvalSequence {
    let addr = &node.addr;
    let id = legacy_instance_id(addr);
    let type_name = addr.instance.resource.type_name.clone();

    let provider = if node.provider.is_empty() {
        match node.state.as_ref().filter(|s| !s.provider.is_empty()) {
            Some(s) => s.provider.clone(),
            // Fall back to the local name the type implies.
            None => addr.instance.resource.default_provider_name().to_string(),
        }
    } else {
        node.provider.clone()
    };

    let (dependencies, has_depends_on) = match &node.config {
        Some(config) => (
            state_references(addr, config.references().iter().map(|r| &r.subject)),
            !config.depends_on.is_empty(),
        ),
        None => (
            node.state
                .as_ref()
                .map(|s| s.dependencies.clone())
                .unwrap_or_default(),
            false,
        ),
    };

    let config = node.config.clone().unwrap_or_default();
    let relative = addr.instance.resource.clone();

    EvalSequence {
        nodes: vec![
            EvalNode::WriteState(WriteState {
                id: id.clone(),
                type_name: type_name.clone(),
                provider: provider.clone(),
                dependencies: dependencies.clone(),
            }),
            EvalNode::GetProvider(GetProvider {
                fqn: provider.clone(),
            }),
            EvalNode::ReadDataDiff(ReadDataDiff {
                addr: relative.clone(),
                config,
            }),
            EvalNode::If(IfNode {
                cond: EvalCond::DataReadComplete { has_depends_on },
                then: vec![EvalNode::Noop],
            }),
            EvalNode::ReadDataApply(ReadDataApply { addr: relative }),
            EvalNode::WriteState(WriteState {
                id: id.clone(),
                type_name,
                provider,
                dependencies,
            }),
            EvalNode::UpdateStateHook(UpdateStateHook { id }),
        ],
    }
}

/// Distinct rendered resource addresses the instance's references point
/// at, for the persisted dependency list.
fn state_references<'a>(
    addr: &AbsResourceInstance,
    subjects: impl Iterator<Item = &'a Referenceable>,
) -> Vec<String> {
    let mut out = BTreeSet::new();
    for subject in subjects {
        let resource = match subject {
            Referenceable::Resource(r) => r.clone(),
            Referenceable::ResourceInstance(ri) => ri.containing_resource(),
            Referenceable::ResourceInstancePhase(p) => p.containing_resource(),
            _ => continue,
        };
        out.insert(resource.absolute(addr.module.clone()).to_string());
    }
    out.into_iter().collect()
}
