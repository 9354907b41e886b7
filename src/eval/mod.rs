//! Evaluation sequences.
//!
//! Each graph vertex that does real work exposes an ordered sequence of
//! evaluation nodes. The nodes communicate through a per-run record of
//! typed optional slots; a fresh record is made for every execution, so
//! sequences are re-entrant and never leak state between instances.
//!
//! A node finishing early is not an error: the outcome type carries a
//! distinct `EarlyExit` variant and the driver dispatches on it
//! explicitly.

pub mod context;
pub mod nodes;

pub use context::EvalContext;
pub use nodes::{
    EvalCond, EvalNode, GetProvider, IfNode, ReadDataApply, ReadDataDiff, UpdateStateHook,
    WriteState,
};

use std::sync::Arc;

use thiserror::Error;

use crate::provider::{DataDiff, InstanceState, Provider};

/// How a sequence (or one node) finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    Proceed,
    /// Abort the rest of the sequence cleanly, with no error
    EarlyExit,
}

/// Errors raised by evaluation nodes.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("provider error for {addr}: {source}")]
    Provider {
        addr: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("state hook error: {source}")]
    Hook {
        #[source]
        source: anyhow::Error,
    },

    /// A node ran before the node that fills its input slot
    #[error("evaluation sequence out of order: {0}")]
    MissingSlot(&'static str),

    #[error("evaluation cancelled")]
    Cancelled,
}

/// Shared storage visible to every node of one execution. Earlier
/// writes are visible to later nodes in the same run.
#[derive(Default)]
pub struct EvalSlots {
    pub provider: Option<Arc<dyn Provider>>,
    pub diff: Option<DataDiff>,
    pub state: Option<InstanceState>,
    /// Whether the configuration was wholly known at diff time
    pub config_known: Option<bool>,
}

/// An ordered list of evaluation nodes run against a shared context.
pub struct EvalSequence {
    pub nodes: Vec<EvalNode>,
}

impl EvalSequence {
    /// Run every node in order over a fresh slot record. Stops at the
    /// first error, or cleanly at an early exit.
    pub fn run(&self, ctx: &EvalContext) -> Result<EvalOutcome, EvalError> {
        let mut slots = EvalSlots::default();
        run_nodes(&self.nodes, ctx, &mut slots)
    }
}

pub(crate) fn run_nodes(
    nodes: &[EvalNode],
    ctx: &EvalContext,
    slots: &mut EvalSlots,
) -> Result<EvalOutcome, EvalError> {
    for node in nodes {
        if ctx.signals.is_cancelled() {
            return Err(EvalError::Cancelled);
        }
        match node.eval(ctx, slots)? {
            EvalOutcome::Proceed => {}
            EvalOutcome::EarlyExit => return Ok(EvalOutcome::EarlyExit),
        }
    }
    Ok(EvalOutcome::Proceed)
}
