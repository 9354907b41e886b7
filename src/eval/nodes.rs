//! The evaluation node variants.

use addrs::Resource;

use crate::config::ConfigBlock;
use crate::eval::context::EvalContext;
use crate::eval::{EvalError, EvalOutcome, EvalSlots, run_nodes};
use crate::state::ResourceRecord;

/// One step of an evaluation sequence.
pub enum EvalNode {
    WriteState(WriteState),
    GetProvider(GetProvider),
    ReadDataDiff(ReadDataDiff),
    If(IfNode),
    ReadDataApply(ReadDataApply),
    UpdateStateHook(UpdateStateHook),
    Noop,
}

impl EvalNode {
    pub(crate) fn eval(
        &self,
        ctx: &EvalContext,
        slots: &mut EvalSlots,
    ) -> Result<EvalOutcome, EvalError> {
        match self {
            EvalNode::WriteState(n) => n.eval(ctx, slots),
            EvalNode::GetProvider(n) => n.eval(ctx, slots),
            EvalNode::ReadDataDiff(n) => n.eval(ctx, slots),
            EvalNode::If(n) => n.eval(ctx, slots),
            EvalNode::ReadDataApply(n) => n.eval(ctx, slots),
            EvalNode::UpdateStateHook(n) => n.eval(ctx, slots),
            EvalNode::Noop => Ok(EvalOutcome::Proceed),
        }
    }
}

/// Persist the state slot under the instance's legacy id. An empty slot
/// clears the entry, which is how a sequence guarantees that an
/// early-exited read leaves no stale values behind.
pub struct WriteState {
    pub id: String,
    pub type_name: String,
    pub provider: String,
    pub dependencies: Vec<String>,
}

impl WriteState {
    fn eval(&self, ctx: &EvalContext, slots: &mut EvalSlots) -> Result<EvalOutcome, EvalError> {
        let mut state = ctx.state.write();
        match &slots.state {
            Some(value) => {
                log::trace!("write state: {}", self.id);
                state.put(
                    self.id.clone(),
                    ResourceRecord {
                        type_name: self.type_name.clone(),
                        provider: self.provider.clone(),
                        dependencies: self.dependencies.clone(),
                        value: Some(value.clone()),
                    },
                );
            }
            None => {
                log::trace!("write state: clearing {}", self.id);
                state.remove(&self.id);
            }
        }
        Ok(EvalOutcome::Proceed)
    }
}

/// Resolve the provider handle into its slot.
pub struct GetProvider {
    pub fqn: String,
}

impl GetProvider {
    fn eval(&self, ctx: &EvalContext, slots: &mut EvalSlots) -> Result<EvalOutcome, EvalError> {
        let provider = ctx
            .providers
            .resolve(&self.fqn)
            .map_err(|source| EvalError::Provider {
                addr: self.fqn.clone(),
                source,
            })?;
        slots.provider = Some(provider);
        Ok(EvalOutcome::Proceed)
    }
}

/// Ask the provider for the data source's shape. When the configuration
/// was wholly known and the provider completed the read immediately,
/// the resulting state lands in the state slot now.
pub struct ReadDataDiff {
    pub addr: Resource,
    pub config: ConfigBlock,
}

impl ReadDataDiff {
    fn eval(&self, ctx: &EvalContext, slots: &mut EvalSlots) -> Result<EvalOutcome, EvalError> {
        let provider = slots
            .provider
            .as_ref()
            .ok_or(EvalError::MissingSlot("provider"))?;
        let diff = provider
            .read_data_diff(&self.addr, &self.config)
            .map_err(|source| EvalError::Provider {
                addr: self.addr.to_string(),
                source,
            })?;
        slots.config_known = Some(self.config.wholly_known());
        if let Some(state) = &diff.state {
            slots.state = Some(state.clone());
        }
        slots.diff = Some(diff);
        Ok(EvalOutcome::Proceed)
    }
}

/// Conditions an [`IfNode`] can dispatch on.
pub enum EvalCond {
    /// True when the plan-time read completed: the configuration was
    /// wholly known and no explicit `depends_on` holds the read back.
    /// Otherwise the sequence early-exits, deferring the read to apply.
    DataReadComplete { has_depends_on: bool },
}

impl EvalCond {
    fn eval(&self, slots: &EvalSlots) -> Result<(bool, EvalOutcome), EvalError> {
        match self {
            EvalCond::DataReadComplete { has_depends_on } => {
                let known = slots
                    .config_known
                    .ok_or(EvalError::MissingSlot("config_known"))?;
                if !known || *has_depends_on {
                    return Ok((true, EvalOutcome::EarlyExit));
                }
                Ok((true, EvalOutcome::Proceed))
            }
        }
    }
}

/// Evaluate a condition; on true run the branch. The condition may
/// signal an early exit, which aborts the whole sequence cleanly.
pub struct IfNode {
    pub cond: EvalCond,
    pub then: Vec<EvalNode>,
}

impl IfNode {
    fn eval(&self, ctx: &EvalContext, slots: &mut EvalSlots) -> Result<EvalOutcome, EvalError> {
        let (branch, outcome) = self.cond.eval(slots)?;
        if outcome == EvalOutcome::EarlyExit {
            return Ok(EvalOutcome::EarlyExit);
        }
        if branch {
            return run_nodes(&self.then, ctx, slots);
        }
        Ok(EvalOutcome::Proceed)
    }
}

/// Perform the read that was deferred at plan time.
pub struct ReadDataApply {
    pub addr: Resource,
}

impl ReadDataApply {
    fn eval(&self, _ctx: &EvalContext, slots: &mut EvalSlots) -> Result<EvalOutcome, EvalError> {
        let provider = slots
            .provider
            .as_ref()
            .ok_or(EvalError::MissingSlot("provider"))?;
        let diff = slots.diff.as_ref().ok_or(EvalError::MissingSlot("diff"))?;
        let state = provider
            .read_data_apply(&self.addr, diff)
            .map_err(|source| EvalError::Provider {
                addr: self.addr.to_string(),
                source,
            })?;
        slots.state = Some(state);
        Ok(EvalOutcome::Proceed)
    }
}

/// Tell every registered observer that state was updated.
pub struct UpdateStateHook {
    pub id: String,
}

impl UpdateStateHook {
    fn eval(&self, ctx: &EvalContext, _slots: &mut EvalSlots) -> Result<EvalOutcome, EvalError> {
        for hook in &ctx.hooks {
            hook.post_state_update(&self.id)
                .map_err(|source| EvalError::Hook { source })?;
        }
        Ok(EvalOutcome::Proceed)
    }
}
