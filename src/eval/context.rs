//! The shared context evaluation runs against.

use std::collections::BTreeMap;
use std::sync::Arc;

use addrs::Address;
use dag::WalkSignals;

use crate::provider::{ProviderResolver, StateHook};
use crate::state::SharedState;

/// Everything an evaluation node may touch: the lock-guarded state
/// snapshot, the provider resolver, registered state observers, the
/// planner's variable scope, operator targeting, and the walk's
/// cancellation signals.
#[derive(Clone)]
pub struct EvalContext {
    pub state: SharedState,
    pub providers: Arc<dyn ProviderResolver>,
    pub hooks: Vec<Arc<dyn StateHook>>,
    pub variables: BTreeMap<String, serde_json::Value>,
    pub targets: Vec<Address>,
    pub signals: Arc<WalkSignals>,
}

impl EvalContext {
    pub fn new(state: SharedState, providers: Arc<dyn ProviderResolver>) -> Self {
        Self {
            state,
            providers,
            hooks: Vec::new(),
            variables: BTreeMap::new(),
            targets: Vec::new(),
            signals: Arc::new(WalkSignals::new()),
        }
    }

    pub fn with_targets(mut self, targets: Vec<Address>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn StateHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}
