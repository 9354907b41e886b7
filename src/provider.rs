//! Provider and hook contracts.
//!
//! Providers are host-supplied: the engine resolves them by fully
//! qualified name and calls the two data-source operations. Anything can
//! go wrong inside a provider, so the seams return `anyhow::Result` and
//! the engine folds failures into its diagnostics.

use std::collections::BTreeMap;
use std::sync::Arc;

use addrs::Resource;
use serde::{Deserialize, Serialize};

use crate::config::ConfigBlock;

/// Attribute values for one resource instance, as read or planned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl InstanceState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The provider's answer to a plan-time data-source read.
#[derive(Debug, Clone, Default)]
pub struct DataDiff {
    /// Planned attribute values, as far as the provider can know them
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Populated when the configuration was wholly known and the
    /// provider could complete the read during planning
    pub state: Option<InstanceState>,
}

/// A resolved provider handle.
pub trait Provider: Send + Sync {
    /// Compute the shape of a data source, optionally completing the
    /// read when the configuration allows it.
    fn read_data_diff(&self, addr: &Resource, config: &ConfigBlock) -> anyhow::Result<DataDiff>;

    /// Perform the read that was deferred at plan time.
    fn read_data_apply(&self, addr: &Resource, diff: &DataDiff) -> anyhow::Result<InstanceState>;
}

/// Resolves provider handles by fully qualified name.
pub trait ProviderResolver: Send + Sync {
    fn resolve(&self, fqn: &str) -> anyhow::Result<Arc<dyn Provider>>;
}

/// Observer notified after each state update.
pub trait StateHook: Send + Sync {
    fn post_state_update(&self, instance_id: &str) -> anyhow::Result<()>;
}
