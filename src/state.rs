//! The persistent state snapshot and its shared, lock-guarded form.
//!
//! Instance entries are keyed by a legacy-style string id, which is what
//! the evaluation sequence writes under and what downstream tooling
//! reads. The wire format is JSON; remotely it travels as opaque bytes
//! through `statekit`.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use addrs::{AbsResource, AbsResourceInstance, InstanceKey};

use crate::provider::InstanceState;

/// State recorded for one resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub type_name: String,
    /// Fully qualified name of the provider that manages the instance
    pub provider: String,
    /// Rendered absolute resource addresses this instance depended on,
    /// kept for destroy ordering
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub value: Option<InstanceState>,
}

/// The whole persistent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
}

/// Legacy-style id an instance's state is stored under:
/// `disk.web`, `disk.web.0`, or `module.net.disk.web.0`.
pub fn legacy_instance_id(addr: &AbsResourceInstance) -> String {
    let base = addr.containing_resource().to_string();
    match &addr.instance.key {
        None => base,
        Some(InstanceKey::Index(i)) => format!("{base}.{i}"),
        Some(InstanceKey::Str(s)) => format!("{base}.{s}"),
    }
}

impl StateSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ResourceRecord> {
        self.resources.get(id)
    }

    pub fn put(&mut self, id: impl Into<String>, record: ResourceRecord) {
        self.resources.insert(id.into(), record);
    }

    pub fn remove(&mut self, id: &str) -> Option<ResourceRecord> {
        self.resources.remove(id)
    }

    /// The instance keys recorded for a resource, with their state ids.
    pub fn instances_of(&self, addr: &AbsResource) -> Vec<(Option<InstanceKey>, String)> {
        let base = addr.to_string();
        let prefix = format!("{base}.");
        let mut out = Vec::new();
        for id in self.resources.keys() {
            if *id == base {
                out.push((None, id.clone()));
                continue;
            }
            let Some(rest) = id.strip_prefix(&prefix) else {
                continue;
            };
            if let Ok(index) = rest.parse::<u64>() {
                out.push((Some(InstanceKey::Index(index)), id.clone()));
            } else if !rest.contains('.') {
                out.push((Some(InstanceKey::Str(rest.to_string())), id.clone()));
            }
        }
        out
    }

    /// Rename single-instance state when a resource transitions between
    /// having `count` set and unset: no-key becomes `[0]` when count
    /// appears, `[0]` becomes no-key when it goes away. Returns whether
    /// a rename happened.
    pub fn fix_count_set_transition(&mut self, addr: &AbsResource, count_set: bool) -> bool {
        let no_key = legacy_instance_id(&addr.instance(None));
        let zero = legacy_instance_id(&addr.instance(Some(InstanceKey::Index(0))));

        let (from, to) = if count_set {
            (no_key, zero)
        } else {
            (zero, no_key)
        };

        if self.resources.contains_key(&to) || !self.resources.contains_key(&from) {
            return false;
        }
        if let Some(record) = self.resources.remove(&from) {
            log::trace!("state: renaming {from} to {to} for count transition");
            self.resources.insert(to, record);
            return true;
        }
        false
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// The snapshot behind a reader/writer lock, shared between expansion
/// (readers) and state-writing evaluation steps (brief writers).
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<RwLock<StateSnapshot>>);

impl SharedState {
    pub fn new(snapshot: StateSnapshot) -> Self {
        Self(Arc::new(RwLock::new(snapshot)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, StateSnapshot> {
        self.0.read().unwrap()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, StateSnapshot> {
        self.0.write().unwrap()
    }
}
