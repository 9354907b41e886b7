//! Lock holder metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata describing the current holder of an advisory state lock.
///
/// Serialized as self-describing JSON beside the state key, so any
/// operator or tool that finds a conflict can see who holds the lock,
/// for what operation, and since when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "Info")]
    pub info: String,
    #[serde(rename = "Who")]
    pub who: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Created")]
    pub created: Option<DateTime<Utc>>,
    #[serde(rename = "Path")]
    pub path: String,
}

impl LockInfo {
    /// A fresh lock info with a random id, stamped with the calling
    /// user and this crate's version. `created` is set at acquire time.
    pub fn new() -> Self {
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            operation: String::new(),
            info: String::new(),
            who: format!("{user}@{host}"),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: None,
            path: String::new(),
        }
    }

    pub fn marshal(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn unmarshal(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl Default for LockInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        assert_ne!(LockInfo::new().id, LockInfo::new().id);
    }

    #[test]
    fn test_roundtrip() {
        let mut info = LockInfo::new();
        info.operation = "plan".to_string();
        info.created = Some(Utc::now());
        let bytes = info.marshal().unwrap();
        let back = LockInfo::unmarshal(&bytes).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_wire_field_names() {
        let info = LockInfo::new();
        let json: serde_json::Value =
            serde_json::from_slice(&info.marshal().unwrap()).unwrap();
        for field in ["ID", "Operation", "Info", "Who", "Version", "Created", "Path"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }
}
