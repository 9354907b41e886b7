//! The slice of a parsed configuration the engine consumes.
//!
//! Configuration parsing itself is an external collaborator; by the time
//! a block reaches the engine its references have been extracted and its
//! attribute values are either known or marked unknown (computed
//! elsewhere and unavailable until apply).

use std::collections::BTreeMap;

use addrs::{Reference, Referenceable};

/// One attribute value in a configuration block.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Known(serde_json::Value),
    /// Value depends on something not yet computed
    Unknown,
}

impl ConfigValue {
    pub fn is_known(&self) -> bool {
        matches!(self, ConfigValue::Known(_))
    }
}

/// The count meta-argument, pre-evaluated down to either a literal or a
/// variable lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CountExpr {
    /// No count argument: the resource has a single no-key instance
    #[default]
    Unset,
    Literal(u32),
    /// Resolved against the planner's variable scope at expansion time
    Variable(String),
}

/// A declared resource body as the engine sees it.
#[derive(Debug, Clone, Default)]
pub struct ConfigBlock {
    pub attrs: BTreeMap<String, ConfigValue>,
    /// References extracted from attribute expressions
    pub refs: Vec<Reference>,
    /// Explicit `depends_on` subjects
    pub depends_on: Vec<Referenceable>,
    pub count: CountExpr,
}

impl ConfigBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every attribute value is known now.
    pub fn wholly_known(&self) -> bool {
        self.attrs.values().all(ConfigValue::is_known)
    }

    /// All references this block declares: expression references plus
    /// `depends_on` entries.
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = self.refs.clone();
        refs.extend(self.depends_on.iter().cloned().map(Reference::new));
        refs
    }
}
