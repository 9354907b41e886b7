//! Reference subjects and the full address union.

use std::fmt;

use crate::module::{ModuleCall, ModuleCallInstance, ModuleInstance};
use crate::parser;
use crate::resource::{Resource, ResourceInstance, ResourceInstancePhase, ResourcePhase};

/// An input variable declared by a module, e.g. `var.region`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputVariable {
    pub name: String,
}

impl fmt::Display for InputVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var.{}", self.name)
    }
}

/// A local value declared by a module, e.g. `local.subnet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalValue {
    pub name: String,
}

impl fmt::Display for LocalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local.{}", self.name)
    }
}

/// An output value declared by a module, e.g. `output.address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputValue {
    pub name: String,
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output.{}", self.name)
    }
}

/// An address that can appear as the subject of a reference expression.
///
/// A resource and its no-key instance share a rendering: a single
/// referent key can resolve to both a resource vertex and its instance
/// vertices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Referenceable {
    Resource(Resource),
    ResourceInstance(ResourceInstance),
    ResourceInstancePhase(ResourceInstancePhase),
    InputVariable(InputVariable),
    LocalValue(LocalValue),
    OutputValue(OutputValue),
    ModuleCall(ModuleCall),
    ModuleCallInstance(ModuleCallInstance),
}

impl Referenceable {
    /// Parse from the stable string rendering.
    pub fn parse(input: &str) -> crate::Result<Self> {
        parser::parse_referenceable(input)
    }

    /// For instance and phase subjects, the resource that contains them.
    /// Used as the resolution fallback in resource-oriented graphs.
    pub fn containing_resource(&self) -> Option<Referenceable> {
        match self {
            Referenceable::ResourceInstance(inst) => {
                Some(Referenceable::Resource(inst.containing_resource()))
            }
            Referenceable::ResourceInstancePhase(p) => {
                Some(Referenceable::Resource(p.containing_resource()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Referenceable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referenceable::Resource(a) => a.fmt(f),
            Referenceable::ResourceInstance(a) => a.fmt(f),
            Referenceable::ResourceInstancePhase(a) => a.fmt(f),
            Referenceable::InputVariable(a) => a.fmt(f),
            Referenceable::LocalValue(a) => a.fmt(f),
            Referenceable::OutputValue(a) => a.fmt(f),
            Referenceable::ModuleCall(a) => a.fmt(f),
            Referenceable::ModuleCallInstance(a) => a.fmt(f),
        }
    }
}

/// The full address union: every referenceable kind plus module instance
/// paths, which identify scopes rather than reference subjects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    Module(ModuleInstance),
    Resource(Resource),
    ResourceInstance(ResourceInstance),
    ResourceInstancePhase(ResourceInstancePhase),
    InputVariable(InputVariable),
    LocalValue(LocalValue),
    OutputValue(OutputValue),
    ModuleCall(ModuleCall),
    ModuleCallInstance(ModuleCallInstance),
}

impl Address {
    /// Parse from the stable string rendering. Multi-step `module.` paths
    /// parse as [`Address::Module`]; single-step ones as module calls.
    pub fn parse(input: &str) -> crate::Result<Self> {
        parser::parse_address(input)
    }
}

impl From<Referenceable> for Address {
    fn from(r: Referenceable) -> Self {
        match r {
            Referenceable::Resource(a) => Address::Resource(a),
            Referenceable::ResourceInstance(a) => Address::ResourceInstance(a),
            Referenceable::ResourceInstancePhase(a) => Address::ResourceInstancePhase(a),
            Referenceable::InputVariable(a) => Address::InputVariable(a),
            Referenceable::LocalValue(a) => Address::LocalValue(a),
            Referenceable::OutputValue(a) => Address::OutputValue(a),
            Referenceable::ModuleCall(a) => Address::ModuleCall(a),
            Referenceable::ModuleCallInstance(a) => Address::ModuleCallInstance(a),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Module(a) => a.fmt(f),
            Address::Resource(a) => a.fmt(f),
            Address::ResourceInstance(a) => a.fmt(f),
            Address::ResourceInstancePhase(a) => a.fmt(f),
            Address::InputVariable(a) => a.fmt(f),
            Address::LocalValue(a) => a.fmt(f),
            Address::OutputValue(a) => a.fmt(f),
            Address::ModuleCall(a) => a.fmt(f),
            Address::ModuleCallInstance(a) => a.fmt(f),
        }
    }
}

/// Where in a configuration source a reference was written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePos {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

/// A symbolic dependency from one vertex to another via an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub subject: Referenceable,
    pub source: SourcePos,
}

impl Reference {
    pub fn new(subject: Referenceable) -> Self {
        Self {
            subject,
            source: SourcePos::default(),
        }
    }
}

/// For each resource or resource-instance reference in the slice, append
/// the destroy-phase equivalent. Used by vertices that must also order
/// after the destruction of what they reference.
pub fn append_resource_destroy_references(mut refs: Vec<Reference>) -> Vec<Reference> {
    let given = refs.clone();
    for r in given {
        let phased = match r.subject {
            Referenceable::Resource(res) => res.instance(None).phase(ResourcePhase::Destroy),
            Referenceable::ResourceInstance(inst) => inst.phase(ResourcePhase::Destroy),
            _ => continue,
        };
        refs.push(Reference {
            subject: Referenceable::ResourceInstancePhase(phased),
            source: r.source,
        });
    }
    refs
}
