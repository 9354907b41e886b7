//! # Addrs
//!
//! Typed, string-renderable addresses for declaratively managed objects.
//!
//! Every object the planning engine reasons about is identified by an
//! address: a module instance path, a resource or one of its instances,
//! an input variable, a local value, an output, or a module call. Each
//! address renders to a stable string used as a map key throughout the
//! engine, and parses back from that string.
//!
//! The [`Referenceable`] enum covers the addresses that can appear as the
//! subject of a reference expression; [`Address`] additionally covers
//! module instance paths, which identify graph scopes but are never the
//! subject of a reference.

pub mod error;
pub mod module;
pub mod parser;
pub mod resource;
pub mod target;

pub use error::{ParseError, Result};
pub use module::{ModuleCall, ModuleCallInstance, ModuleInstance, ModuleInstanceStep};
pub use resource::{
    AbsResource, AbsResourceInstance, InstanceKey, Resource, ResourceInstance,
    ResourceInstancePhase, ResourceMode, ResourcePhase,
};
pub use target::{
    Address, InputVariable, LocalValue, OutputValue, Reference, Referenceable, SourcePos,
    append_resource_destroy_references,
};
