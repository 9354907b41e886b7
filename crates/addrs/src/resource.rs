//! Resource addresses and their instance-level refinements.

use std::fmt;

use crate::module::ModuleInstance;

/// Whether a resource is managed (created and destroyed by the engine) or
/// a data source (read-only, re-read each plan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceMode {
    Managed,
    Data,
}

/// The key distinguishing one instance of a counted resource from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    /// Position within a `count` expansion
    Index(u64),
    /// Named entry within a keyed expansion
    Str(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Index(i) => write!(f, "[{i}]"),
            InstanceKey::Str(s) => write!(f, "[{s:?}]"),
        }
    }
}

/// A resource within some module, identified by mode, type, and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource {
    pub mode: ResourceMode,
    pub type_name: String,
    pub name: String,
}

impl Resource {
    pub fn managed(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    pub fn data(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Refine this resource to one of its instances.
    pub fn instance(&self, key: Option<InstanceKey>) -> ResourceInstance {
        ResourceInstance {
            resource: self.clone(),
            key,
        }
    }

    /// Lift this relative resource into a module-qualified form.
    pub fn absolute(&self, module: ModuleInstance) -> AbsResource {
        AbsResource {
            module,
            resource: self.clone(),
        }
    }

    /// The provider local name implied by the resource type: everything
    /// up to the first underscore, so `disk_image` maps to `disk`. The
    /// local name echoes the type; resolvers may override it.
    pub fn default_provider_name(&self) -> &str {
        self.type_name
            .split_once('_')
            .map(|(head, _)| head)
            .unwrap_or(&self.type_name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ResourceMode::Managed => write!(f, "{}.{}", self.type_name, self.name),
            ResourceMode::Data => write!(f, "data.{}.{}", self.type_name, self.name),
        }
    }
}

/// One instance of a resource. A `None` key addresses the single instance
/// of a resource whose count is unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceInstance {
    pub resource: Resource,
    pub key: Option<InstanceKey>,
}

impl ResourceInstance {
    /// The resource this instance belongs to.
    pub fn containing_resource(&self) -> Resource {
        self.resource.clone()
    }

    /// Qualify this instance with a lifecycle phase, for destroy-phase
    /// ordering references.
    pub fn phase(&self, phase: ResourcePhase) -> ResourceInstancePhase {
        ResourceInstancePhase {
            instance: self.clone(),
            phase,
        }
    }

    /// Lift this relative instance into a module-qualified form.
    pub fn absolute(&self, module: ModuleInstance) -> AbsResourceInstance {
        AbsResourceInstance {
            module,
            instance: self.clone(),
        }
    }
}

impl fmt::Display for ResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            None => self.resource.fmt(f),
            Some(key) => write!(f, "{}{}", self.resource, key),
        }
    }
}

/// Lifecycle phases an instance reference can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourcePhase {
    Destroy,
}

impl ResourcePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourcePhase::Destroy => "destroy",
        }
    }
}

/// A resource instance qualified by a lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceInstancePhase {
    pub instance: ResourceInstance,
    pub phase: ResourcePhase,
}

impl ResourceInstancePhase {
    /// The resource the phased instance belongs to.
    pub fn containing_resource(&self) -> Resource {
        self.instance.containing_resource()
    }
}

impl fmt::Display for ResourceInstancePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.instance, self.phase.as_str())
    }
}

/// A resource qualified by the module instance that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsResource {
    pub module: ModuleInstance,
    pub resource: Resource,
}

impl AbsResource {
    /// Refine this absolute resource to one of its instances.
    pub fn instance(&self, key: Option<InstanceKey>) -> AbsResourceInstance {
        AbsResourceInstance {
            module: self.module.clone(),
            instance: self.resource.instance(key),
        }
    }
}

impl fmt::Display for AbsResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            self.resource.fmt(f)
        } else {
            write!(f, "{}.{}", self.module, self.resource)
        }
    }
}

/// A resource instance qualified by the module instance that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsResourceInstance {
    pub module: ModuleInstance,
    pub instance: ResourceInstance,
}

impl AbsResourceInstance {
    /// Strip the instance key, keeping the module qualification.
    pub fn containing_resource(&self) -> AbsResource {
        AbsResource {
            module: self.module.clone(),
            resource: self.instance.containing_resource(),
        }
    }
}

impl fmt::Display for AbsResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            self.instance.fmt(f)
        } else {
            write!(f, "{}.{}", self.module, self.instance)
        }
    }
}
