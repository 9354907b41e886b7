//! Graph vertices and their capabilities.
//!
//! Capabilities are composed on a tagged enum rather than discovered by
//! downcasting: each transformer asks the vertex what it can do through
//! an accessor and gets `Option`/`bool` answers. A vertex is owned by
//! the graph; everything else holds its id.

use std::fmt;

use addrs::{
    AbsResource, AbsResourceInstance, InputVariable, LocalValue, ModuleInstance, OutputValue,
    Reference, Referenceable, ResourceMode, ResourcePhase,
};

use crate::config::ConfigBlock;
use crate::state::ResourceRecord;

/// A declared resource before expansion. Data-mode resource nodes expand
/// dynamically into per-instance subgraphs during the walk.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub addr: AbsResource,
    pub config: ConfigBlock,
    /// Fully qualified name of the resolved provider
    pub provider: String,
}

/// One concrete instance of a resource, live or destroyable.
#[derive(Debug, Clone)]
pub struct InstanceNode {
    pub addr: AbsResourceInstance,
    /// Present on live instances; destroyable instances work from state
    pub config: Option<ConfigBlock>,
    pub provider: String,
    /// Existing state for this instance, attached by a transformer
    pub state: Option<ResourceRecord>,
    /// Distinct absolute resources this instance depends on, attached
    /// by a transformer and persisted for destroy ordering
    pub dependencies: Vec<AbsResource>,
}

impl InstanceNode {
    pub fn new(addr: AbsResourceInstance) -> Self {
        Self {
            addr,
            config: None,
            provider: String::new(),
            state: None,
            dependencies: Vec::new(),
        }
    }
}

/// A named value within a module: a local, an input variable, or an
/// output.
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub module: ModuleInstance,
    pub name: String,
    pub refs: Vec<Reference>,
}

impl ValueNode {
    pub fn new(module: ModuleInstance, name: impl Into<String>) -> Self {
        Self {
            module,
            name: name.into(),
            refs: Vec::new(),
        }
    }

    pub fn with_refs(mut self, refs: Vec<Reference>) -> Self {
        self.refs = refs;
        self
    }
}

/// A graph vertex. Which capabilities a vertex has follows from its
/// variant alone.
#[derive(Debug, Clone)]
pub enum Vertex {
    Resource(ResourceNode),
    Instance(InstanceNode),
    DestroyInstance(InstanceNode),
    Local(ValueNode),
    Variable(ValueNode),
    Output(ValueNode),
    DestroyOutput(ValueNode),
    Root,
}

impl Vertex {
    /// The module instance this vertex belongs to. Only the synthetic
    /// root lives outside every module.
    pub fn path(&self) -> Option<&ModuleInstance> {
        match self {
            Vertex::Resource(n) => Some(&n.addr.module),
            Vertex::Instance(n) | Vertex::DestroyInstance(n) => Some(&n.addr.module),
            Vertex::Local(n)
            | Vertex::Variable(n)
            | Vertex::Output(n)
            | Vertex::DestroyOutput(n) => Some(&n.module),
            Vertex::Root => None,
        }
    }

    /// Addresses under which this vertex can be referenced, relative to
    /// its referenceable path. A resource and its instances share the
    /// resource alias.
    pub fn referenceable_addrs(&self) -> Vec<Referenceable> {
        match self {
            Vertex::Resource(n) => vec![Referenceable::Resource(n.addr.resource.clone())],
            Vertex::Instance(n) => vec![
                Referenceable::Resource(n.addr.instance.resource.clone()),
                Referenceable::ResourceInstance(n.addr.instance.clone()),
            ],
            Vertex::DestroyInstance(n) => vec![Referenceable::ResourceInstancePhase(
                n.addr.instance.phase(ResourcePhase::Destroy),
            )],
            Vertex::Local(n) => vec![Referenceable::LocalValue(LocalValue {
                name: n.name.clone(),
            })],
            Vertex::Variable(n) => vec![Referenceable::InputVariable(InputVariable {
                name: n.name.clone(),
            })],
            Vertex::Output(n) | Vertex::DestroyOutput(n) => {
                vec![Referenceable::OutputValue(OutputValue {
                    name: n.name.clone(),
                })]
            }
            Vertex::Root => Vec::new(),
        }
    }

    /// References this vertex declares. Destroyable instances use only
    /// their own state, so they declare none.
    pub fn references(&self) -> Vec<Reference> {
        match self {
            Vertex::Resource(n) => n.config.references(),
            Vertex::Instance(n) => n
                .config
                .as_ref()
                .map(ConfigBlock::references)
                .unwrap_or_default(),
            Vertex::DestroyInstance(_) => Vec::new(),
            Vertex::Local(n)
            | Vertex::Variable(n)
            | Vertex::Output(n)
            | Vertex::DestroyOutput(n) => n.refs.clone(),
            Vertex::Root => Vec::new(),
        }
    }

    /// For vertices whose referenceable addresses or references live in
    /// a different module than the vertex itself: (self path, reference
    /// path). Module input variables are declared in their own module
    /// but their expressions resolve in the caller's scope.
    pub fn reference_outside(&self) -> Option<(ModuleInstance, ModuleInstance)> {
        match self {
            Vertex::Variable(n) => {
                let reference_path = n.module.parent().unwrap_or_default();
                Some((n.module.clone(), reference_path))
            }
            _ => None,
        }
    }

    /// Destroyer vertices get no reference edges: their inputs come
    /// from state alone.
    pub fn is_destroyer(&self) -> bool {
        matches!(self, Vertex::DestroyInstance(_))
    }

    pub fn is_destroy_output(&self) -> bool {
        matches!(self, Vertex::DestroyOutput(_))
    }

    /// Data-mode resource nodes expand into per-instance subgraphs
    /// during the walk.
    pub fn dynamic_expandable(&self) -> Option<&ResourceNode> {
        match self {
            Vertex::Resource(n) if n.addr.resource.mode == ResourceMode::Data => Some(n),
            _ => None,
        }
    }

    /// The absolute resource this vertex represents or belongs to.
    pub fn resource_addr(&self) -> Option<AbsResource> {
        match self {
            Vertex::Resource(n) => Some(n.addr.clone()),
            Vertex::Instance(n) | Vertex::DestroyInstance(n) => {
                Some(n.addr.containing_resource())
            }
            _ => None,
        }
    }

    pub fn instance_addr(&self) -> Option<&AbsResourceInstance> {
        match self {
            Vertex::Instance(n) | Vertex::DestroyInstance(n) => Some(&n.addr),
            _ => None,
        }
    }

    /// Whether the dependency-attachment pass records ancestors on this
    /// vertex. Data sources do not track destroy dependencies.
    pub fn wants_dependencies(&self) -> bool {
        match self {
            Vertex::Instance(n) => n.addr.instance.resource.mode == ResourceMode::Managed,
            _ => false,
        }
    }

    pub fn attach_dependencies(&mut self, deps: Vec<AbsResource>) {
        if let Vertex::Instance(n) = self {
            n.dependencies = deps;
        }
    }

    pub fn attach_state(&mut self, record: ResourceRecord) {
        match self {
            Vertex::Instance(n) | Vertex::DestroyInstance(n) => n.state = Some(record),
            _ => {}
        }
    }

    /// Whether the prune pass may remove this vertex when nothing
    /// depends on it. Root-module outputs survive unless the plan is a
    /// destroy.
    pub fn is_prunable_value(&self, destroy: bool) -> bool {
        match self {
            Vertex::Local(_) | Vertex::Variable(_) => true,
            Vertex::Output(n) => destroy || !n.module.is_root(),
            _ => false,
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn scoped(f: &mut fmt::Formatter<'_>, module: &ModuleInstance, inner: String) -> fmt::Result {
            if module.is_root() {
                write!(f, "{inner}")
            } else {
                write!(f, "{module}.{inner}")
            }
        }
        match self {
            Vertex::Resource(n) => write!(f, "{}", n.addr),
            Vertex::Instance(n) => write!(f, "{}", n.addr),
            Vertex::DestroyInstance(n) => write!(f, "{} (destroy)", n.addr),
            Vertex::Local(n) => scoped(f, &n.module, format!("local.{}", n.name)),
            Vertex::Variable(n) => scoped(f, &n.module, format!("var.{}", n.name)),
            Vertex::Output(n) => scoped(f, &n.module, format!("output.{}", n.name)),
            Vertex::DestroyOutput(n) => {
                scoped(f, &n.module, format!("output.{} (destroy)", n.name))
            }
            Vertex::Root => write!(f, "root"),
        }
    }
}
