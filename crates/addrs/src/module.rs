//! Module instance paths and module call addresses.

use std::fmt;

use crate::resource::InstanceKey;

/// One step in a module instance path: the call name plus the instance
/// key when the call was expanded with `count`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleInstanceStep {
    pub name: String,
    pub key: Option<InstanceKey>,
}

impl fmt::Display for ModuleInstanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            None => write!(f, "module.{}", self.name),
            Some(key) => write!(f, "module.{}{}", self.name, key),
        }
    }
}

/// A concrete invocation of a module, identified by the ordered sequence
/// of calls that led to it. The empty sequence is the top module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleInstance(Vec<ModuleInstanceStep>);

impl ModuleInstance {
    /// The top module.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[ModuleInstanceStep] {
        &self.0
    }

    /// Extend the path by one call.
    pub fn child(&self, name: impl Into<String>, key: Option<InstanceKey>) -> Self {
        let mut steps = self.0.clone();
        steps.push(ModuleInstanceStep {
            name: name.into(),
            key,
        });
        Self(steps)
    }

    pub fn from_steps(steps: Vec<ModuleInstanceStep>) -> Self {
        Self(steps)
    }

    /// The path with the last call removed; `None` for the top module.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Proper ancestors of this path, root first. The top module has no
    /// ancestors; `module.a.module.b` has `[root, module.a]`.
    pub fn ancestors(&self) -> Vec<Self> {
        (0..self.0.len()).map(|i| Self(self.0[..i].to_vec())).collect()
    }

    /// Every non-root prefix of this path, shortest first, including the
    /// path itself. This is the set of module scopes through which the
    /// path's contents can be referenced.
    pub fn non_root_prefixes(&self) -> Vec<Self> {
        (1..=self.0.len()).map(|i| Self(self.0[..i].to_vec())).collect()
    }

    /// Split into the parent path and the bare call of the final step.
    /// `None` for the top module, which was not produced by a call.
    pub fn call(&self) -> Option<(Self, ModuleCall)> {
        let last = self.0.last()?;
        Some((
            self.parent().unwrap_or_default(),
            ModuleCall {
                name: last.name.clone(),
            },
        ))
    }

    /// Split into the parent path and the keyed call of the final step.
    pub fn call_instance(&self) -> Option<(Self, ModuleCallInstance)> {
        let last = self.0.last()?;
        Some((
            self.parent().unwrap_or_default(),
            ModuleCallInstance {
                name: last.name.clone(),
                key: last.key.clone(),
            },
        ))
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            step.fmt(f)?;
            first = false;
        }
        Ok(())
    }
}

/// A `module` block in some calling module, addressed without an
/// instance key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleCall {
    pub name: String,
}

impl fmt::Display for ModuleCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module.{}", self.name)
    }
}

/// A specific instance created by a `module` block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleCallInstance {
    pub name: String,
    pub key: Option<InstanceKey>,
}

impl fmt::Display for ModuleCallInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            None => write!(f, "module.{}", self.name),
            Some(key) => write!(f, "module.{}{}", self.name, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_renders_empty() {
        assert_eq!(ModuleInstance::root().to_string(), "");
        assert!(ModuleInstance::root().is_root());
    }

    #[test]
    fn test_path_render() {
        let m = ModuleInstance::root()
            .child("net", Some(InstanceKey::Index(0)))
            .child("sub", None);
        assert_eq!(m.to_string(), "module.net[0].module.sub");
    }

    #[test]
    fn test_ancestors_root_first() {
        let m = ModuleInstance::root().child("a", None).child("b", None);
        let anc = m.ancestors();
        assert_eq!(anc.len(), 2);
        assert!(anc[0].is_root());
        assert_eq!(anc[1].to_string(), "module.a");
    }

    #[test]
    fn test_non_root_prefixes_include_self() {
        let m = ModuleInstance::root().child("a", None).child("b", None);
        let prefixes = m.non_root_prefixes();
        assert_eq!(prefixes.len(), 2);
        assert_eq!(prefixes[0].to_string(), "module.a");
        assert_eq!(prefixes[1].to_string(), "module.a.module.b");
    }

    #[test]
    fn test_call_and_call_instance() {
        let m = ModuleInstance::root().child("net", Some(InstanceKey::Index(1)));
        let (parent, call) = m.call().unwrap();
        assert!(parent.is_root());
        assert_eq!(call.to_string(), "module.net");

        let (parent, inst) = m.call_instance().unwrap();
        assert!(parent.is_root());
        assert_eq!(inst.to_string(), "module.net[1]");

        assert!(ModuleInstance::root().call().is_none());
    }
}
