//! Reference resolution over a built vertex set.
//!
//! The map indexes every referenceable vertex by `"{path}|{address}"`
//! keys and answers two questions: which vertices does a given vertex
//! refer to, and which vertices refer to it. It holds vertex ids only;
//! the graph keeps sole ownership of the vertices.

use std::collections::BTreeMap;

use dag::{Graph, VertexId};

use addrs::{ModuleInstance, Referenceable};

use crate::vertex::Vertex;

/// Reference lookup tables for one graph.
#[derive(Debug, Default)]
pub struct ReferenceMap {
    /// Reference key -> vertices identified by that key. One key can
    /// name several vertices, e.g. a resource and its instances.
    referents: BTreeMap<String, Vec<VertexId>>,
    /// Reference key -> vertices that declare a reference to that key.
    referrers: BTreeMap<String, Vec<VertexId>>,
}

impl ReferenceMap {
    /// Index every referenceable and referring vertex of the graph.
    pub fn new(graph: &Graph<Vertex>) -> Self {
        let mut referents: BTreeMap<String, Vec<VertexId>> = BTreeMap::new();
        let mut referrers: BTreeMap<String, Vec<VertexId>> = BTreeMap::new();

        for (id, vertex) in graph.vertices() {
            let Some(path) = vertex.path() else {
                continue;
            };
            let addrs = vertex.referenceable_addrs();
            if addrs.is_empty() {
                continue;
            }

            let referent_path = referenceable_path(vertex, path);
            for addr in addrs {
                referents
                    .entry(map_key(&referent_path, &addr))
                    .or_default()
                    .push(id);
            }

            // The vertex is also reachable through the module call that
            // created each module on its path, in both bare and keyed
            // form, so `module.foo` and `module.foo[0]` both resolve.
            for prefix in referent_path.non_root_prefixes() {
                let (call_path, call) = prefix
                    .call()
                    .expect("non-root prefix always has a final call");
                let (inst_path, call_inst) = prefix
                    .call_instance()
                    .expect("non-root prefix always has a final call");
                referents
                    .entry(map_key(&call_path, &Referenceable::ModuleCall(call)))
                    .or_default()
                    .push(id);
                referents
                    .entry(map_key(&inst_path, &Referenceable::ModuleCallInstance(call_inst)))
                    .or_default()
                    .push(id);
            }
        }

        for (id, vertex) in graph.vertices() {
            let Some(path) = vertex.path() else {
                continue;
            };
            let ref_path = reference_path(vertex, path);
            for reference in vertex.references() {
                referrers
                    .entry(map_key(&ref_path, &reference.subject))
                    .or_default()
                    .push(id);
            }
        }

        Self {
            referents,
            referrers,
        }
    }

    /// The vertices `id` refers to, plus the subjects that resolved to
    /// nothing. Self-references are dropped; an instance subject with no
    /// vertex of its own falls back to its containing resource.
    pub fn references(
        &self,
        graph: &Graph<Vertex>,
        id: VertexId,
    ) -> (Vec<VertexId>, Vec<Referenceable>) {
        let Some(vertex) = graph.get(id) else {
            return (Vec::new(), Vec::new());
        };
        let Some(path) = vertex.path() else {
            return (Vec::new(), Vec::new());
        };
        let ref_path = reference_path(vertex, path);

        let mut matches = Vec::new();
        let mut missing = Vec::new();

        for reference in vertex.references() {
            let mut subject = reference.subject.clone();
            let mut key = map_key(&ref_path, &subject);

            if !self.referents.contains_key(&key) {
                // A resource-oriented graph may carry the resource
                // itself where an instance was referenced.
                if let Some(container) = subject.containing_resource() {
                    subject = container;
                    key = map_key(&ref_path, &subject);
                }
            }

            match self.referents.get(&key) {
                Some(ids) if !ids.is_empty() => {
                    for referent in ids {
                        if *referent == id {
                            continue;
                        }
                        matches.push(*referent);
                    }
                }
                _ => missing.push(reference.subject),
            }
        }

        (matches, missing)
    }

    /// The vertices that refer to `id`.
    pub fn referrers(&self, graph: &Graph<Vertex>, id: VertexId) -> Vec<VertexId> {
        let Some(vertex) = graph.get(id) else {
            return Vec::new();
        };
        let Some(path) = vertex.path() else {
            return Vec::new();
        };
        let self_path = referenceable_path(vertex, path);

        let mut matches = Vec::new();
        for addr in vertex.referenceable_addrs() {
            let key = map_key(&self_path, &addr);
            let Some(referrers) = self.referrers.get(&key) else {
                continue;
            };
            if referrers.contains(&id) {
                // A key whose referrers include the vertex itself is a
                // self-reference; skip the whole key.
                continue;
            }
            matches.extend(referrers.iter().copied());
        }
        matches
    }
}

/// The path a vertex's referenceable addresses are relative to.
fn referenceable_path(vertex: &Vertex, own: &ModuleInstance) -> ModuleInstance {
    match vertex.reference_outside() {
        Some((self_path, _)) => self_path,
        None => own.clone(),
    }
}

/// The path a vertex's references are resolved in.
fn reference_path(vertex: &Vertex, own: &ModuleInstance) -> ModuleInstance {
    match vertex.reference_outside() {
        Some((_, ref_path)) => ref_path,
        None => own.clone(),
    }
}

/// The separator never occurs in a rendered path or address, so the key
/// is unambiguous.
fn map_key(path: &ModuleInstance, addr: &Referenceable) -> String {
    format!("{path}|{addr}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use addrs::{InstanceKey, Reference, Resource};

    use crate::config::ConfigBlock;
    use crate::vertex::{InstanceNode, ValueNode};

    fn instance_vertex(key: Option<InstanceKey>, refs: Vec<Reference>) -> Vertex {
        let mut node = InstanceNode::new(
            Resource::managed("disk", "web")
                .absolute(ModuleInstance::root())
                .instance(key),
        );
        let mut config = ConfigBlock::new();
        config.refs = refs;
        node.config = Some(config);
        Vertex::Instance(node)
    }

    fn local_vertex(name: &str, refs: Vec<Reference>) -> Vertex {
        Vertex::Local(ValueNode::new(ModuleInstance::root(), name).with_refs(refs))
    }

    #[test]
    fn test_resolve_local_reference() {
        let mut g = Graph::new();
        let target = g.add(local_vertex("base", Vec::new()));
        let subject = Referenceable::LocalValue(addrs::LocalValue { name: "base".into() });
        let referrer = g.add(local_vertex("derived", vec![Reference::new(subject)]));

        let map = ReferenceMap::new(&g);
        let (matches, missing) = map.references(&g, referrer);
        assert_eq!(matches, vec![target]);
        assert!(missing.is_empty());

        assert_eq!(map.referrers(&g, target), vec![referrer]);
    }

    #[test]
    fn test_instance_subject_falls_back_to_resource() {
        let mut g = Graph::new();
        // Only the whole-resource vertex exists.
        let resource = g.add(Vertex::Resource(crate::vertex::ResourceNode {
            addr: Resource::managed("disk", "web").absolute(ModuleInstance::root()),
            config: ConfigBlock::new(),
            provider: String::new(),
        }));
        let subject = Referenceable::ResourceInstance(
            Resource::managed("disk", "web").instance(Some(InstanceKey::Index(0))),
        );
        let referrer = g.add(local_vertex("x", vec![Reference::new(subject)]));

        let map = ReferenceMap::new(&g);
        let (matches, missing) = map.references(&g, referrer);
        assert_eq!(matches, vec![resource]);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_missing_subject_reported_not_fatal() {
        let mut g = Graph::new();
        let subject = Referenceable::LocalValue(addrs::LocalValue { name: "ghost".into() });
        let referrer = g.add(local_vertex("x", vec![Reference::new(subject.clone())]));

        let map = ReferenceMap::new(&g);
        let (matches, missing) = map.references(&g, referrer);
        assert!(matches.is_empty());
        assert_eq!(missing, vec![subject]);
    }

    #[test]
    fn test_never_resolves_to_self() {
        let mut g = Graph::new();
        let subject = Referenceable::Resource(Resource::managed("disk", "web"));
        let v = g.add(instance_vertex(None, vec![Reference::new(subject)]));

        let map = ReferenceMap::new(&g);
        let (matches, _) = map.references(&g, v);
        assert!(matches.is_empty(), "self-reference must be dropped");
        assert!(map.referrers(&g, v).is_empty());
    }

    #[test]
    fn test_module_call_aliases() {
        let child = ModuleInstance::root().child("net", Some(InstanceKey::Index(0)));
        let mut g = Graph::new();
        let inner = g.add(Vertex::Local(ValueNode::new(child, "x")));

        // Referencing the module call from the root scope reaches the
        // vertex both bare and keyed.
        for text in ["module.net", "module.net[0]"] {
            let subject = Referenceable::parse(text).unwrap();
            let referrer = g.add(local_vertex("y", vec![Reference::new(subject)]));
            let map = ReferenceMap::new(&g);
            let (matches, missing) = map.references(&g, referrer);
            assert_eq!(matches, vec![inner], "via {text}");
            assert!(missing.is_empty());
            g.remove(referrer);
        }
    }

    #[test]
    fn test_variable_referenced_from_own_module() {
        // A variable of module.net is declared there but resolves its
        // expressions in the caller's scope.
        let child = ModuleInstance::root().child("net", None);
        let mut g = Graph::new();

        let var = g.add(Vertex::Variable(
            ValueNode::new(child.clone(), "region").with_refs(vec![Reference::new(
                Referenceable::LocalValue(addrs::LocalValue { name: "region".into() }),
            )]),
        ));
        // The caller-scope local the variable's expression refers to.
        let caller_local = g.add(local_vertex("region", Vec::new()));
        // A consumer inside the child module.
        let consumer = g.add(Vertex::Local(
            ValueNode::new(child, "derived").with_refs(vec![Reference::new(
                Referenceable::InputVariable(addrs::InputVariable { name: "region".into() }),
            )]),
        ));

        let map = ReferenceMap::new(&g);

        let (var_refs, missing) = map.references(&g, var);
        assert_eq!(var_refs, vec![caller_local], "variable sees caller scope");
        assert!(missing.is_empty());

        let (consumer_refs, missing) = map.references(&g, consumer);
        assert_eq!(consumer_refs, vec![var], "consumer sees the variable");
        assert!(missing.is_empty());
    }
}
