//! Graph fingerprinting
//!
//! Assigns every node reachable from a root a 32-bit content hash. Two
//! structurally equal nodes almost always share a fingerprint, so the
//! deduplicator can partition by hash before running the exact equality
//! check.
//!
//! Nodes on a dependency cycle cannot be hashed bottom-up; any mutually
//! recursive group falls back to a very poor but safe hash, the size of its
//! strongly-connected component. Non-trivial components are rare in real ABI
//! graphs, so the resulting collisions cost little.
//!
//! Typedefs and named struct, union, and enumeration nodes hash by name
//! only. Their targets are deferred to a todo queue processed at the top
//! level, which keeps name-sugared cycles out of the component finder. Two
//! typedefs with one name over different types therefore collide; the
//! equality pass separates them.

use crate::graph::{Graph, Id, Node, Qualifier, ReferenceKind, StructUnionKind};
use crate::hashing::{hash_combine, hash_str, hash_u64, mix};
use crate::metrics::Metrics;
use crate::scc::Scc;
use std::collections::HashMap;

struct Hasher<'g> {
    graph: &'g Graph,
    hashes: HashMap<Id, u32>,
    todo: Vec<Id>,
    scc: Scc<Id>,
    non_trivial_sizes: Vec<u64>,
}

impl<'g> Hasher<'g> {
    fn new(graph: &'g Graph) -> Self {
        Hasher {
            graph,
            hashes: HashMap::new(),
            todo: Vec::new(),
            scc: Scc::new(),
            non_trivial_sizes: Vec::new(),
        }
    }

    fn hash(&mut self, id: Id) -> u32 {
        if let Some(&hash) = self.hashes.get(&id) {
            return hash;
        }

        let Some(handle) = self.scc.open(&id) else {
            // Already open: a cycle. Return a dummy fingerprint; the whole
            // component gets a fallback value when it closes.
            return 0;
        };

        let mut result = self.hash_node(id);

        let ids = self.scc.close(handle);
        if ids.is_empty() {
            // Still open, result is tentative.
            return result;
        }

        // Closed component. For the trivial case the tentative result
        // already combines every fingerprint below via the spanning tree.
        if ids.len() > 1 {
            result = ids.len() as u32;
            self.non_trivial_sizes.push(ids.len() as u64);
        }
        for id in ids {
            self.hashes.insert(id, result);
        }
        result
    }

    fn hash_node(&mut self, id: Id) -> u32 {
        let graph = self.graph;
        match graph.get(id) {
            Node::Void => tag(b'O'),
            Node::Variadic => tag(b'V'),
            Node::PointerReference(x) => {
                let kind = match x.kind {
                    ReferenceKind::Pointer => b'P',
                    ReferenceKind::LvalueReference => b'L',
                    ReferenceKind::RvalueReference => b'R',
                };
                hash_combine(tag(kind), self.hash(x.pointee_type_id))
            }
            Node::PointerToMember(x) => {
                let h = hash_combine(tag(b'n'), self.hash(x.containing_type_id));
                hash_combine(h, self.hash(x.pointee_type_id))
            }
            Node::Typedef(x) => {
                self.todo.push(x.referred_type_id);
                hash_combine(tag(b'T'), hash_str(&x.name))
            }
            Node::Qualified(x) => {
                let kind = match x.qualifier {
                    Qualifier::Const => b'c',
                    Qualifier::Volatile => b'v',
                    Qualifier::Restrict => b'r',
                };
                hash_combine(tag(kind), self.hash(x.qualified_type_id))
            }
            Node::Primitive(x) => hash_combine(tag(b'i'), hash_str(&x.name)),
            Node::Array(x) => {
                let h = hash_combine(tag(b'A'), hash_u64(x.number_of_elements));
                hash_combine(h, self.hash(x.element_type_id))
            }
            Node::BaseClass(x) => hash_combine(tag(b'B'), self.hash(x.type_id)),
            Node::Method(x) => {
                let h = hash_combine(tag(b'M'), hash_str(&x.mangled_name));
                let h = hash_combine(h, hash_str(&x.name));
                hash_combine(h, self.hash(x.type_id))
            }
            Node::Member(x) => {
                let h = hash_combine(tag(b'D'), hash_str(&x.name));
                let h = hash_combine(h, hash_u64(x.offset));
                hash_combine(h, self.hash(x.type_id))
            }
            Node::StructUnion(x) => {
                let kind = tag(match x.kind {
                    StructUnionKind::Struct => b's',
                    StructUnionKind::Union => b'u',
                });
                if x.name.is_empty() {
                    // Anonymous: hash members structurally, defer the rest.
                    let mut h = kind;
                    if let Some(definition) = &x.definition {
                        self.todo.extend_from_slice(&definition.base_classes);
                        self.todo.extend_from_slice(&definition.methods);
                        for &member in &definition.members {
                            let member_hash = self.hash(member);
                            h = hash_combine(h, member_hash);
                        }
                    }
                    h
                } else {
                    // Named: hash by name only, defer the definition.
                    if let Some(definition) = &x.definition {
                        self.todo.extend_from_slice(&definition.base_classes);
                        self.todo.extend_from_slice(&definition.methods);
                        self.todo.extend_from_slice(&definition.members);
                    }
                    let h = hash_combine(kind, hash_str(&x.name));
                    hash_combine(h, tag(if x.definition.is_some() { b'1' } else { b'0' }))
                }
            }
            Node::Enumeration(x) => {
                if let Some(definition) = &x.definition {
                    self.todo.push(definition.underlying_type_id);
                }
                if x.name.is_empty() {
                    let mut h = tag(b'e');
                    if let Some(definition) = &x.definition {
                        for (name, _) in &definition.enumerators {
                            h = hash_combine(h, hash_str(name));
                        }
                    }
                    h
                } else {
                    let h = hash_combine(tag(b'E'), hash_str(&x.name));
                    hash_combine(h, tag(if x.definition.is_some() { b'1' } else { b'0' }))
                }
            }
            Node::Function(x) => {
                let mut h = hash_combine(tag(b'F'), self.hash(x.return_type_id));
                for &parameter in &x.parameters {
                    let parameter_hash = self.hash(parameter);
                    h = hash_combine(h, parameter_hash);
                }
                h
            }
            Node::ElfSymbol(x) => {
                if let Some(type_id) = x.type_id {
                    self.todo.push(type_id);
                }
                hash_combine(tag(b'S'), hash_str(&x.symbol_name))
            }
            Node::Interface(x) => {
                self.todo.extend(x.symbols.values().copied());
                self.todo.extend(x.types.values().copied());
                tag(b'Z')
            }
        }
    }
}

// every raw scalar is mixed before it reaches the combiner
fn tag(byte: u8) -> u32 {
    mix(u32::from(byte))
}

/// Fingerprints every node reachable from `root`.
pub fn fingerprint(graph: &Graph, root: Id, metrics: &mut Metrics) -> HashMap<Id, u32> {
    metrics.timed("fingerprint.time", |metrics| {
        let mut hasher = Hasher::new(graph);
        hasher.todo.push(root);
        while let Some(id) = hasher.todo.pop() {
            hasher.hash(id);
        }
        metrics.count("fingerprint.nodes", hasher.hashes.len() as u64);
        metrics.histogram(
            "fingerprint.non_trivial_scc_size",
            hasher.non_trivial_sizes.iter().copied(),
        );
        hasher.hashes
    })
}
