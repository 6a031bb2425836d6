//! Type unification
//!
//! Unification is structural equality that produces a substitution instead
//! of a boolean. It differs from the equality pass in recursion control,
//! caching, and its handling of named struct, union, and enumeration nodes:
//! a declaration and a definition of the same named type unify, with the
//! defined side retained. This is forward declaration resolution.
//!
//! A [`Unification`] accumulates committed substitutions in a union-find
//! over ids. Each [`unify`] attempt keeps its own tentative mapping and only
//! commits if the whole attempt succeeds.

use crate::graph::{DenseIdMapping, Graph, Id, Node, Pair};
use crate::substitution::substitute;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Committed id substitutions: a union-find with path halving and no union
/// by rank.
pub struct Unification {
    mapping: DenseIdMapping,
}

impl Unification {
    pub fn new(graph: &Graph) -> Self {
        Unification {
            mapping: graph.dense_id_mapping(),
        }
    }

    pub fn find(&mut self, id: Id) -> Id {
        let mut id = id;
        loop {
            let parent = self.mapping.get(id);
            if parent == id {
                return id;
            }
            let grandparent = self.mapping.get(parent);
            if grandparent == parent {
                return parent;
            }
            self.mapping.set(id, grandparent);
            id = grandparent;
        }
    }

    /// Records that `id1` is to be replaced by `id2`; `id2` is always
    /// preferred as the representative.
    pub fn unite(&mut self, id1: Id, id2: Id) {
        let fid1 = self.find(id1);
        let fid2 = self.find(id2);
        if fid1 == fid2 {
            return;
        }
        self.mapping.set(fid1, fid2);
    }

    /// Rewrites `id` to its representative.
    pub fn update(&mut self, id: &mut Id) {
        let fid = self.find(*id);
        if fid != *id {
            *id = fid;
        }
    }

    /// Rewrites the whole graph: non-representative nodes are removed and
    /// every remaining reference is redirected to its representative.
    /// Returns (removed, retained) node counts.
    pub fn rewrite(&mut self, graph: &mut Graph) -> (u64, u64) {
        let mut removed = 0;
        let mut retained = 0;
        for id in graph.ids() {
            if self.find(id) != id {
                graph.remove(id);
                removed += 1;
            } else {
                substitute(graph, id, &mut |id| self.find(id));
                retained += 1;
            }
        }
        debug!(removed, retained, "unification rewrite");
        (removed, retained)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Winner {
    Neither,
    Right,
    Left,
}

struct Unifier<'g, 'u> {
    graph: &'g Graph,
    unification: &'u mut Unification,
    seen: HashSet<Pair>,
    mapping: HashMap<Id, Id>,
}

impl<'g, 'u> Unifier<'g, 'u> {
    fn new(graph: &'g Graph, unification: &'u mut Unification) -> Self {
        Unifier {
            graph,
            unification,
            seen: HashSet::new(),
            mapping: HashMap::new(),
        }
    }

    /// Representative through both the committed and the tentative mapping.
    fn find(&mut self, id: Id) -> Id {
        let mut id = id;
        loop {
            id = self.unification.find(id);
            match self.mapping.get(&id) {
                Some(&next) => id = next,
                None => return id,
            }
        }
    }

    fn unify_ids(&mut self, id1: Id, id2: Id) -> bool {
        let mut fid1 = self.find(id1);
        let mut fid2 = self.find(id2);
        if fid1 == fid2 {
            return true;
        }

        // Check if the comparison is already in progress or done.
        //
        // Opportunistic as seen is unaware of new mappings.
        if !self.seen.insert((fid1, fid2)) {
            return true;
        }

        let winner = self.unify_nodes(fid1, fid2);
        if winner == Winner::Neither {
            return false;
        }

        // These will occasionally get substituted due to a recursive call.
        fid1 = self.find(fid1);
        fid2 = self.find(fid2);
        if fid1 == fid2 {
            return true;
        }

        if winner == Winner::Left {
            std::mem::swap(&mut fid1, &mut fid2);
        }
        self.mapping.insert(fid1, fid2);
        true
    }

    fn unify_lists(&mut self, ids1: &[Id], ids2: &[Id]) -> bool {
        ids1.len() == ids2.len()
            && ids1
                .iter()
                .zip(ids2.iter())
                .all(|(&id1, &id2)| self.unify_ids(id1, id2))
    }

    fn unify_maps(&mut self, ids1: &BTreeMap<String, Id>, ids2: &BTreeMap<String, Id>) -> bool {
        ids1.len() == ids2.len()
            && ids1
                .iter()
                .zip(ids2.iter())
                .all(|((key1, &id1), (key2, &id2))| key1 == key2 && self.unify_ids(id1, id2))
    }

    fn unify_nodes(&mut self, id1: Id, id2: Id) -> Winner {
        let graph = self.graph;
        let equal = |ok: bool| if ok { Winner::Right } else { Winner::Neither };
        match (graph.get(id1), graph.get(id2)) {
            (Node::Void, Node::Void) => Winner::Right,
            (Node::Variadic, Node::Variadic) => Winner::Right,
            (Node::PointerReference(x1), Node::PointerReference(x2)) => equal(
                x1.kind == x2.kind && self.unify_ids(x1.pointee_type_id, x2.pointee_type_id),
            ),
            (Node::PointerToMember(x1), Node::PointerToMember(x2)) => equal(
                self.unify_ids(x1.containing_type_id, x2.containing_type_id)
                    && self.unify_ids(x1.pointee_type_id, x2.pointee_type_id),
            ),
            (Node::Typedef(x1), Node::Typedef(x2)) => equal(
                x1.name == x2.name && self.unify_ids(x1.referred_type_id, x2.referred_type_id),
            ),
            (Node::Qualified(x1), Node::Qualified(x2)) => equal(
                x1.qualifier == x2.qualifier
                    && self.unify_ids(x1.qualified_type_id, x2.qualified_type_id),
            ),
            (Node::Primitive(x1), Node::Primitive(x2)) => equal(
                x1.name == x2.name && x1.encoding == x2.encoding && x1.bytesize == x2.bytesize,
            ),
            (Node::Array(x1), Node::Array(x2)) => equal(
                x1.number_of_elements == x2.number_of_elements
                    && self.unify_ids(x1.element_type_id, x2.element_type_id),
            ),
            (Node::BaseClass(x1), Node::BaseClass(x2)) => equal(
                x1.offset == x2.offset
                    && x1.inheritance == x2.inheritance
                    && self.unify_ids(x1.type_id, x2.type_id),
            ),
            (Node::Method(x1), Node::Method(x2)) => equal(
                x1.mangled_name == x2.mangled_name
                    && x1.name == x2.name
                    && x1.kind == x2.kind
                    && x1.vtable_offset == x2.vtable_offset
                    && self.unify_ids(x1.type_id, x2.type_id),
            ),
            (Node::Member(x1), Node::Member(x2)) => equal(
                x1.name == x2.name
                    && x1.offset == x2.offset
                    && x1.bitsize == x2.bitsize
                    && self.unify_ids(x1.type_id, x2.type_id),
            ),
            (Node::StructUnion(x1), Node::StructUnion(x2)) => {
                let mut result = x1.kind == x2.kind && x1.name == x2.name;
                // allow absence mismatches, forward declarations always unify
                if result
                    && let (Some(definition1), Some(definition2)) =
                        (&x1.definition, &x2.definition)
                {
                    result = definition1.bytesize == definition2.bytesize
                        && self.unify_lists(&definition1.base_classes, &definition2.base_classes)
                        && self.unify_lists(&definition1.methods, &definition2.methods)
                        && self.unify_lists(&definition1.members, &definition2.members);
                }
                if !result {
                    Winner::Neither
                } else if x2.definition.is_some() {
                    Winner::Right
                } else {
                    Winner::Left
                }
            }
            (Node::Enumeration(x1), Node::Enumeration(x2)) => {
                let mut result = x1.name == x2.name;
                // allow absence mismatches, forward declarations always unify
                if result
                    && let (Some(definition1), Some(definition2)) =
                        (&x1.definition, &x2.definition)
                {
                    result = definition1.enumerators == definition2.enumerators
                        && self.unify_ids(
                            definition1.underlying_type_id,
                            definition2.underlying_type_id,
                        );
                }
                if !result {
                    Winner::Neither
                } else if x2.definition.is_some() {
                    Winner::Right
                } else {
                    Winner::Left
                }
            }
            (Node::Function(x1), Node::Function(x2)) => equal(
                self.unify_lists(&x1.parameters, &x2.parameters)
                    && self.unify_ids(x1.return_type_id, x2.return_type_id),
            ),
            (Node::ElfSymbol(x1), Node::ElfSymbol(x2)) => {
                let mut result = x1.symbol_name == x2.symbol_name
                    && x1.version_info == x2.version_info
                    && x1.is_defined == x2.is_defined
                    && x1.symbol_type == x2.symbol_type
                    && x1.binding == x2.binding
                    && x1.visibility == x2.visibility
                    && x1.crc == x2.crc
                    && x1.namespace == x2.namespace
                    && x1.full_name == x2.full_name
                    && x1.type_id.is_some() == x2.type_id.is_some();
                if result && let (Some(type_id1), Some(type_id2)) = (x1.type_id, x2.type_id) {
                    result = self.unify_ids(type_id1, type_id2);
                }
                equal(result)
            }
            (Node::Interface(x1), Node::Interface(x2)) => equal(
                self.unify_maps(&x1.symbols, &x2.symbols) && self.unify_maps(&x1.types, &x2.types),
            ),
            // variant mismatch
            _ => Winner::Neither,
        }
    }
}

/// Attempts to unify `id1` with `id2`; on success the substitution is
/// committed to `unification` (with `id1`'s side absorbed where neither
/// side is preferred).
pub fn unify(graph: &Graph, unification: &mut Unification, id1: Id, id2: Id) -> bool {
    let mut unifier = Unifier::new(graph, unification);
    if unifier.unify_ids(id1, id2) {
        let mapping = std::mem::take(&mut unifier.mapping);
        for (from, to) in mapping {
            unification.unite(from, to);
        }
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::*;

    fn declaration(graph: &mut Graph, name: &str) -> Id {
        graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: name.to_string(),
            definition: None,
        }))
    }

    fn definition(graph: &mut Graph, name: &str, bytesize: u64) -> Id {
        graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: name.to_string(),
            definition: Some(StructUnionDefinition {
                bytesize,
                base_classes: vec![],
                methods: vec![],
                members: vec![],
            }),
        }))
    }

    #[test]
    fn test_declaration_unifies_onto_definition() {
        let mut graph = Graph::new();
        let decl = declaration(&mut graph, "S");
        let def = definition(&mut graph, "S", 4);
        let mut unification = Unification::new(&graph);
        assert!(unify(&graph, &mut unification, decl, def));
        assert_eq!(unification.find(decl), def);
    }

    #[test]
    fn test_definition_wins_regardless_of_argument_order() {
        let mut graph = Graph::new();
        let decl = declaration(&mut graph, "S");
        let def = definition(&mut graph, "S", 4);
        let mut unification = Unification::new(&graph);
        assert!(unify(&graph, &mut unification, def, decl));
        assert_eq!(unification.find(decl), def);
        assert_eq!(unification.find(def), def);
    }

    #[test]
    fn test_conflicting_definitions_do_not_unify() {
        let mut graph = Graph::new();
        let def1 = definition(&mut graph, "S", 4);
        let def2 = definition(&mut graph, "S", 8);
        let mut unification = Unification::new(&graph);
        assert!(!unify(&graph, &mut unification, def1, def2));
        // failed attempts commit nothing
        assert_eq!(unification.find(def1), def1);
        assert_eq!(unification.find(def2), def2);
    }

    #[test]
    fn test_name_or_kind_mismatch_does_not_unify() {
        let mut graph = Graph::new();
        let s = declaration(&mut graph, "S");
        let t = declaration(&mut graph, "T");
        let union_s = graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Union,
            name: "S".to_string(),
            definition: None,
        }));
        let mut unification = Unification::new(&graph);
        assert!(!unify(&graph, &mut unification, s, t));
        assert!(!unify(&graph, &mut unification, s, union_s));
    }

    #[test]
    fn test_recursive_types_unify() {
        // struct S; struct S* vs struct S { struct S* next; } reached via
        // two pointers that must themselves unify
        let mut graph = Graph::new();
        let decl = declaration(&mut graph, "S");
        let pointer_to_decl = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: decl,
        }));
        let def = graph.allocate();
        let pointer_to_def = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: def,
        }));
        let member = graph.add(Node::Member(Member {
            name: "next".to_string(),
            type_id: pointer_to_def,
            offset: 0,
            bitsize: 0,
        }));
        graph.set(
            def,
            Node::StructUnion(StructUnion {
                kind: StructUnionKind::Struct,
                name: "S".to_string(),
                definition: Some(StructUnionDefinition {
                    bytesize: 8,
                    base_classes: vec![],
                    methods: vec![],
                    members: vec![member],
                }),
            }),
        );
        let mut unification = Unification::new(&graph);
        assert!(unify(&graph, &mut unification, pointer_to_decl, pointer_to_def));
        assert_eq!(unification.find(decl), def);
        assert_eq!(unification.find(pointer_to_decl), pointer_to_def);
    }

    #[test]
    fn test_rewrite_removes_absorbed_nodes() {
        let mut graph = Graph::new();
        let decl = declaration(&mut graph, "S");
        let def = definition(&mut graph, "S", 4);
        let pointer = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: decl,
        }));
        let mut unification = Unification::new(&graph);
        assert!(unify(&graph, &mut unification, decl, def));
        let (removed, retained) = unification.rewrite(&mut graph);
        assert_eq!((removed, retained), (1, 2));
        assert!(!graph.is_set(decl));
        match graph.get(pointer) {
            Node::PointerReference(x) => assert_eq!(x.pointee_type_id, def),
            other => panic!("unexpected node: {other:?}"),
        }
    }
}
