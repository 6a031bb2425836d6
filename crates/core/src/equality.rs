//! Structural equality
//!
//! Decides whether two ids denote structurally identical types. The
//! predicate only cares about node and edge attributes and is blind to node
//! identity, so it works across subgraphs that have not been deduplicated.
//!
//! Cycles are handled with the shared component finder: a back edge to an
//! open comparison returns a tentative "equal", and when a component closes,
//! every comparison in it is committed to the cache with the accumulated
//! outcome. The cache is pluggable; [`HashingEqualityCache`] additionally
//! short-circuits on distinct fingerprints and maintains a union-find over
//! proven-equal ids.

use crate::graph::{Graph, Id, Node, Pair};
use crate::scc::Scc;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Remembered equality outcomes, queried before any structural recursion.
pub trait EqualityCache {
    fn query(&mut self, comparison: Pair) -> Option<bool>;
    fn all_same(&mut self, comparisons: &[Pair]);
    fn all_different(&mut self, comparisons: &[Pair]);
}

/// Caches only proven equalities, symmetrically blind to everything else.
#[derive(Debug, Default)]
pub struct SimpleEqualityCache {
    known_equalities: HashSet<Pair>,
}

impl SimpleEqualityCache {
    pub fn new() -> Self {
        SimpleEqualityCache::default()
    }
}

impl EqualityCache for SimpleEqualityCache {
    fn query(&mut self, comparison: Pair) -> Option<bool> {
        let (id1, id2) = comparison;
        if id1 == id2 || self.known_equalities.contains(&comparison) {
            return Some(true);
        }
        None
    }

    fn all_same(&mut self, comparisons: &[Pair]) {
        self.known_equalities.extend(comparisons.iter().copied());
    }

    fn all_different(&mut self, _comparisons: &[Pair]) {}
}

/// Equality cache backed by node fingerprints and a union-find.
///
/// Distinct fingerprints prove inequality without recursion. Proven-equal
/// ids are unioned (path halving, no rank); proven-unequal representative
/// pairs are recorded symmetrically and follow union operations.
#[derive(Debug)]
pub struct HashingEqualityCache<'h> {
    hashes: &'h HashMap<Id, u32>,
    mapping: HashMap<Id, Id>,
    inequalities: HashMap<Id, HashSet<Id>>,
}

impl<'h> HashingEqualityCache<'h> {
    pub fn new(hashes: &'h HashMap<Id, u32>) -> Self {
        HashingEqualityCache {
            hashes,
            mapping: HashMap::new(),
            inequalities: HashMap::new(),
        }
    }

    fn distinct_hashes(&self, id1: Id, id2: Id) -> bool {
        match (self.hashes.get(&id1), self.hashes.get(&id2)) {
            (Some(hash1), Some(hash2)) => hash1 != hash2,
            _ => false,
        }
    }

    /// Representative of the id's equality class, with path halving.
    pub fn find(&mut self, id: Id) -> Id {
        let mut id = id;
        loop {
            let Some(&parent) = self.mapping.get(&id) else {
                return id;
            };
            let Some(&grandparent) = self.mapping.get(&parent) else {
                return parent;
            };
            self.mapping.insert(id, grandparent);
            id = grandparent;
        }
    }

    fn union(&mut self, id1: Id, id2: Id) {
        if self.distinct_hashes(id1, id2) {
            panic!("internal error: union of {id1} and {id2} with distinct hashes");
        }
        let fid1 = self.find(id1);
        let fid2 = self.find(id2);
        if fid1 == fid2 {
            return;
        }
        self.mapping.insert(fid1, fid2);
        // move inequality edges from the absorbed representative
        if let Some(source) = self.inequalities.remove(&fid1) {
            for fid in source {
                if fid == fid2 {
                    panic!("internal error: union of unequal {fid1} and {fid2}");
                }
                self.inequalities.entry(fid2).or_default().insert(fid);
                let edges = self.inequalities.entry(fid).or_default();
                edges.remove(&fid1);
                edges.insert(fid2);
            }
        }
    }

    fn disunion(&mut self, id1: Id, id2: Id) {
        if self.distinct_hashes(id1, id2) {
            return;
        }
        let fid1 = self.find(id1);
        let fid2 = self.find(id2);
        if fid1 == fid2 {
            panic!("internal error: disunion of equal {id1} and {id2}");
        }
        if self.inequalities.entry(fid1).or_default().insert(fid2) {
            self.inequalities.entry(fid2).or_default().insert(fid1);
        }
    }
}

impl EqualityCache for HashingEqualityCache<'_> {
    fn query(&mut self, comparison: Pair) -> Option<bool> {
        let (id1, id2) = comparison;
        if id1 == id2 {
            return Some(true);
        }
        if self.distinct_hashes(id1, id2) {
            return Some(false);
        }
        let fid1 = self.find(id1);
        let fid2 = self.find(id2);
        if fid1 == fid2 {
            return Some(true);
        }
        if let Some(edges) = self.inequalities.get(&fid1)
            && edges.contains(&fid2)
        {
            return Some(false);
        }
        None
    }

    fn all_same(&mut self, comparisons: &[Pair]) {
        for &(id1, id2) in comparisons {
            self.union(id1, id2);
        }
    }

    fn all_different(&mut self, comparisons: &[Pair]) {
        for &(id1, id2) in comparisons {
            self.disunion(id1, id2);
        }
    }
}

/// The structural equality predicate itself.
pub struct Equals<'g, C> {
    graph: &'g Graph,
    pub cache: C,
    scc: Scc<Pair>,
}

impl<'g, C: EqualityCache> Equals<'g, C> {
    pub fn new(graph: &'g Graph, cache: C) -> Self {
        Equals {
            graph,
            cache,
            scc: Scc::new(),
        }
    }

    pub fn eq(&mut self, id1: Id, id2: Id) -> bool {
        let comparison = (id1, id2);

        // 1. Check if the comparison has an already known result.
        if let Some(known) = self.cache.query(comparison) {
            return known;
        }

        // 2. Record the comparison with the component finder.
        let Some(handle) = self.scc.open(&comparison) else {
            // Already open, tentatively equal.
            return true;
        };

        let result = self.eq_nodes(id1, id2);

        // 3. Check for a complete component. `result` is by now the
        // conjunction of every comparison in it via the spanning tree.
        let comparisons = self.scc.close(handle);
        if comparisons.is_empty() {
            return result;
        }
        if result {
            self.cache.all_same(&comparisons);
        } else {
            self.cache.all_different(&comparisons);
        }
        result
    }

    fn eq_ids(&mut self, ids1: &[Id], ids2: &[Id]) -> bool {
        ids1.len() == ids2.len()
            && ids1
                .iter()
                .zip(ids2.iter())
                .all(|(&id1, &id2)| self.eq(id1, id2))
    }

    fn eq_maps(&mut self, ids1: &BTreeMap<String, Id>, ids2: &BTreeMap<String, Id>) -> bool {
        ids1.len() == ids2.len()
            && ids1
                .iter()
                .zip(ids2.iter())
                .all(|((key1, &id1), (key2, &id2))| key1 == key2 && self.eq(id1, id2))
    }

    fn eq_nodes(&mut self, id1: Id, id2: Id) -> bool {
        let graph = self.graph;
        match (graph.get(id1), graph.get(id2)) {
            (Node::Void, Node::Void) => true,
            (Node::Variadic, Node::Variadic) => true,
            (Node::PointerReference(x1), Node::PointerReference(x2)) => {
                x1.kind == x2.kind && self.eq(x1.pointee_type_id, x2.pointee_type_id)
            }
            (Node::PointerToMember(x1), Node::PointerToMember(x2)) => {
                self.eq(x1.containing_type_id, x2.containing_type_id)
                    && self.eq(x1.pointee_type_id, x2.pointee_type_id)
            }
            (Node::Typedef(x1), Node::Typedef(x2)) => {
                x1.name == x2.name && self.eq(x1.referred_type_id, x2.referred_type_id)
            }
            (Node::Qualified(x1), Node::Qualified(x2)) => {
                x1.qualifier == x2.qualifier && self.eq(x1.qualified_type_id, x2.qualified_type_id)
            }
            (Node::Primitive(x1), Node::Primitive(x2)) => {
                x1.name == x2.name && x1.encoding == x2.encoding && x1.bytesize == x2.bytesize
            }
            (Node::Array(x1), Node::Array(x2)) => {
                x1.number_of_elements == x2.number_of_elements
                    && self.eq(x1.element_type_id, x2.element_type_id)
            }
            (Node::BaseClass(x1), Node::BaseClass(x2)) => {
                x1.offset == x2.offset
                    && x1.inheritance == x2.inheritance
                    && self.eq(x1.type_id, x2.type_id)
            }
            (Node::Method(x1), Node::Method(x2)) => {
                x1.mangled_name == x2.mangled_name
                    && x1.name == x2.name
                    && x1.kind == x2.kind
                    && x1.vtable_offset == x2.vtable_offset
                    && self.eq(x1.type_id, x2.type_id)
            }
            (Node::Member(x1), Node::Member(x2)) => {
                x1.name == x2.name
                    && x1.offset == x2.offset
                    && x1.bitsize == x2.bitsize
                    && self.eq(x1.type_id, x2.type_id)
            }
            (Node::StructUnion(x1), Node::StructUnion(x2)) => {
                x1.kind == x2.kind
                    && x1.name == x2.name
                    && match (&x1.definition, &x2.definition) {
                        (None, None) => true,
                        (Some(definition1), Some(definition2)) => {
                            definition1.bytesize == definition2.bytesize
                                && self
                                    .eq_ids(&definition1.base_classes, &definition2.base_classes)
                                && self.eq_ids(&definition1.methods, &definition2.methods)
                                && self.eq_ids(&definition1.members, &definition2.members)
                        }
                        _ => false,
                    }
            }
            (Node::Enumeration(x1), Node::Enumeration(x2)) => {
                x1.name == x2.name
                    && match (&x1.definition, &x2.definition) {
                        (None, None) => true,
                        (Some(definition1), Some(definition2)) => {
                            definition1.enumerators == definition2.enumerators
                                && self.eq(
                                    definition1.underlying_type_id,
                                    definition2.underlying_type_id,
                                )
                        }
                        _ => false,
                    }
            }
            (Node::Function(x1), Node::Function(x2)) => {
                self.eq_ids(&x1.parameters, &x2.parameters)
                    && self.eq(x1.return_type_id, x2.return_type_id)
            }
            (Node::ElfSymbol(x1), Node::ElfSymbol(x2)) => {
                x1.symbol_name == x2.symbol_name
                    && x1.version_info == x2.version_info
                    && x1.is_defined == x2.is_defined
                    && x1.symbol_type == x2.symbol_type
                    && x1.binding == x2.binding
                    && x1.visibility == x2.visibility
                    && x1.crc == x2.crc
                    && x1.namespace == x2.namespace
                    && x1.full_name == x2.full_name
                    && match (x1.type_id, x2.type_id) {
                        (None, None) => true,
                        (Some(type_id1), Some(type_id2)) => self.eq(type_id1, type_id2),
                        _ => false,
                    }
            }
            (Node::Interface(x1), Node::Interface(x2)) => {
                self.eq_maps(&x1.symbols, &x2.symbols) && self.eq_maps(&x1.types, &x2.types)
            }
            // variant mismatch
            _ => false,
        }
    }
}
