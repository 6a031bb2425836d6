//! Structural diffing
//!
//! Produces a diff graph over pairs of ids. A node of the diff graph is a
//! [`Comparison`] `(Option<Id>, Option<Id>)`; a missing side records an
//! addition or a removal. Each visited comparison gets a [`Diff`] holding
//! its local attribute changes and edges to nested comparisons.
//!
//! Cycles get the same treatment as in the equality pass: a back edge
//! returns a tentative "equal" plus an edge, and when a component closes,
//! every comparison in it is committed with the aggregate equality. Diffs
//! for an all-equal component are discarded.
//!
//! Qualifiers are peeled off both sides and diffed as a set before the bare
//! types are compared; typedef chains are resolved without being reported
//! unless both sides start with the same typedef name, in which case the
//! node becomes a reportable boundary.

use crate::graph::{
    Graph, Id, Node, Qualifier,
};
use crate::metrics::Metrics;
use crate::order::reorder;
use crate::scc::Scc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// A diff-graph node: a pair of ids under comparison, either possibly absent.
pub type Comparison = (Option<Id>, Option<Id>);

/// One reported difference: a message, optionally pointing at a nested
/// comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffDetail {
    pub text: String,
    pub edge: Option<Comparison>,
}

/// The differences recorded against one comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// This diff node corresponds to an entity that is reportable, if it or
    /// any of its children (excluding reportable ones) has changed.
    pub holds_changes: bool,
    /// This diff node contains a local (non-recursive) change.
    pub has_changes: bool,
    pub details: Vec<DiffDetail>,
}

impl Diff {
    fn add(&mut self, text: impl Into<String>, edge: Option<Comparison>) {
        self.details.push(DiffDetail {
            text: text.into(),
            edge,
        });
    }
}

/// All committed diffs, keyed by comparison.
pub type Outcomes = HashMap<Comparison, Diff>;

/// Diff suppression flags. Each flag suppresses exactly its class of diff
/// details; none of them reshapes the diff topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreKind {
    SymbolTypePresence,
    TypeDeclarationStatus,
    PrimitiveEncoding,
    MemberSize,
    EnumUnderlyingType,
    Qualifier,
    InterfaceAddition,
    SymbolCrc,
}

impl IgnoreKind {
    pub const ALL: [IgnoreKind; 8] = [
        IgnoreKind::SymbolTypePresence,
        IgnoreKind::TypeDeclarationStatus,
        IgnoreKind::PrimitiveEncoding,
        IgnoreKind::MemberSize,
        IgnoreKind::EnumUnderlyingType,
        IgnoreKind::Qualifier,
        IgnoreKind::InterfaceAddition,
        IgnoreKind::SymbolCrc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IgnoreKind::SymbolTypePresence => "symbol_type_presence",
            IgnoreKind::TypeDeclarationStatus => "type_declaration_status",
            IgnoreKind::PrimitiveEncoding => "primitive_encoding",
            IgnoreKind::MemberSize => "member_size",
            IgnoreKind::EnumUnderlyingType => "enum_underlying_type",
            IgnoreKind::Qualifier => "qualifier",
            IgnoreKind::InterfaceAddition => "interface_addition",
            IgnoreKind::SymbolCrc => "symbol_crc",
        }
    }
}

impl FromStr for IgnoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IgnoreKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown ignore flag: '{s}'"))
    }
}

/// A set of [`IgnoreKind`] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ignore(u32);

impl Ignore {
    pub fn new(kinds: impl IntoIterator<Item = IgnoreKind>) -> Self {
        let mut ignore = Ignore::default();
        for kind in kinds {
            ignore.set(kind);
        }
        ignore
    }

    pub fn set(&mut self, kind: IgnoreKind) {
        self.0 |= 1 << kind as u32;
    }

    pub fn test(&self, kind: IgnoreKind) -> bool {
        self.0 & (1 << kind as u32) != 0
    }
}

/// The outcome of comparing one pair of nodes, before it is committed.
#[derive(Debug)]
struct CompareResult {
    equals: bool,
    diff: Diff,
}

impl CompareResult {
    fn new() -> Self {
        CompareResult {
            equals: true,
            diff: Diff::default(),
        }
    }

    /// Used when two nodes cannot be meaningfully compared.
    fn mark_incomparable(&mut self) {
        self.equals = false;
        self.diff.has_changes = true;
    }

    fn incomparable() -> Self {
        let mut result = CompareResult::new();
        result.mark_incomparable();
        result
    }

    /// Used when a node attribute has changed.
    fn add_node_diff(&mut self, text: impl Into<String>) {
        self.equals = false;
        self.diff.has_changes = true;
        self.diff.add(text, None);
    }

    /// Used when a node attribute may have changed.
    fn maybe_add_node_diff<T: PartialEq + fmt::Display + ?Sized>(
        &mut self,
        label: impl fmt::Display,
        before: &T,
        after: &T,
    ) {
        if before != after {
            self.add_node_diff(format!("{label} changed from {before} to {after}"));
        }
    }

    /// Used when node attributes are optional values.
    fn maybe_add_node_diff_option<T: PartialEq + fmt::Display>(
        &mut self,
        label: impl fmt::Display,
        before: &Option<T>,
        after: &Option<T>,
    ) {
        match (before, after) {
            (Some(before), Some(after)) => self.maybe_add_node_diff(label, before, after),
            (Some(before), None) => self.add_node_diff(format!("{label} {before} was removed")),
            (None, Some(after)) => self.add_node_diff(format!("{label} {after} was added")),
            (None, None) => {}
        }
    }

    /// Used when an edge has been removed or added.
    fn add_edge_diff(&mut self, text: impl Into<String>, comparison: Comparison) {
        self.equals = false;
        self.diff.add(text, Some(comparison));
    }

    /// Used when an edge to a possible nested comparison is present.
    fn maybe_add_edge_diff(
        &mut self,
        text: impl Into<String>,
        outcome: (bool, Option<Comparison>),
    ) {
        let (equals, comparison) = outcome;
        self.equals &= equals;
        if let Some(comparison) = comparison {
            self.diff.add(text, Some(comparison));
        }
    }
}

/// Separates qualifiers from the underlying type.
///
/// The caller must always be prepared to receive a different type, as
/// qualifiers on arrays and functions are discarded entirely.
pub fn resolve_qualifiers(graph: &Graph, id: Id) -> (Id, BTreeSet<Qualifier>) {
    let mut id = id;
    let mut qualifiers = BTreeSet::new();
    loop {
        match graph.get(id) {
            Node::Qualified(x) => {
                qualifiers.insert(x.qualifier);
                id = x.qualified_type_id;
            }
            Node::Array(_) | Node::Function(_) => {
                qualifiers.clear();
                return (id, qualifiers);
            }
            _ => return (id, qualifiers),
        }
    }
}

/// Follows a typedef chain to the first non-typedef node, collecting names.
pub fn resolve_typedefs(graph: &Graph, id: Id) -> (Id, Vec<String>) {
    let mut id = id;
    let mut names = Vec::new();
    while let Node::Typedef(x) = graph.get(id) {
        names.push(x.name.clone());
        id = x.referred_type_id;
    }
    (id, names)
}

fn qualifiers_message(qualifier: Qualifier, action: &str) -> String {
    format!("qualifier {qualifier} {action}")
}

/// The string used to pair up child list items during diffing.
fn matching_key(graph: &Graph, id: Id) -> String {
    match graph.get(id) {
        Node::BaseClass(x) => matching_key(graph, x.type_id),
        Node::Member(x) => {
            if !x.name.is_empty() {
                x.name.clone()
            } else {
                matching_key(graph, x.type_id)
            }
        }
        Node::Method(x) => format!("{},{}", x.name, x.mangled_name),
        Node::StructUnion(x) => {
            if !x.name.is_empty() {
                x.name.clone()
            } else if let Some(definition) = &x.definition {
                for &member in &definition.members {
                    let recursive = matching_key(graph, member);
                    if !recursive.is_empty() {
                        return recursive + "+";
                    }
                }
                String::new()
            } else {
                String::new()
            }
        }
        _ => String::new(),
    }
}

type KeyIndexPairs = Vec<(String, usize)>;

fn matching_keys(graph: &Graph, ids: &[Id]) -> KeyIndexPairs {
    let mut keys = KeyIndexPairs::with_capacity(ids.len());
    let mut anonymous_ix = 0;
    for (ix, &id) in ids.iter().enumerate() {
        let mut key = matching_key(graph, id);
        if key.is_empty() {
            // disambiguate anonymous items positionally
            key = format!("#anon#{anonymous_ix}");
            anonymous_ix += 1;
        }
        keys.push((key, ix));
    }
    keys.sort();
    keys
}

type MatchedPairs = Vec<(Option<usize>, Option<usize>)>;

fn pair_up(keys1: &KeyIndexPairs, keys2: &KeyIndexPairs) -> MatchedPairs {
    let mut pairs = MatchedPairs::with_capacity(keys1.len().max(keys2.len()));
    let mut it1 = keys1.iter().peekable();
    let mut it2 = keys2.iter().peekable();
    loop {
        match (it1.peek(), it2.peek()) {
            (Some((key1, ix1)), Some((key2, ix2))) => {
                if key1 < key2 {
                    // removed
                    pairs.push((Some(*ix1), None));
                    it1.next();
                } else if key1 > key2 {
                    // added
                    pairs.push((None, Some(*ix2)));
                    it2.next();
                } else {
                    // in both
                    pairs.push((Some(*ix1), Some(*ix2)));
                    it1.next();
                    it2.next();
                }
            }
            (Some((_, ix1)), None) => {
                pairs.push((Some(*ix1), None));
                it1.next();
            }
            (None, Some((_, ix2))) => {
                pairs.push((None, Some(*ix2)));
                it2.next();
            }
            (None, None) => break,
        }
    }
    pairs
}

/// The result of a whole diff run.
#[derive(Debug)]
pub struct DiffOutcome {
    pub equals: bool,
    /// The root comparison, absent when the inputs are equal.
    pub comparison: Option<Comparison>,
    pub outcomes: Outcomes,
}

/// Compares two roots and returns the populated diff graph.
pub fn diff(
    graph: &Graph,
    id1: Id,
    id2: Id,
    ignore: Ignore,
    metrics: &mut Metrics,
) -> DiffOutcome {
    let mut compare = Compare::new(graph, ignore);
    let (equals, comparison) = metrics.timed("compare.time", |_| compare.compare(id1, id2));
    assert!(
        compare.scc.is_empty() && compare.provisional.is_empty(),
        "internal error: diff state not fully committed"
    );
    metrics.count("compare.queried", compare.queried);
    metrics.count("compare.really_compared", compare.really_compared);
    metrics.histogram("compare.scc_size", compare.scc_sizes.iter().copied());
    DiffOutcome {
        equals,
        comparison,
        outcomes: compare.outcomes,
    }
}

/// The cycle-tolerant recursive comparison.
pub struct Compare<'g> {
    graph: &'g Graph,
    ignore: Ignore,
    known: HashMap<Comparison, bool>,
    pub outcomes: Outcomes,
    provisional: Outcomes,
    scc: Scc<Comparison>,
    queried: u64,
    really_compared: u64,
    scc_sizes: Vec<u64>,
}

impl<'g> Compare<'g> {
    pub fn new(graph: &'g Graph, ignore: Ignore) -> Self {
        Compare {
            graph,
            ignore,
            known: HashMap::new(),
            outcomes: Outcomes::default(),
            provisional: Outcomes::default(),
            scc: Scc::new(),
            queried: 0,
            really_compared: 0,
            scc_sizes: Vec::new(),
        }
    }

    /// Compares a pair of ids, returning the aggregate equality so far and
    /// an edge to the comparison when it is (or may yet turn out to be)
    /// unequal.
    pub fn compare(&mut self, id1: Id, id2: Id) -> (bool, Option<Comparison>) {
        let comparison = (Some(id1), Some(id2));
        self.queried += 1;

        // 1. Check if the comparison has an already known result.
        if let Some(&known) = self.known.get(&comparison) {
            return if known { (true, None) } else { (false, Some(comparison)) };
        }

        // 2. Record the comparison with the component finder.
        let Some(handle) = self.scc.open(&comparison) else {
            // Already open. Return a dummy true outcome and a tentative
            // edge; the edge encodes the cycle-breaking links needed to
            // recreate the full diff structure if the component is unequal.
            return (true, Some(comparison));
        };
        self.really_compared += 1;

        let result = self.compare_inner(id1, id2);

        // 3. Update the result and check for a complete component.
        self.provisional.insert(comparison, result.diff);
        let comparisons = self.scc.close(handle);
        if comparisons.is_empty() {
            // Both equality and diff are tentative, the comparison is open.
            return (result.equals, Some(comparison));
        }

        // Closed component: `result.equals` now reflects every comparison
        // in it via the spanning tree. Keep the diffs only on inequality.
        self.scc_sizes.push(comparisons.len() as u64);
        for comparison in comparisons {
            self.known.insert(comparison, result.equals);
            let diff = self
                .provisional
                .remove(&comparison)
                .unwrap_or_else(|| panic!("internal error: missing provisional diff"));
            if !result.equals {
                self.outcomes.insert(comparison, diff);
            }
        }
        if result.equals {
            (true, None)
        } else {
            (false, Some(comparison))
        }
    }

    /// Records a removal; the one-sided comparison gets an empty diff.
    fn removed(&mut self, id: Id) -> Comparison {
        let comparison = (Some(id), None);
        self.outcomes.insert(comparison, Diff::default());
        comparison
    }

    /// Records an addition; the one-sided comparison gets an empty diff.
    fn added(&mut self, id: Id) -> Comparison {
        let comparison = (None, Some(id));
        self.outcomes.insert(comparison, Diff::default());
        comparison
    }

    fn compare_inner(&mut self, id1: Id, id2: Id) -> CompareResult {
        let graph = self.graph;
        let mut result = CompareResult::new();

        let (unqualified1, qualifiers1) = resolve_qualifiers(graph, id1);
        let (unqualified2, qualifiers2) = resolve_qualifiers(graph, id2);
        if !qualifiers1.is_empty() || !qualifiers2.is_empty() {
            // Qualified type difference, reported as a set difference with
            // the details ordered by qualifier.
            if !self.ignore.test(IgnoreKind::Qualifier) {
                let mut it1 = qualifiers1.iter().peekable();
                let mut it2 = qualifiers2.iter().peekable();
                loop {
                    match (it1.peek(), it2.peek()) {
                        (Some(&&qualifier1), Some(&&qualifier2)) => {
                            if qualifier1 < qualifier2 {
                                result.add_node_diff(qualifiers_message(qualifier1, "removed"));
                                it1.next();
                            } else if qualifier1 > qualifier2 {
                                result.add_node_diff(qualifiers_message(qualifier2, "added"));
                                it2.next();
                            } else {
                                it1.next();
                                it2.next();
                            }
                        }
                        (Some(&&qualifier1), None) => {
                            result.add_node_diff(qualifiers_message(qualifier1, "removed"));
                            it1.next();
                        }
                        (None, Some(&&qualifier2)) => {
                            result.add_node_diff(qualifiers_message(qualifier2, "added"));
                            it2.next();
                        }
                        (None, None) => break,
                    }
                }
            }
            let type_diff = self.compare(unqualified1, unqualified2);
            result.maybe_add_edge_diff("underlying", type_diff);
            return result;
        }

        let (resolved1, typedefs1) = resolve_typedefs(graph, unqualified1);
        let (resolved2, typedefs2) = resolve_typedefs(graph, unqualified2);
        if unqualified1 != resolved1 || unqualified2 != resolved2 {
            // Typedef difference. The node is a reportable boundary only
            // when both sides carry the same outermost typedef name.
            result.diff.holds_changes = !typedefs1.is_empty()
                && !typedefs2.is_empty()
                && typedefs1[0] == typedefs2[0];
            let type_diff = self.compare(resolved1, resolved2);
            result.maybe_add_edge_diff("resolved", type_diff);
            return result;
        }

        self.compare_nodes(unqualified1, unqualified2)
    }

    fn compare_nodes(&mut self, id1: Id, id2: Id) -> CompareResult {
        let graph = self.graph;
        match (graph.get(id1), graph.get(id2)) {
            (Node::Void, Node::Void) => CompareResult::new(),
            (Node::Variadic, Node::Variadic) => CompareResult::new(),
            (Node::PointerReference(x1), Node::PointerReference(x2)) => {
                let mut result = CompareResult::new();
                if x1.kind != x2.kind {
                    result.mark_incomparable();
                    return result;
                }
                let text = match x1.kind {
                    crate::graph::ReferenceKind::Pointer => "pointed-to",
                    _ => "referred-to",
                };
                let type_diff = self.compare(x1.pointee_type_id, x2.pointee_type_id);
                result.maybe_add_edge_diff(text, type_diff);
                result
            }
            (Node::PointerToMember(x1), Node::PointerToMember(x2)) => {
                let mut result = CompareResult::new();
                let containing_diff = self.compare(x1.containing_type_id, x2.containing_type_id);
                result.maybe_add_edge_diff("containing", containing_diff);
                let pointee_diff = self.compare(x1.pointee_type_id, x2.pointee_type_id);
                result.maybe_add_edge_diff("pointed-to", pointee_diff);
                result
            }
            (Node::Typedef(_), Node::Typedef(_)) => {
                // resolved before dispatch
                panic!("internal error: typedefs are compared by resolution")
            }
            (Node::Qualified(_), Node::Qualified(_)) => {
                // resolved before dispatch
                panic!("internal error: qualifiers are compared as sets")
            }
            (Node::Primitive(x1), Node::Primitive(x2)) => {
                let mut result = CompareResult::new();
                if x1.name != x2.name {
                    result.mark_incomparable();
                    return result;
                }
                result.diff.holds_changes = !x1.name.is_empty();
                if !self.ignore.test(IgnoreKind::PrimitiveEncoding) {
                    result.maybe_add_node_diff_option("encoding", &x1.encoding, &x2.encoding);
                }
                result.maybe_add_node_diff("byte size", &x1.bytesize, &x2.bytesize);
                result
            }
            (Node::Array(x1), Node::Array(x2)) => {
                let mut result = CompareResult::new();
                result.maybe_add_node_diff(
                    "number of elements",
                    &x1.number_of_elements,
                    &x2.number_of_elements,
                );
                let type_diff = self.compare(x1.element_type_id, x2.element_type_id);
                result.maybe_add_edge_diff("element", type_diff);
                result
            }
            (Node::BaseClass(x1), Node::BaseClass(x2)) => {
                let mut result = CompareResult::new();
                result.maybe_add_node_diff("inheritance", &x1.inheritance, &x2.inheritance);
                result.maybe_add_node_diff("offset", &x1.offset, &x2.offset);
                let type_diff = self.compare(x1.type_id, x2.type_id);
                result.maybe_add_edge_diff("", type_diff);
                result
            }
            (Node::Method(x1), Node::Method(x2)) => {
                // TODO: decide whether transitions between static, virtual
                // and non-virtual methods deserve a dedicated message; for
                // now kind and vtable offset are reported independently and
                // a transition with a missing vtable offset stays silent on
                // the offset side.
                let mut result = CompareResult::new();
                result.maybe_add_node_diff("kind", &x1.kind, &x2.kind);
                result.maybe_add_node_diff_option(
                    "vtable offset",
                    &x1.vtable_offset,
                    &x2.vtable_offset,
                );
                let type_diff = self.compare(x1.type_id, x2.type_id);
                result.maybe_add_edge_diff("", type_diff);
                result
            }
            (Node::Member(x1), Node::Member(x2)) => {
                let mut result = CompareResult::new();
                result.maybe_add_node_diff("offset", &x1.offset, &x2.offset);
                if !self.ignore.test(IgnoreKind::MemberSize) {
                    result.maybe_add_node_diff("size", &x1.bitsize, &x2.bitsize);
                }
                let type_diff = self.compare(x1.type_id, x2.type_id);
                result.maybe_add_edge_diff("", type_diff);
                result
            }
            (Node::StructUnion(x1), Node::StructUnion(x2)) => {
                let mut result = CompareResult::new();
                // Anonymous types compare recursively without holding diffs;
                // identically named types hold diffs; everything else is
                // distinct with no recursion.
                if x1.kind != x2.kind || x1.name != x2.name {
                    result.mark_incomparable();
                    return result;
                }
                result.diff.holds_changes = !x1.name.is_empty();

                let definition1 = &x1.definition;
                let definition2 = &x2.definition;
                if !self.compare_defined(
                    definition1.is_some(),
                    definition2.is_some(),
                    &mut result,
                ) {
                    return result;
                }
                let (Some(definition1), Some(definition2)) = (definition1, definition2) else {
                    unreachable!()
                };
                result.maybe_add_node_diff(
                    "byte size",
                    &definition1.bytesize,
                    &definition2.bytesize,
                );
                self.compare_node_lists(
                    &mut result,
                    &definition1.base_classes,
                    &definition2.base_classes,
                    true,
                );
                self.compare_node_lists(
                    &mut result,
                    &definition1.methods,
                    &definition2.methods,
                    false,
                );
                self.compare_node_lists(
                    &mut result,
                    &definition1.members,
                    &definition2.members,
                    true,
                );
                result
            }
            (Node::Enumeration(x1), Node::Enumeration(x2)) => {
                let mut result = CompareResult::new();
                if x1.name != x2.name {
                    result.mark_incomparable();
                    return result;
                }
                result.diff.holds_changes = !x1.name.is_empty();

                let definition1 = &x1.definition;
                let definition2 = &x2.definition;
                if !self.compare_defined(
                    definition1.is_some(),
                    definition2.is_some(),
                    &mut result,
                ) {
                    return result;
                }
                let (Some(definition1), Some(definition2)) = (definition1, definition2) else {
                    unreachable!()
                };
                if !self.ignore.test(IgnoreKind::EnumUnderlyingType) {
                    let type_diff = self.compare(
                        definition1.underlying_type_id,
                        definition2.underlying_type_id,
                    );
                    result.maybe_add_edge_diff("underlying type", type_diff);
                }
                self.compare_enumerators(
                    &mut result,
                    &definition1.enumerators,
                    &definition2.enumerators,
                );
                result
            }
            (Node::Function(x1), Node::Function(x2)) => {
                let mut result = CompareResult::new();
                let type_diff = self.compare(x1.return_type_id, x2.return_type_id);
                result.maybe_add_edge_diff("return", type_diff);

                let parameters1 = &x1.parameters;
                let parameters2 = &x2.parameters;
                let min = parameters1.len().min(parameters2.len());
                for i in 0..min {
                    let parameter_diff = self.compare(parameters1[i], parameters2[i]);
                    result.maybe_add_edge_diff(format!("parameter {}", i + 1), parameter_diff);
                }
                // the shorter side's tail parameters become added or removed
                let added = parameters1.len() < parameters2.len();
                let parameters = if added { parameters2 } else { parameters1 };
                for (i, &parameter) in parameters.iter().enumerate().skip(min) {
                    let edge = if added {
                        self.added(parameter)
                    } else {
                        self.removed(parameter)
                    };
                    result.add_edge_diff(format!("parameter {} of", i + 1), edge);
                }
                result
            }
            (Node::ElfSymbol(x1), Node::ElfSymbol(x2)) => {
                // Attributes are compared independently; the aliasing,
                // section, and value information a front-end discards never
                // reaches this point.
                let mut result = CompareResult::new();
                result.diff.holds_changes = true;
                result.maybe_add_node_diff("name", &x1.symbol_name, &x2.symbol_name);

                match (&x1.version_info, &x2.version_info) {
                    (Some(version_info1), Some(version_info2)) => {
                        result.maybe_add_node_diff(
                            "version",
                            &version_info1.name,
                            &version_info2.name,
                        );
                        result.maybe_add_node_diff(
                            "default version",
                            &version_info1.is_default,
                            &version_info2.is_default,
                        );
                    }
                    (version_info1, version_info2) => {
                        result.maybe_add_node_diff(
                            "has version",
                            &version_info1.is_some(),
                            &version_info2.is_some(),
                        );
                    }
                }

                result.maybe_add_node_diff("defined", &x1.is_defined, &x2.is_defined);
                result.maybe_add_node_diff("symbol type", &x1.symbol_type, &x2.symbol_type);
                result.maybe_add_node_diff("binding", &x1.binding, &x2.binding);
                result.maybe_add_node_diff("visibility", &x1.visibility, &x2.visibility);
                if !self.ignore.test(IgnoreKind::SymbolCrc) {
                    result.maybe_add_node_diff_option("CRC", &x1.crc, &x2.crc);
                }
                result.maybe_add_node_diff_option("namespace", &x1.namespace, &x2.namespace);

                match (x1.type_id, x2.type_id) {
                    (Some(type_id1), Some(type_id2)) => {
                        let type_diff = self.compare(type_id1, type_id2);
                        result.maybe_add_edge_diff("", type_diff);
                    }
                    (Some(type_id1), None) => {
                        if !self.ignore.test(IgnoreKind::SymbolTypePresence) {
                            let edge = self.removed(type_id1);
                            result.add_edge_diff("", edge);
                        }
                    }
                    (None, Some(type_id2)) => {
                        if !self.ignore.test(IgnoreKind::SymbolTypePresence) {
                            let edge = self.added(type_id2);
                            result.add_edge_diff("", edge);
                        }
                    }
                    // both types missing, nothing to say
                    (None, None) => {}
                }
                result
            }
            (Node::Interface(x1), Node::Interface(x2)) => {
                let mut result = CompareResult::new();
                result.diff.holds_changes = true;
                self.compare_name_maps(&mut result, &x1.symbols, &x2.symbols);
                self.compare_name_maps(&mut result, &x1.types, &x2.types);
                result
            }
            // variant mismatch: distinct, not recursively explored
            _ => CompareResult::incomparable(),
        }
    }

    /// Reports declaration-status changes. Returns whether both sides are
    /// defined and worth comparing further.
    fn compare_defined(
        &mut self,
        defined1: bool,
        defined2: bool,
        result: &mut CompareResult,
    ) -> bool {
        if defined1 && defined2 {
            return true;
        }
        if defined1 != defined2 && !self.ignore.test(IgnoreKind::TypeDeclarationStatus) {
            let describe = |defined: bool| {
                if defined { "fully defined" } else { "only declared" }
            };
            result.add_node_diff(format!(
                "was {}, is now {}",
                describe(defined1),
                describe(defined2)
            ));
        }
        false
    }

    /// Matches two child lists by key and compares the matched pairs.
    fn compare_node_lists(
        &mut self,
        result: &mut CompareResult,
        ids1: &[Id],
        ids2: &[Id],
        reorder_pairs: bool,
    ) {
        let keys1 = matching_keys(self.graph, ids1);
        let keys2 = matching_keys(self.graph, ids2);
        let mut pairs = pair_up(&keys1, &keys2);
        if reorder_pairs {
            reorder(&mut pairs);
        }
        for (index1, index2) in pairs {
            match (index1, index2) {
                (Some(index1), None) => {
                    let edge = self.removed(ids1[index1]);
                    result.add_edge_diff("", edge);
                }
                (None, Some(index2)) => {
                    let edge = self.added(ids2[index2]);
                    result.add_edge_diff("", edge);
                }
                (Some(index1), Some(index2)) => {
                    let edge_diff = self.compare(ids1[index1], ids2[index2]);
                    result.maybe_add_edge_diff("", edge_diff);
                }
                (None, None) => unreachable!(),
            }
        }
    }

    fn compare_enumerators(
        &mut self,
        result: &mut CompareResult,
        enumerators1: &[(String, i64)],
        enumerators2: &[(String, i64)],
    ) {
        let keys = |enumerators: &[(String, i64)]| {
            let mut keys: KeyIndexPairs = enumerators
                .iter()
                .enumerate()
                .map(|(ix, (name, _))| (name.clone(), ix))
                .collect();
            keys.sort();
            keys
        };
        let mut pairs = pair_up(&keys(enumerators1), &keys(enumerators2));
        reorder(&mut pairs);
        for (index1, index2) in pairs {
            match (index1, index2) {
                (Some(index1), None) => {
                    let (name, value) = &enumerators1[index1];
                    result.add_node_diff(format!("enumerator '{name}' ({value}) was removed"));
                }
                (None, Some(index2)) => {
                    let (name, value) = &enumerators2[index2];
                    result.add_node_diff(format!("enumerator '{name}' ({value}) was added"));
                }
                (Some(index1), Some(index2)) => {
                    let (name, value1) = &enumerators1[index1];
                    let (_, value2) = &enumerators2[index2];
                    result.maybe_add_node_diff(
                        format_args!("enumerator '{name}' value"),
                        value1,
                        value2,
                    );
                }
                (None, None) => unreachable!(),
            }
        }
    }

    /// Merge-joins two ordered name maps, as found in interface roots.
    fn compare_name_maps(
        &mut self,
        result: &mut CompareResult,
        ids1: &BTreeMap<String, Id>,
        ids2: &BTreeMap<String, Id>,
    ) {
        // Group diffs into removed, added, and changed for readability.
        let mut removed = Vec::new();
        let mut added = Vec::new();
        let mut in_both = Vec::new();
        let mut it1 = ids1.iter().peekable();
        let mut it2 = ids2.iter().peekable();
        loop {
            match (it1.peek(), it2.peek()) {
                (Some((name1, id1)), Some((name2, id2))) => {
                    if name1 < name2 {
                        removed.push(**id1);
                        it1.next();
                    } else if name1 > name2 {
                        added.push(**id2);
                        it2.next();
                    } else {
                        in_both.push((**id1, **id2));
                        it1.next();
                        it2.next();
                    }
                }
                (Some((_, id1)), None) => {
                    removed.push(**id1);
                    it1.next();
                }
                (None, Some((_, id2))) => {
                    added.push(**id2);
                    it2.next();
                }
                (None, None) => break,
            }
        }
        for id1 in removed {
            let edge = self.removed(id1);
            result.add_edge_diff("", edge);
        }
        if !self.ignore.test(IgnoreKind::InterfaceAddition) {
            for id2 in added {
                let edge = self.added(id2);
                result.add_edge_diff("", edge);
            }
        }
        for (id1, id2) in in_both {
            let edge_diff = self.compare(id1, id2);
            result.maybe_add_edge_diff("", edge_diff);
        }
    }
}
