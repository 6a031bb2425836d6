//! Symbol-type graph model
//!
//! A graph owns every node of an ABI surface and hands out opaque [`Id`]
//! handles. Nodes never embed other nodes; every cross-reference is an `Id`
//! into the owning graph. Front-ends grow the graph monotonically while
//! reading; the resolution and deduplication passes may later remove nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A wrapped (for type safety) array index into a [`Graph`].
///
/// Ids are only meaningful within the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub(crate) usize);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// A pair of ids under comparison or unification.
pub type Pair = (Id, Id);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Pointer,
    LvalueReference,
    RvalueReference,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Pointer => "pointer",
            ReferenceKind::LvalueReference => "lvalue reference",
            ReferenceKind::RvalueReference => "rvalue reference",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerReference {
    pub kind: ReferenceKind,
    pub pointee_type_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerToMember {
    pub containing_type_id: Id,
    pub pointee_type_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typedef {
    pub name: String,
    pub referred_type_id: Id,
}

/// A type qualifier. Chains of qualified nodes encode multiple qualifiers;
/// the canonical chain order is restrict innermost, const outermost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Qualifier {
    Const,
    Volatile,
    Restrict,
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Qualifier::Const => "const",
            Qualifier::Volatile => "volatile",
            Qualifier::Restrict => "restrict",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualified {
    pub qualifier: Qualifier,
    pub qualified_type_id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    Boolean,
    SignedInteger,
    UnsignedInteger,
    SignedCharacter,
    UnsignedCharacter,
    RealNumber,
    ComplexNumber,
    Utf,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Boolean => "boolean",
            Encoding::SignedInteger => "signed integer",
            Encoding::UnsignedInteger => "unsigned integer",
            Encoding::SignedCharacter => "signed character",
            Encoding::UnsignedCharacter => "unsigned character",
            Encoding::RealNumber => "real number",
            Encoding::ComplexNumber => "complex number",
            Encoding::Utf => "UTF",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Primitive {
    pub name: String,
    pub encoding: Option<Encoding>,
    pub bytesize: u32,
}

/// A single array dimension. Multi-dimensional arrays are chains, outermost
/// dimension first: `T[M][N]` is an array of M arrays of N elements of T.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Array {
    pub number_of_elements: u64,
    pub element_type_id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Inheritance {
    NonVirtual,
    Virtual,
}

impl fmt::Display for Inheritance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Inheritance::NonVirtual => "non-virtual",
            Inheritance::Virtual => "virtual",
        })
    }
}

/// Base class offsets are measured in bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseClass {
    pub type_id: Id,
    pub offset: u64,
    pub inheritance: Inheritance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    NonVirtual,
    Static,
    Virtual,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodKind::NonVirtual => "non-virtual",
            MethodKind::Static => "static",
            MethodKind::Virtual => "virtual",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub mangled_name: String,
    pub name: String,
    pub kind: MethodKind,
    pub vtable_offset: Option<u64>,
    pub type_id: Id,
}

/// Member offsets are measured in bits. A zero `bitsize` marks an ordinary
/// member; bitfields carry their width here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub type_id: Id,
    pub offset: u64,
    pub bitsize: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructUnionKind {
    Struct,
    Union,
}

impl fmt::Display for StructUnionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StructUnionKind::Struct => "struct",
            StructUnionKind::Union => "union",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructUnionDefinition {
    pub bytesize: u64,
    pub base_classes: Vec<Id>,
    pub methods: Vec<Id>,
    pub members: Vec<Id>,
}

/// A struct or union. An empty name marks an anonymous type; an absent
/// definition marks a forward declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructUnion {
    pub kind: StructUnionKind,
    pub name: String,
    pub definition: Option<StructUnionDefinition>,
}

pub type Enumerators = Vec<(String, i64)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationDefinition {
    pub underlying_type_id: Id,
    pub enumerators: Enumerators,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumeration {
    pub name: String,
    pub definition: Option<EnumerationDefinition>,
}

/// A function type. A trailing variadic parameter slot is represented by a
/// (shared) `Variadic` node id in `parameters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub return_type_id: Id,
    pub parameters: Vec<Id>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    Object,
    Function,
    Common,
    Tls,
    GnuIfunc,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymbolType::Object => "object",
            SymbolType::Function => "function",
            SymbolType::Common => "common",
            SymbolType::Tls => "TLS",
            SymbolType::GnuIfunc => "indirect (ifunc)",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    Global,
    Local,
    Weak,
    GnuUnique,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Binding::Global => "global",
            Binding::Local => "local",
            Binding::Weak => "weak",
            Binding::GnuUnique => "GNU unique",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Default,
    Protected,
    Hidden,
    Internal,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Default => "default",
            Visibility::Protected => "protected",
            Visibility::Hidden => "hidden",
            Visibility::Internal => "internal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub is_default: bool,
    pub name: String,
}

impl VersionInfo {
    /// The `@version` / `@@default-version` suffix used in symbol names.
    pub fn to_suffix(&self) -> String {
        format!("@{}{}", if self.is_default { "@" } else { "" }, self.name)
    }
}

/// A symbol versioning CRC, as found in Linux kernel MODVERSIONS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crc(pub u32);

impl fmt::Display for Crc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElfSymbol {
    pub symbol_name: String,
    pub version_info: Option<VersionInfo>,
    pub is_defined: bool,
    pub symbol_type: SymbolType,
    pub binding: Binding,
    pub visibility: Visibility,
    pub crc: Option<Crc>,
    pub namespace: Option<String>,
    pub type_id: Option<Id>,
    pub full_name: Option<String>,
}

impl ElfSymbol {
    /// Symbol name with its version suffix, if any.
    pub fn versioned_name(&self) -> String {
        match &self.version_info {
            Some(version_info) => format!("{}{}", self.symbol_name, version_info.to_suffix()),
            None => self.symbol_name.clone(),
        }
    }
}

/// The root of an ABI surface: named symbols and named interface types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub symbols: BTreeMap<String, Id>,
    pub types: BTreeMap<String, Id>,
}

/// The node universe. All cross-references between nodes are [`Id`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Void,
    Variadic,
    PointerReference(PointerReference),
    PointerToMember(PointerToMember),
    Typedef(Typedef),
    Qualified(Qualified),
    Primitive(Primitive),
    Array(Array),
    BaseClass(BaseClass),
    Method(Method),
    Member(Member),
    StructUnion(StructUnion),
    Enumeration(Enumeration),
    Function(Function),
    ElfSymbol(ElfSymbol),
    Interface(Interface),
}

/// Concrete graph type: a dense arena of optional nodes.
///
/// An id is ABSENT until [`Graph::set`] and after [`Graph::unset`]. Setting a
/// set id, unsetting an absent id, or dispatching over an absent id are
/// programmer errors and panic.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Number of ids ever allocated; the exclusive upper bound on id indexes.
    pub fn limit(&self) -> usize {
        self.nodes.len()
    }

    /// Reserves a fresh id in the ABSENT state.
    pub fn allocate(&mut self) -> Id {
        let ix = self.nodes.len();
        self.nodes.push(None);
        Id(ix)
    }

    /// Defines an allocated id.
    pub fn set(&mut self, id: Id, node: Node) {
        let slot = &mut self.nodes[id.0];
        if slot.is_some() {
            panic!("node value already set: {id}");
        }
        *slot = Some(node);
    }

    /// Allocates and defines an id in one step.
    pub fn add(&mut self, node: Node) -> Id {
        let id = self.allocate();
        self.set(id, node);
        id
    }

    /// Removes the value of a set id, returning it to the ABSENT state.
    pub fn unset(&mut self, id: Id) {
        let slot = &mut self.nodes[id.0];
        if slot.is_none() {
            panic!("node value already unset: {id}");
        }
        *slot = None;
    }

    /// Removes a node. Ids are never reused, so this is `unset`.
    pub fn remove(&mut self, id: Id) {
        self.unset(id);
    }

    /// Whether the id is currently set.
    pub fn is_set(&self, id: Id) -> bool {
        self.nodes[id.0].is_some()
    }

    /// Dispatch point: every traversal pattern-matches on the result.
    pub fn get(&self, id: Id) -> &Node {
        match &self.nodes[id.0] {
            Some(node) => node,
            None => panic!("undefined node: {id}"),
        }
    }

    pub fn get_mut(&mut self, id: Id) -> &mut Node {
        match &mut self.nodes[id.0] {
            Some(node) => node,
            None => panic!("undefined node: {id}"),
        }
    }

    /// Calls `f` for every set id, in increasing id order.
    pub fn for_each(&self, mut f: impl FnMut(Id)) {
        for (ix, node) in self.nodes.iter().enumerate() {
            if node.is_some() {
                f(Id(ix));
            }
        }
    }

    /// All currently set ids, in increasing id order.
    pub fn ids(&self) -> Vec<Id> {
        let mut ids = Vec::new();
        self.for_each(|id| ids.push(id));
        ids
    }

    pub fn dense_id_set(&self) -> DenseIdSet {
        DenseIdSet::with_limit(self.limit())
    }

    pub fn dense_id_mapping(&self) -> DenseIdMapping {
        DenseIdMapping::with_limit(self.limit())
    }
}

/// Roughly a set of [`Id`]s, but with constant time operations and storage
/// proportional to the graph's id limit.
#[derive(Debug, Default)]
pub struct DenseIdSet {
    ids: Vec<bool>,
}

impl DenseIdSet {
    pub fn with_limit(limit: usize) -> Self {
        DenseIdSet {
            ids: vec![false; limit],
        }
    }

    /// Returns true if the id was not already present.
    pub fn insert(&mut self, id: Id) -> bool {
        let ix = id.0;
        if ix >= self.ids.len() {
            self.ids.resize(ix + 1, false);
        }
        if self.ids[ix] {
            return false;
        }
        self.ids[ix] = true;
        true
    }

    pub fn contains(&self, id: Id) -> bool {
        self.ids.get(id.0).copied().unwrap_or(false)
    }

    pub fn for_each(&self, mut f: impl FnMut(Id)) {
        for (ix, present) in self.ids.iter().enumerate() {
            if *present {
                f(Id(ix));
            }
        }
    }
}

/// Roughly a map from [`Id`] to [`Id`] defaulted to the identity mapping,
/// with constant time operations and storage proportional to the id limit.
#[derive(Debug, Default)]
pub struct DenseIdMapping {
    ids: Vec<Id>,
}

impl DenseIdMapping {
    pub fn with_limit(limit: usize) -> Self {
        DenseIdMapping {
            ids: (0..limit).map(Id).collect(),
        }
    }

    fn extend_to(&mut self, ix: usize) {
        let limit = self.ids.len();
        if ix >= limit {
            self.ids.extend((limit..=ix).map(Id));
        }
    }

    pub fn get(&mut self, id: Id) -> Id {
        self.extend_to(id.0);
        self.ids[id.0]
    }

    pub fn set(&mut self, id: Id, value: Id) {
        self.extend_to(id.0);
        self.ids[id.0] = value;
    }
}
