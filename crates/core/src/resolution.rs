//! Forward declaration resolution
//!
//! Collects every named struct, union, and enumeration reachable from a
//! root, unifies duplicate definitions, and maps declarations onto their
//! definition when exactly one compatible definition cluster exists.
//! Conflicting definitions of one name are reported and kept separate, and
//! every declaration of that name is left unresolved.

use crate::error::Error;
use crate::graph::{DenseIdSet, Graph, Id, Node, StructUnionKind};
use crate::metrics::Metrics;
use crate::unification::{Unification, unify};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TypeTag {
    Struct,
    Union,
    Enum,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeTag::Struct => "struct",
            TypeTag::Union => "union",
            TypeTag::Enum => "enum",
        })
    }
}

#[derive(Debug, Default)]
struct Info {
    definitions: Vec<Id>,
    declarations: Vec<Id>,
}

/// Collects named type definition and declaration nodes.
struct NamedTypes<'g> {
    graph: &'g Graph,
    // ordered map for consistent processing of related types
    type_info: BTreeMap<(TypeTag, String), Info>,
    seen: DenseIdSet,
    nodes: u64,
}

impl<'g> NamedTypes<'g> {
    fn new(graph: &'g Graph) -> Self {
        NamedTypes {
            graph,
            type_info: BTreeMap::new(),
            seen: graph.dense_id_set(),
            nodes: 0,
        }
    }

    fn info(&mut self, tag: TypeTag, name: &str) -> &mut Info {
        self.type_info.entry((tag, name.to_string())).or_default()
    }

    fn collect_all(&mut self, ids: &[Id]) -> Result<(), Error> {
        for &id in ids {
            self.collect(id)?;
        }
        Ok(())
    }

    fn collect(&mut self, id: Id) -> Result<(), Error> {
        if !self.seen.insert(id) {
            return Ok(());
        }
        if !self.graph.is_set(id) {
            warn!("dangling reference to {id}");
            return Err(Error::Input(format!("dangling reference to {id}")));
        }
        self.nodes += 1;
        let graph = self.graph;
        match graph.get(id) {
            Node::Void | Node::Variadic | Node::Primitive(_) => Ok(()),
            Node::PointerReference(x) => self.collect(x.pointee_type_id),
            Node::PointerToMember(x) => {
                self.collect(x.containing_type_id)?;
                self.collect(x.pointee_type_id)
            }
            Node::Typedef(x) => self.collect(x.referred_type_id),
            Node::Qualified(x) => self.collect(x.qualified_type_id),
            Node::Array(x) => self.collect(x.element_type_id),
            Node::BaseClass(x) => self.collect(x.type_id),
            Node::Method(x) => self.collect(x.type_id),
            Node::Member(x) => self.collect(x.type_id),
            Node::StructUnion(x) => {
                let tag = match x.kind {
                    StructUnionKind::Struct => TypeTag::Struct,
                    StructUnionKind::Union => TypeTag::Union,
                };
                let named = !x.name.is_empty();
                match &x.definition {
                    Some(definition) => {
                        if named {
                            self.info(tag, &x.name).definitions.push(id);
                        }
                        self.collect_all(&definition.base_classes)?;
                        self.collect_all(&definition.methods)?;
                        self.collect_all(&definition.members)
                    }
                    None => {
                        if !named {
                            return Err(Error::Input(format!(
                                "anonymous forward declaration: {id}"
                            )));
                        }
                        self.info(tag, &x.name).declarations.push(id);
                        Ok(())
                    }
                }
            }
            Node::Enumeration(x) => {
                let named = !x.name.is_empty();
                match &x.definition {
                    Some(definition) => {
                        if named {
                            self.info(TypeTag::Enum, &x.name).definitions.push(id);
                        }
                        self.collect(definition.underlying_type_id)
                    }
                    None => {
                        if !named {
                            return Err(Error::Input(format!(
                                "anonymous forward declaration: {id}"
                            )));
                        }
                        self.info(TypeTag::Enum, &x.name).declarations.push(id);
                        Ok(())
                    }
                }
            }
            Node::Function(x) => {
                self.collect(x.return_type_id)?;
                self.collect_all(&x.parameters)
            }
            Node::ElfSymbol(x) => match x.type_id {
                Some(type_id) => self.collect(type_id),
                None => Ok(()),
            },
            Node::Interface(x) => {
                let symbols: Vec<Id> = x.symbols.values().copied().collect();
                let types: Vec<Id> = x.types.values().copied().collect();
                self.collect_all(&symbols)?;
                self.collect_all(&types)
            }
        }
    }
}

/// Resolves duplicate definitions and forward declarations of named types
/// under `root`, rewrites the graph, and returns the (possibly remapped)
/// root id.
pub fn resolve_types(graph: &mut Graph, root: Id, metrics: &mut Metrics) -> Result<Id, Error> {
    let collection_start = std::time::Instant::now();
    let mut named_types = NamedTypes::new(graph);
    named_types.collect(root)?;
    metrics.time("resolve.collection", collection_start.elapsed());
    metrics.count("resolve.nodes", named_types.nodes);
    metrics.count("resolve.types", named_types.type_info.len() as u64);

    let mut unification = Unification::new(graph);
    let mut definitions_unified = 0;
    let mut declarations_unified = 0;
    let mut conflicts = 0;
    metrics.timed("resolve.unification", |_| {
        for ((tag, name), info) in &named_types.type_info {
            // try to unify the type definitions pairwise
            let mut definitions = info.definitions.clone();
            let mut distinct_definitions = Vec::new();
            while !definitions.is_empty() {
                let candidate = definitions[0];
                distinct_definitions.push(candidate);
                let mut todo = Vec::new();
                for &definition in &definitions[1..] {
                    if unify(graph, &mut unification, definition, candidate) {
                        definitions_unified += 1;
                    } else {
                        todo.push(definition);
                    }
                }
                definitions = todo;
            }
            if distinct_definitions.len() > 1 {
                conflicts += 1;
                warn!(
                    "conflicting definitions of {tag} '{name}': {}",
                    distinct_definitions
                        .iter()
                        .map(Id::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            // with no conflicts, map all declarations to the definition
            if distinct_definitions.len() == 1 {
                let candidate = distinct_definitions[0];
                for &declaration in &info.declarations {
                    if unify(graph, &mut unification, declaration, candidate) {
                        declarations_unified += 1;
                    }
                }
            }
        }
    });
    metrics.count("resolve.definitions_unified", definitions_unified);
    metrics.count("resolve.declarations_unified", declarations_unified);
    metrics.count("resolve.conflicts", conflicts);

    let mut root = root;
    metrics.timed("resolve.rewrite", |metrics| {
        let (removed, retained) = unification.rewrite(graph);
        metrics.count("resolve.removed", removed);
        metrics.count("resolve.retained", retained);
        // in case the root node itself was remapped
        unification.update(&mut root);
    });
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::{Equals, SimpleEqualityCache};
    use crate::graph::*;

    fn int(graph: &mut Graph) -> Id {
        graph.add(Node::Primitive(Primitive {
            name: "int".to_string(),
            encoding: Some(Encoding::SignedInteger),
            bytesize: 4,
        }))
    }

    fn member(graph: &mut Graph, name: &str, type_id: Id) -> Id {
        graph.add(Node::Member(Member {
            name: name.to_string(),
            type_id,
            offset: 0,
            bitsize: 0,
        }))
    }

    fn struct_definition(graph: &mut Graph, name: &str, members: Vec<Id>) -> Id {
        graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: name.to_string(),
            definition: Some(StructUnionDefinition {
                bytesize: 4,
                base_classes: vec![],
                methods: vec![],
                members,
            }),
        }))
    }

    fn interface_root(graph: &mut Graph, types: &[(&str, Id)]) -> Id {
        graph.add(Node::Interface(Interface {
            symbols: Default::default(),
            types: types
                .iter()
                .map(|(name, id)| (name.to_string(), *id))
                .collect(),
        }))
    }

    fn graph_snapshot(graph: &Graph) -> Vec<Id> {
        graph.ids()
    }

    #[test]
    fn test_declaration_resolves_onto_definition() {
        let mut graph = Graph::new();
        let declaration = graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: "S".to_string(),
            definition: None,
        }));
        let pointer = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: declaration,
        }));
        let int_id = int(&mut graph);
        let x = member(&mut graph, "x", int_id);
        let next = member(&mut graph, "next", pointer);
        let definition = struct_definition(&mut graph, "S", vec![x, next]);
        let root = interface_root(&mut graph, &[("struct S", definition), ("p", pointer)]);

        let root = resolve_types(&mut graph, root, &mut Metrics::new()).unwrap();
        assert!(!graph.is_set(declaration));
        match graph.get(pointer) {
            Node::PointerReference(x) => assert_eq!(x.pointee_type_id, definition),
            other => panic!("unexpected node: {other:?}"),
        }
        match graph.get(root) {
            Node::Interface(x) => assert_eq!(x.types["struct S"], definition),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_definitions_collapse() {
        let mut graph = Graph::new();
        let int1 = int(&mut graph);
        let int2 = int(&mut graph);
        let member1 = member(&mut graph, "x", int1);
        let member2 = member(&mut graph, "x", int2);
        let definition1 = struct_definition(&mut graph, "S", vec![member1]);
        let definition2 = struct_definition(&mut graph, "S", vec![member2]);
        let root = interface_root(&mut graph, &[("a", definition1), ("b", definition2)]);

        resolve_types(&mut graph, root, &mut Metrics::new()).unwrap();
        // the first definition is the candidate and is retained
        assert!(graph.is_set(definition1));
        assert!(!graph.is_set(definition2));
    }

    #[test]
    fn test_conflicting_definitions_are_kept_distinct() {
        let mut graph = Graph::new();
        let int_id = int(&mut graph);
        let short_id = graph.add(Node::Primitive(Primitive {
            name: "short".to_string(),
            encoding: Some(Encoding::SignedInteger),
            bytesize: 2,
        }));
        let member1 = member(&mut graph, "x", int_id);
        let member2 = member(&mut graph, "x", short_id);
        let definition1 = struct_definition(&mut graph, "S", vec![member1]);
        let definition2 = struct_definition(&mut graph, "S", vec![member2]);
        let declaration = graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: "S".to_string(),
            definition: None,
        }));
        let root = interface_root(
            &mut graph,
            &[("a", definition1), ("b", definition2), ("c", declaration)],
        );

        resolve_types(&mut graph, root, &mut Metrics::new()).unwrap();
        // conflict: both definitions survive, the declaration stays unresolved
        assert!(graph.is_set(definition1));
        assert!(graph.is_set(definition2));
        assert!(graph.is_set(declaration));
    }

    #[test]
    fn test_anonymous_forward_declaration_is_an_input_error() {
        let mut graph = Graph::new();
        let anonymous = graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: String::new(),
            definition: None,
        }));
        let root = interface_root(&mut graph, &[("x", anonymous)]);
        let error = resolve_types(&mut graph, root, &mut Metrics::new()).unwrap_err();
        assert!(error.to_string().contains("anonymous forward declaration"));
    }

    #[test]
    fn test_dangling_reference_is_an_input_error() {
        let mut graph = Graph::new();
        let hole = graph.allocate();
        let pointer = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: hole,
        }));
        let root = interface_root(&mut graph, &[("p", pointer)]);
        let error = resolve_types(&mut graph, root, &mut Metrics::new()).unwrap_err();
        assert!(error.to_string().contains("dangling reference"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut graph = Graph::new();
        let declaration = graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: "S".to_string(),
            definition: None,
        }));
        let pointer = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: declaration,
        }));
        let next = member(&mut graph, "next", pointer);
        let definition = struct_definition(&mut graph, "S", vec![next]);
        let root = interface_root(&mut graph, &[("struct S", definition), ("p", pointer)]);

        let root = resolve_types(&mut graph, root, &mut Metrics::new()).unwrap();
        let after_once = graph_snapshot(&graph);
        let root_again = resolve_types(&mut graph, root, &mut Metrics::new()).unwrap();
        assert_eq!(root, root_again);
        assert_eq!(after_once, graph_snapshot(&graph));
    }

    #[test]
    fn test_pointers_to_resolved_type_compare_equal() {
        let mut graph = Graph::new();
        let declaration = graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: "S".to_string(),
            definition: None,
        }));
        let pointer_to_declaration = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: declaration,
        }));
        let int_id = int(&mut graph);
        let x = member(&mut graph, "x", int_id);
        let definition = struct_definition(&mut graph, "S", vec![x]);
        let pointer_to_definition = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: definition,
        }));
        let root = interface_root(
            &mut graph,
            &[("p", pointer_to_declaration), ("q", pointer_to_definition)],
        );

        resolve_types(&mut graph, root, &mut Metrics::new()).unwrap();
        let mut equals = Equals::new(&graph, SimpleEqualityCache::new());
        assert!(equals.eq(pointer_to_declaration, pointer_to_definition));
    }
}
