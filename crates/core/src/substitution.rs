//! Single-node id substitution
//!
//! Rewrites every outgoing id reference of one node according to a caller
//! supplied mapping. The caller decides which nodes substitution applies to
//! (for example, excluding nodes about to be removed). The mapping is only
//! written back when it actually changes an id, avoiding silent stores.

use crate::graph::{Graph, Id, Node};
use std::collections::BTreeMap;

fn update(id: &mut Id, remap: &mut impl FnMut(Id) -> Id) {
    let fid = remap(*id);
    if fid != *id {
        *id = fid;
    }
}

fn update_all(ids: &mut [Id], remap: &mut impl FnMut(Id) -> Id) {
    for id in ids {
        update(id, remap);
    }
}

fn update_map(ids: &mut BTreeMap<String, Id>, remap: &mut impl FnMut(Id) -> Id) {
    for id in ids.values_mut() {
        update(id, remap);
    }
}

/// Rewrites every id reference held by `node`.
pub fn rewrite_node(node: &mut Node, remap: &mut impl FnMut(Id) -> Id) {
    match node {
        Node::Void | Node::Variadic | Node::Primitive(_) => {}
        Node::PointerReference(x) => update(&mut x.pointee_type_id, remap),
        Node::PointerToMember(x) => {
            update(&mut x.containing_type_id, remap);
            update(&mut x.pointee_type_id, remap);
        }
        Node::Typedef(x) => update(&mut x.referred_type_id, remap),
        Node::Qualified(x) => update(&mut x.qualified_type_id, remap),
        Node::Array(x) => update(&mut x.element_type_id, remap),
        Node::BaseClass(x) => update(&mut x.type_id, remap),
        Node::Method(x) => update(&mut x.type_id, remap),
        Node::Member(x) => update(&mut x.type_id, remap),
        Node::StructUnion(x) => {
            if let Some(definition) = &mut x.definition {
                update_all(&mut definition.base_classes, remap);
                update_all(&mut definition.methods, remap);
                update_all(&mut definition.members, remap);
            }
        }
        Node::Enumeration(x) => {
            if let Some(definition) = &mut x.definition {
                update(&mut definition.underlying_type_id, remap);
            }
        }
        Node::Function(x) => {
            update_all(&mut x.parameters, remap);
            update(&mut x.return_type_id, remap);
        }
        Node::ElfSymbol(x) => {
            if let Some(type_id) = &mut x.type_id {
                update(type_id, remap);
            }
        }
        Node::Interface(x) => {
            update_map(&mut x.symbols, remap);
            update_map(&mut x.types, remap);
        }
    }
}

/// Rewrites every id reference of the node at `id` in place.
pub fn substitute(graph: &mut Graph, id: Id, remap: &mut impl FnMut(Id) -> Id) {
    rewrite_node(graph.get_mut(id), remap);
}

/// Every id referenced by `node`, in field order.
pub fn references(node: &Node) -> Vec<Id> {
    let mut ids = Vec::new();
    match node {
        Node::Void | Node::Variadic | Node::Primitive(_) => {}
        Node::PointerReference(x) => ids.push(x.pointee_type_id),
        Node::PointerToMember(x) => {
            ids.push(x.containing_type_id);
            ids.push(x.pointee_type_id);
        }
        Node::Typedef(x) => ids.push(x.referred_type_id),
        Node::Qualified(x) => ids.push(x.qualified_type_id),
        Node::Array(x) => ids.push(x.element_type_id),
        Node::BaseClass(x) => ids.push(x.type_id),
        Node::Method(x) => ids.push(x.type_id),
        Node::Member(x) => ids.push(x.type_id),
        Node::StructUnion(x) => {
            if let Some(definition) = &x.definition {
                ids.extend_from_slice(&definition.base_classes);
                ids.extend_from_slice(&definition.methods);
                ids.extend_from_slice(&definition.members);
            }
        }
        Node::Enumeration(x) => {
            if let Some(definition) = &x.definition {
                ids.push(definition.underlying_type_id);
            }
        }
        Node::Function(x) => {
            ids.push(x.return_type_id);
            ids.extend_from_slice(&x.parameters);
        }
        Node::ElfSymbol(x) => ids.extend(x.type_id),
        Node::Interface(x) => {
            ids.extend(x.symbols.values().copied());
            ids.extend(x.types.values().copied());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::*;

    #[test]
    fn test_substitute_scalar_reference() {
        let mut graph = Graph::new();
        let old = graph.add(Node::Void);
        let new = graph.add(Node::Void);
        let pointer = graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id: old,
        }));
        substitute(&mut graph, pointer, &mut |id| if id == old { new } else { id });
        match graph.get(pointer) {
            Node::PointerReference(x) => assert_eq!(x.pointee_type_id, new),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_substitute_vector_and_map_references() {
        let mut graph = Graph::new();
        let old = graph.add(Node::Void);
        let new = graph.add(Node::Void);
        let function = graph.add(Node::Function(Function {
            return_type_id: old,
            parameters: vec![old, new],
        }));
        let interface = graph.add(Node::Interface(Interface {
            symbols: [("a".to_string(), old)].into_iter().collect(),
            types: Default::default(),
        }));
        let mut remap = |id| if id == old { new } else { id };
        substitute(&mut graph, function, &mut remap);
        substitute(&mut graph, interface, &mut remap);
        match graph.get(function) {
            Node::Function(x) => {
                assert_eq!(x.return_type_id, new);
                assert_eq!(x.parameters, vec![new, new]);
            }
            other => panic!("unexpected node: {other:?}"),
        }
        match graph.get(interface) {
            Node::Interface(x) => assert_eq!(x.symbols["a"], new),
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn test_references_cover_definitions() {
        let mut graph = Graph::new();
        let int = graph.add(Node::Primitive(Primitive {
            name: "int".to_string(),
            encoding: Some(Encoding::SignedInteger),
            bytesize: 4,
        }));
        let member = graph.add(Node::Member(Member {
            name: "x".to_string(),
            type_id: int,
            offset: 0,
            bitsize: 0,
        }));
        let node = Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: "S".to_string(),
            definition: Some(StructUnionDefinition {
                bytesize: 4,
                base_classes: vec![],
                methods: vec![],
                members: vec![member],
            }),
        });
        assert_eq!(references(&node), vec![member]);
        let declaration = Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: "S".to_string(),
            definition: None,
        });
        assert!(references(&declaration).is_empty());
    }
}
