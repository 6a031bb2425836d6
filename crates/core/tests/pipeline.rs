//! End-to-end pipeline tests: build two ABI surfaces, normalise them, diff
//! them, and render the report, the way the command-line tools do.

use symgraph_core::comparison::{Ignore, IgnoreKind, diff};
use symgraph_core::deduplication::deduplicate;
use symgraph_core::equality::{Equals, SimpleEqualityCache};
use symgraph_core::fingerprint::fingerprint;
use symgraph_core::graph::*;
use symgraph_core::metrics::Metrics;
use symgraph_core::reporting::{OutputFormat, report};
use symgraph_core::resolution::resolve_types;
use symgraph_core::serial;

struct Builder {
    graph: Graph,
    int: Id,
}

impl Builder {
    fn new() -> Self {
        let mut graph = Graph::new();
        let int = graph.add(Node::Primitive(Primitive {
            name: "int".to_string(),
            encoding: Some(Encoding::SignedInteger),
            bytesize: 4,
        }));
        Builder { graph, int }
    }

    fn member(&mut self, name: &str, type_id: Id, offset: u64, bitsize: u64) -> Id {
        self.graph.add(Node::Member(Member {
            name: name.to_string(),
            type_id,
            offset,
            bitsize,
        }))
    }

    fn structure(&mut self, name: &str, bytesize: u64, members: Vec<Id>) -> Id {
        self.graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: name.to_string(),
            definition: Some(StructUnionDefinition {
                bytesize,
                base_classes: vec![],
                methods: vec![],
                members,
            }),
        }))
    }

    fn declaration(&mut self, name: &str) -> Id {
        self.graph.add(Node::StructUnion(StructUnion {
            kind: StructUnionKind::Struct,
            name: name.to_string(),
            definition: None,
        }))
    }

    fn pointer(&mut self, pointee_type_id: Id) -> Id {
        self.graph.add(Node::PointerReference(PointerReference {
            kind: ReferenceKind::Pointer,
            pointee_type_id,
        }))
    }

    fn symbol(&mut self, name: &str, type_id: Id) -> Id {
        self.graph.add(Node::ElfSymbol(ElfSymbol {
            symbol_name: name.to_string(),
            version_info: None,
            is_defined: true,
            symbol_type: SymbolType::Object,
            binding: Binding::Global,
            visibility: Visibility::Default,
            crc: None,
            namespace: None,
            type_id: Some(type_id),
            full_name: None,
        }))
    }

    fn interface(&mut self, symbols: &[(&str, Id)]) -> Id {
        self.graph.add(Node::Interface(Interface {
            symbols: symbols
                .iter()
                .map(|(name, id)| (name.to_string(), *id))
                .collect(),
            types: Default::default(),
        }))
    }

    fn normalise(&mut self, root: Id) -> Id {
        let mut metrics = Metrics::new();
        let root = resolve_types(&mut self.graph, root, &mut metrics).unwrap();
        let hashes = fingerprint(&self.graph, root, &mut metrics);
        deduplicate(&mut self.graph, root, &hashes, &mut metrics)
    }
}

#[test]
fn test_forward_declaration_and_duplicate_collapse_end_to_end() {
    let mut builder = Builder::new();
    let int = builder.int;
    // one symbol whose type forward-declares `struct node`, one that uses
    // the definition, plus a duplicated int
    let declaration = builder.declaration("node");
    let pointer_to_declaration = builder.pointer(declaration);
    let definition_member = builder.member("value", int, 0, 0);
    let definition = builder.structure("node", 4, vec![definition_member]);
    let pointer_to_definition = builder.pointer(definition);
    let symbol1 = builder.symbol("head", pointer_to_declaration);
    let symbol2 = builder.symbol("tail", pointer_to_definition);
    let root = builder.interface(&[("head", symbol1), ("tail", symbol2)]);

    let root = builder.normalise(root);
    let graph = &builder.graph;

    // the declaration is gone and both symbols point at one pointer type
    let (head_type, tail_type) = match graph.get(root) {
        Node::Interface(x) => {
            let head = x.symbols["head"];
            let tail = x.symbols["tail"];
            match (graph.get(head), graph.get(tail)) {
                (Node::ElfSymbol(head), Node::ElfSymbol(tail)) => {
                    (head.type_id.unwrap(), tail.type_id.unwrap())
                }
                other => panic!("unexpected nodes: {other:?}"),
            }
        }
        other => panic!("unexpected node: {other:?}"),
    };
    assert_eq!(head_type, tail_type);
}

#[test]
fn test_diff_of_normalised_graphs_reports_member_change() {
    let mut builder = Builder::new();
    let int = builder.int;

    let member1 = builder.member("value", int, 0, 0);
    let structure1 = builder.structure("node", 4, vec![member1]);
    let symbol1 = builder.symbol("head", structure1);
    let root1 = builder.interface(&[("head", symbol1)]);

    let member2 = builder.member("value", int, 32, 0);
    let structure2 = builder.structure("node", 8, vec![member2]);
    let symbol2 = builder.symbol("head", structure2);
    let root2 = builder.interface(&[("head", symbol2)]);

    let root1 = builder.normalise(root1);
    let root2 = builder.normalise(root2);
    let graph = &builder.graph;

    let outcome = diff(graph, root1, root2, Ignore::default(), &mut Metrics::new());
    assert!(!outcome.equals);
    let comparison = outcome.comparison.unwrap();
    let mut rendered = Vec::new();
    report(
        graph,
        &outcome.outcomes,
        &comparison,
        OutputFormat::Plain,
        &mut rendered,
    )
    .unwrap();
    let rendered = String::from_utf8(rendered).unwrap();
    assert!(rendered.contains("object symbol 'struct node head' changed"));
    assert!(rendered.contains("byte size changed from 4 to 8"));
    assert!(rendered.contains("offset changed from 0 to 32"));
}

#[test]
fn test_round_trip_then_diff_is_clean() {
    let mut builder = Builder::new();
    let int = builder.int;
    let member = builder.member("value", int, 0, 0);
    let structure = builder.structure("node", 4, vec![member]);
    let symbol = builder.symbol("head", structure);
    let root = builder.interface(&[("head", symbol)]);
    let root = builder.normalise(root);

    let mut file = Vec::new();
    serial::write_json(&builder.graph, root, &mut file).unwrap();
    let reread = serial::read_json(&mut builder.graph, &mut file.as_slice()).unwrap();

    let graph = &builder.graph;
    let mut equals = Equals::new(graph, SimpleEqualityCache::new());
    assert!(equals.eq(root, reread));
    let outcome = diff(graph, root, reread, Ignore::default(), &mut Metrics::new());
    assert!(outcome.equals);
    assert!(outcome.outcomes.is_empty());
}

#[test]
fn test_ignore_flags_suppress_reported_classes_only() {
    let mut builder = Builder::new();
    let int = builder.int;
    let bitfield1 = builder.member("bits", int, 0, 5);
    let bitfield2 = builder.member("bits", int, 0, 6);
    let structure1 = builder.structure("flags", 4, vec![bitfield1]);
    let structure2 = builder.structure("flags", 4, vec![bitfield2]);
    let symbol1 = builder.symbol("flags", structure1);
    let symbol2 = builder.symbol("flags", structure2);
    let root1 = builder.interface(&[("flags", symbol1)]);
    let root2 = builder.interface(&[("flags", symbol2)]);
    let graph = &builder.graph;

    let outcome = diff(graph, root1, root2, Ignore::default(), &mut Metrics::new());
    assert!(!outcome.equals);

    let ignore = Ignore::new([IgnoreKind::MemberSize]);
    let outcome = diff(graph, root1, root2, ignore, &mut Metrics::new());
    assert!(outcome.equals);
}
