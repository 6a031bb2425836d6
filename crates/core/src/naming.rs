//! Type naming
//!
//! Renders C-syntax names for nodes, for use in reports. A [`Name`] keeps
//! the type stem, its syntactic precedence, and the text that goes to the
//! right of a declared entity, so that pointers, arrays, and functions nest
//! with correct bracketing: `int(*)[7]`, `void(*)(int)`.

use crate::graph::{Graph, Id, Node, Qualifier, ReferenceKind};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Nil,
    Pointer,
    ArrayFunction,
    Atomic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// A partially rendered type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    left: String,
    precedence: Precedence,
    right: String,
}

impl Name {
    fn atom(name: impl Into<String>) -> Self {
        Name {
            left: name.into(),
            precedence: Precedence::Nil,
            right: String::new(),
        }
    }

    fn add(&self, side: Side, precedence: Precedence, text: &str) -> Name {
        let bracket = precedence < self.precedence;
        let mut left = self.left.clone();
        let mut right = String::new();

        // Bits on the left sometimes need separating whitespace; bits on
        // the right are arrays and functions and need none.
        if bracket {
            left.push('(');
        } else if side == Side::Left && precedence == Precedence::Atomic {
            left.push(' ');
        }
        match side {
            Side::Left => left.push_str(text),
            Side::Right => right.push_str(text),
        }
        if bracket {
            right.push(')');
        }
        right.push_str(&self.right);

        Name {
            left,
            precedence,
            right,
        }
    }

    fn qualify(&self, qualifier: Qualifier) -> Name {
        // Qualifiers attach without affecting precedence, but the
        // precedence determines where the qualifier lands.
        match self.precedence {
            Precedence::Nil => {
                // to the left of the stem: const int, not int const
                Name {
                    left: format!("{qualifier} {}", self.left),
                    precedence: self.precedence,
                    right: self.right.clone(),
                }
            }
            Precedence::Pointer => {
                // to the right of the sigil
                Name {
                    left: format!("{} {qualifier}", self.left),
                    precedence: self.precedence,
                    right: self.right.clone(),
                }
            }
            Precedence::ArrayFunction => {
                // qualifiers do not normally apply to arrays or functions
                Name {
                    left: self.left.clone(),
                    precedence: self.precedence,
                    right: format!("{{{qualifier}>}}{}", self.right),
                }
            }
            Precedence::Atomic => {
                // qualifiers do not normally apply to names
                Name {
                    left: format!("{}{{<{qualifier}}}", self.left),
                    precedence: self.precedence,
                    right: self.right.clone(),
                }
            }
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.left, self.right)
    }
}

/// Memoised names, shared across one report.
pub type NameCache = HashMap<Id, Name>;

/// Renders the name of a node, memoising every intermediate result.
pub fn describe(graph: &Graph, names: &mut NameCache, id: Id) -> Name {
    if let Some(cached) = names.get(&id) {
        return cached.clone();
    }
    // recursion barrier, replaced once the real name is known
    names.insert(id, Name::atom("#"));
    let name = describe_node(graph, names, id);
    names.insert(id, name.clone());
    name
}

fn describe_node(graph: &Graph, names: &mut NameCache, id: Id) -> Name {
    match graph.get(id) {
        Node::Void => Name::atom("void"),
        Node::Variadic => Name::atom("..."),
        Node::PointerReference(x) => {
            let sign = match x.kind {
                ReferenceKind::Pointer => "*",
                ReferenceKind::LvalueReference => "&",
                ReferenceKind::RvalueReference => "&&",
            };
            describe(graph, names, x.pointee_type_id).add(Side::Left, Precedence::Pointer, sign)
        }
        Node::PointerToMember(x) => {
            let containing = describe(graph, names, x.containing_type_id);
            describe(graph, names, x.pointee_type_id).add(
                Side::Left,
                Precedence::Pointer,
                &format!(" {containing}::*"),
            )
        }
        Node::Typedef(x) => Name::atom(x.name.as_str()),
        Node::Qualified(x) => describe(graph, names, x.qualified_type_id).qualify(x.qualifier),
        Node::Primitive(x) => Name::atom(x.name.as_str()),
        Node::Array(x) => describe(graph, names, x.element_type_id).add(
            Side::Right,
            Precedence::ArrayFunction,
            &format!("[{}]", x.number_of_elements),
        ),
        Node::BaseClass(x) => describe(graph, names, x.type_id),
        Node::Member(x) => {
            let mut description = describe(graph, names, x.type_id);
            if !x.name.is_empty() {
                description = description.add(Side::Left, Precedence::Atomic, &x.name);
            }
            if x.bitsize > 0 {
                description = description.add(
                    Side::Right,
                    Precedence::Atomic,
                    &format!(" : {}", x.bitsize),
                );
            }
            description
        }
        Node::Method(x) => {
            if x.mangled_name == x.name {
                Name::atom(x.name.as_str())
            } else {
                Name::atom(format!("{} {{{}}}", x.name, x.mangled_name))
            }
        }
        Node::StructUnion(x) => {
            let mut os = format!("{} ", x.kind);
            if !x.name.is_empty() {
                os.push_str(&x.name);
            } else if let Some(definition) = &x.definition {
                os.push_str("{ ");
                for &member in &definition.members {
                    os.push_str(&describe(graph, names, member).to_string());
                    os.push_str("; ");
                }
                os.push('}');
            }
            Name::atom(os)
        }
        Node::Enumeration(x) => {
            let mut os = "enum ".to_string();
            if !x.name.is_empty() {
                os.push_str(&x.name);
            } else if let Some(definition) = &x.definition {
                os.push_str("{ ");
                for (name, value) in &definition.enumerators {
                    os.push_str(&format!("{name} = {value}, "));
                }
                os.push('}');
            }
            Name::atom(os)
        }
        Node::Function(x) => {
            let mut os = "(".to_string();
            for (i, &parameter) in x.parameters.iter().enumerate() {
                if i > 0 {
                    os.push_str(", ");
                }
                os.push_str(&describe(graph, names, parameter).to_string());
            }
            os.push(')');
            describe(graph, names, x.return_type_id).add(
                Side::Right,
                Precedence::ArrayFunction,
                &os,
            )
        }
        Node::ElfSymbol(x) => {
            let name = x.full_name.as_ref().unwrap_or(&x.symbol_name);
            match x.type_id {
                Some(type_id) => {
                    describe(graph, names, type_id).add(Side::Left, Precedence::Atomic, name)
                }
                None => Name::atom(name.as_str()),
            }
        }
        Node::Interface(_) => Name::atom("interface"),
    }
}

/// A short description of what kind of entity a node is.
pub fn describe_kind(graph: &Graph, id: Id) -> String {
    match graph.get(id) {
        Node::BaseClass(_) => "base class".to_string(),
        Node::Member(_) => "member".to_string(),
        Node::Method(_) => "method".to_string(),
        Node::ElfSymbol(x) => format!("{} symbol", x.symbol_type),
        Node::Interface(_) => "interface".to_string(),
        _ => "type".to_string(),
    }
}

/// Extra description, so far only the versioned name of an aliased symbol.
pub fn describe_extra(graph: &Graph, id: Id) -> String {
    match graph.get(id) {
        Node::ElfSymbol(x) => {
            let name = x.full_name.as_ref().unwrap_or(&x.symbol_name);
            let versioned = x.versioned_name();
            if *name == versioned {
                String::new()
            } else {
                format!(" {{{versioned}}}")
            }
        }
        _ => String::new(),
    }
}
