//! Report rendering
//!
//! Walks a diff graph and renders it for humans. Two formats:
//!
//! - *plain*: an indented tree, one line per detail, with cycles broken by
//!   "(being reported)" / "(already reported)" markers;
//! - *flat*: one section per reportable node, with nested reportable nodes
//!   queued and printed as their own sections.

use crate::comparison::{Comparison, Diff, DiffDetail, Outcomes};
use crate::error::Error;
use crate::graph::{Graph, Id};
use crate::naming::{NameCache, describe, describe_extra, describe_kind};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Flat,
}

const INDENT_INCREMENT: usize = 2;

struct Reporting<'a> {
    graph: &'a Graph,
    outcomes: &'a Outcomes,
    names: NameCache,
}

impl Reporting<'_> {
    fn description(&mut self, id: Id) -> String {
        describe(self.graph, &mut self.names, id).to_string()
    }

    fn resolved_description(&mut self, id: Id) -> String {
        let (resolved, typedefs) = crate::comparison::resolve_typedefs(self.graph, id);
        let mut os = String::new();
        for name in &typedefs {
            os.push_str(&format!("'{name}' = "));
        }
        os.push_str(&format!("'{}'", self.description(resolved)));
        os
    }

    /// Describes an addition, a removal, or the header of a change. Returns
    /// true for the one-sided cases, which have nothing below them.
    fn print_comparison(
        &mut self,
        comparison: &Comparison,
        output: &mut dyn Write,
    ) -> Result<bool, Error> {
        let &(id1, id2) = comparison;
        match (id1, id2) {
            (Some(id1), None) => {
                writeln!(
                    output,
                    "{} '{}'{} was removed",
                    describe_kind(self.graph, id1),
                    self.description(id1),
                    describe_extra(self.graph, id1),
                )?;
                Ok(true)
            }
            (None, Some(id2)) => {
                writeln!(
                    output,
                    "{} '{}'{} was added",
                    describe_kind(self.graph, id2),
                    self.description(id2),
                    describe_extra(self.graph, id2),
                )?;
                Ok(true)
            }
            (Some(id1), Some(id2)) => {
                let description1 = self.resolved_description(id1);
                let description2 = self.resolved_description(id2);
                write!(output, "{} ", describe_kind(self.graph, id1))?;
                if description1 == description2 {
                    write!(output, "{description1} changed")?;
                } else {
                    write!(output, "changed from {description1} to {description2}")?;
                }
                Ok(false)
            }
            (None, None) => panic!("internal error: empty comparison"),
        }
    }

    fn diff_of(&self, comparison: &Comparison) -> &Diff {
        self.outcomes
            .get(comparison)
            .unwrap_or_else(|| panic!("internal error: missing comparison"))
    }
}

// unvisited (absent) -> started (false) -> finished (true)
type Seen = HashMap<Comparison, bool>;

fn print_plain_comparison(
    reporting: &mut Reporting,
    comparison: &Comparison,
    seen: &mut Seen,
    output: &mut dyn Write,
    indent: usize,
) -> Result<(), Error> {
    if reporting.print_comparison(comparison, output)? {
        return Ok(());
    }
    let diff = reporting.diff_of(comparison).clone();

    if diff.holds_changes {
        match seen.get(comparison).copied() {
            Some(false) => {
                writeln!(output, " (being reported)")?;
                return Ok(());
            }
            Some(true) => {
                if !diff.details.is_empty() {
                    writeln!(output, " (already reported)")?;
                }
                return Ok(());
            }
            None => {
                seen.insert(*comparison, false);
            }
        }
    }

    writeln!(output)?;
    print_plain_details(
        reporting,
        &diff.details,
        seen,
        output,
        indent + INDENT_INCREMENT,
    )?;

    if diff.holds_changes {
        seen.insert(*comparison, true);
    }
    Ok(())
}

fn print_plain_details(
    reporting: &mut Reporting,
    details: &[DiffDetail],
    seen: &mut Seen,
    output: &mut dyn Write,
    indent: usize,
) -> Result<(), Error> {
    for detail in details {
        write!(output, "{}{}", " ".repeat(indent), detail.text)?;
        match &detail.edge {
            None => writeln!(output)?,
            Some(edge) => {
                if !detail.text.is_empty() {
                    write!(output, " ")?;
                }
                print_plain_comparison(reporting, edge, seen, output, indent)?;
            }
        }
        // paragraph spacing between top-level entries
        if indent == 0 {
            writeln!(output)?;
        }
    }
    Ok(())
}

/// Prints the diff rooted at `comparison` as an indented tree. The root is
/// unpacked so the output reads as a forest of changed symbols rather than
/// one interface-level tree.
fn report_plain(
    reporting: &mut Reporting,
    comparison: &Comparison,
    output: &mut dyn Write,
) -> Result<(), Error> {
    let diff = reporting.diff_of(comparison).clone();
    let mut seen = Seen::new();
    print_plain_details(reporting, &diff.details, &mut seen, output, 0)
}

/// Prints the subtree of the diff graph starting at a node, stopping at and
/// queuing nodes that can hold diffs themselves. Returns whether anything
/// printed was interesting (a change not hidden behind another section).
fn flat_print(
    reporting: &mut Reporting,
    comparison: &Comparison,
    seen: &mut HashSet<Comparison>,
    todo: &mut VecDeque<Comparison>,
    stop: bool,
    output: &mut Vec<u8>,
    mut indent: usize,
) -> Result<bool, Error> {
    // Additions and removals are always interesting; no recursion there.
    if reporting.print_comparison(comparison, output)? {
        return Ok(true);
    }
    let diff = reporting.diff_of(comparison).clone();
    writeln!(output)?;

    // Stop at nested diff-holding nodes and queue them for their own
    // sections instead.
    if diff.holds_changes && stop {
        if seen.insert(*comparison) {
            todo.push_back(*comparison);
        }
        return Ok(false);
    }
    // the stop flag is only cleared for queued, diff-holding sections
    if !diff.holds_changes && !stop {
        panic!("internal error: flat section requested for a non-reportable node");
    }

    indent += INDENT_INCREMENT;
    let mut interesting = diff.has_changes;
    for detail in &diff.details {
        match &detail.edge {
            None => {
                writeln!(output, "{}{}", " ".repeat(indent), detail.text)?;
            }
            Some(edge) => {
                let mut sub_output = Vec::new();
                write!(sub_output, "{}{}", " ".repeat(indent), detail.text)?;
                if !detail.text.is_empty() {
                    write!(sub_output, " ")?;
                }
                let sub_interesting =
                    flat_print(reporting, edge, seen, todo, true, &mut sub_output, indent)?;
                if sub_interesting {
                    output.extend_from_slice(&sub_output);
                }
                interesting |= sub_interesting;
            }
        }
    }
    Ok(interesting)
}

fn report_flat(
    reporting: &mut Reporting,
    comparison: &Comparison,
    output: &mut dyn Write,
) -> Result<(), Error> {
    // Unpack the root so the report is a forest of symbol sections rather
    // than a single interface-level tree.
    let diff = reporting.diff_of(comparison).clone();
    let mut seen = HashSet::new();
    let mut todo = VecDeque::new();
    for detail in &diff.details {
        let edge = detail
            .edge
            .as_ref()
            .unwrap_or_else(|| panic!("internal error: interface detail without edge"));
        let mut section = Vec::new();
        if flat_print(
            reporting, edge, &mut seen, &mut todo, true, &mut section, 0,
        )? {
            output.write_all(&section)?;
            writeln!(output)?;
        }
    }
    while let Some(comparison) = todo.pop_front() {
        let mut section = Vec::new();
        if flat_print(
            reporting,
            &comparison,
            &mut seen,
            &mut todo,
            false,
            &mut section,
            0,
        )? {
            output.write_all(&section)?;
            writeln!(output)?;
        }
    }
    Ok(())
}

/// Renders the diff graph rooted at `comparison` to `output`.
pub fn report(
    graph: &Graph,
    outcomes: &Outcomes,
    comparison: &Comparison,
    format: OutputFormat,
    output: &mut dyn Write,
) -> Result<(), Error> {
    let mut reporting = Reporting {
        graph,
        outcomes,
        names: NameCache::new(),
    };
    match format {
        OutputFormat::Plain => report_plain(&mut reporting, comparison, output),
        OutputFormat::Flat => report_flat(&mut reporting, comparison, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{Ignore, diff};
    use crate::graph::*;
    use crate::metrics::Metrics;

    fn build_interfaces(graph: &mut Graph) -> (Id, Id) {
        let int4 = graph.add(Node::Primitive(Primitive {
            name: "int".to_string(),
            encoding: Some(Encoding::SignedInteger),
            bytesize: 4,
        }));
        let int8 = graph.add(Node::Primitive(Primitive {
            name: "int".to_string(),
            encoding: Some(Encoding::SignedInteger),
            bytesize: 8,
        }));
        let symbol = |graph: &mut Graph, name: &str, type_id| {
            graph.add(Node::ElfSymbol(ElfSymbol {
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
        };
        let symbol1 = symbol(graph, "counter", int4);
        let symbol2 = symbol(graph, "counter", int8);
        let removed = symbol(graph, "gone", int4);
        let interface1 = graph.add(Node::Interface(Interface {
            symbols: [
                ("counter".to_string(), symbol1),
                ("gone".to_string(), removed),
            ]
            .into_iter()
            .collect(),
            types: Default::default(),
        }));
        let interface2 = graph.add(Node::Interface(Interface {
            symbols: [("counter".to_string(), symbol2)].into_iter().collect(),
            types: Default::default(),
        }));
        (interface1, interface2)
    }

    fn render(graph: &Graph, root1: Id, root2: Id, format: OutputFormat) -> String {
        let outcome = diff(graph, root1, root2, Ignore::default(), &mut Metrics::new());
        let comparison = outcome.comparison.expect("inputs differ");
        let mut output = Vec::new();
        report(graph, &outcome.outcomes, &comparison, format, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_plain_report() {
        let mut graph = Graph::new();
        let (interface1, interface2) = build_interfaces(&mut graph);
        let rendered = render(&graph, interface1, interface2, OutputFormat::Plain);
        assert!(rendered.contains("object symbol 'int counter' changed"));
        assert!(rendered.contains("byte size changed from 4 to 8"));
        assert!(rendered.contains("object symbol 'int gone' was removed"));
    }

    #[test]
    fn test_flat_report_sections() {
        let mut graph = Graph::new();
        let (interface1, interface2) = build_interfaces(&mut graph);
        let rendered = render(&graph, interface1, interface2, OutputFormat::Flat);
        assert!(rendered.contains("object symbol 'int counter' changed"));
        assert!(rendered.contains("was removed"));
    }

    #[test]
    fn test_plain_report_marks_revisited_nodes() {
        // a named struct that changed, reached twice via two symbols
        let mut graph = Graph::new();
        let make_struct = |graph: &mut Graph, bytesize| {
            graph.add(Node::StructUnion(StructUnion {
                kind: StructUnionKind::Struct,
                name: "S".to_string(),
                definition: Some(StructUnionDefinition {
                    bytesize,
                    base_classes: vec![],
                    methods: vec![],
                    members: vec![],
                }),
            }))
        };
        let struct1 = make_struct(&mut graph, 4);
        let struct2 = make_struct(&mut graph, 8);
        let symbol = |graph: &mut Graph, name: &str, type_id| {
            graph.add(Node::ElfSymbol(ElfSymbol {
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
        };
        let a1 = symbol(&mut graph, "a", struct1);
        let b1 = symbol(&mut graph, "b", struct1);
        let a2 = symbol(&mut graph, "a", struct2);
        let b2 = symbol(&mut graph, "b", struct2);
        let interface1 = graph.add(Node::Interface(Interface {
            symbols: [("a".to_string(), a1), ("b".to_string(), b1)]
                .into_iter()
                .collect(),
            types: Default::default(),
        }));
        let interface2 = graph.add(Node::Interface(Interface {
            symbols: [("a".to_string(), a2), ("b".to_string(), b2)]
                .into_iter()
                .collect(),
            types: Default::default(),
        }));
        let rendered = render(&graph, interface1, interface2, OutputFormat::Plain);
        assert!(rendered.contains("already reported"));
    }
}
