//! Graph files
//!
//! A round-trippable encoding of a graph: the nodes reachable from the
//! root, renumbered densely in depth-first order, plus the root index. The
//! renumbering makes writes deterministic; node identity is not otherwise
//! stable across runs.
//!
//! Two encodings of the same document structure are provided, JSON for
//! inspectability and bincode for compact storage.

use crate::error::Error;
use crate::graph::{Graph, Id, Node};
use crate::substitution::{references, rewrite_node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use tracing::warn;

/// Bumped on any incompatible change to the node model.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    root: usize,
    nodes: Vec<Node>,
}

/// Flattens the subgraph reachable from `root` into a document with dense
/// depth-first ids.
fn flatten(graph: &Graph, root: Id) -> Result<Document, Error> {
    let mut index: HashMap<Id, usize> = HashMap::new();
    let mut order: Vec<Id> = Vec::new();
    let mut todo = vec![root];
    while let Some(id) = todo.pop() {
        if index.contains_key(&id) {
            continue;
        }
        if !graph.is_set(id) {
            warn!("dangling reference to {id}");
            return Err(Error::Input(format!("dangling reference to {id}")));
        }
        index.insert(id, order.len());
        order.push(id);
        // push in reverse so references are visited in field order
        let mut children = references(graph.get(id));
        children.reverse();
        todo.extend(children);
    }

    let nodes = order
        .iter()
        .map(|&id| {
            let mut node = graph.get(id).clone();
            rewrite_node(&mut node, &mut |id| Id(index[&id]));
            node
        })
        .collect();
    Ok(Document {
        version: FORMAT_VERSION,
        root: 0,
        nodes,
    })
}

/// Rebuilds a document into `graph`, returning the new root id.
fn rebuild(graph: &mut Graph, document: Document) -> Result<Id, Error> {
    if document.version != FORMAT_VERSION {
        return Err(Error::Format(format!(
            "unsupported format version {}",
            document.version
        )));
    }
    let limit = document.nodes.len();
    if document.root >= limit {
        return Err(Error::Format(format!(
            "root index {} out of range ({limit} nodes)",
            document.root
        )));
    }
    let ids: Vec<Id> = (0..limit).map(|_| graph.allocate()).collect();
    for (ix, mut node) in document.nodes.into_iter().enumerate() {
        for reference in references(&node) {
            if reference.0 >= limit {
                return Err(Error::Format(format!(
                    "node {ix} references {} outside the document ({limit} nodes)",
                    reference.0
                )));
            }
        }
        rewrite_node(&mut node, &mut |id| ids[id.0]);
        graph.set(ids[ix], node);
    }
    Ok(ids[document.root])
}

/// Writes the subgraph reachable from `root` as JSON.
pub fn write_json(graph: &Graph, root: Id, output: &mut dyn Write) -> Result<(), Error> {
    let document = flatten(graph, root)?;
    serde_json::to_writer(&mut *output, &document)
        .map_err(|error| Error::Format(error.to_string()))?;
    output.write_all(b"\n")?;
    Ok(())
}

/// Reads a JSON graph file into `graph` and returns its root.
pub fn read_json(graph: &mut Graph, input: &mut dyn Read) -> Result<Id, Error> {
    let document =
        serde_json::from_reader(input).map_err(|error| Error::Format(error.to_string()))?;
    rebuild(graph, document)
}

/// Writes the subgraph reachable from `root` in the binary encoding.
pub fn write_binary(graph: &Graph, root: Id, output: &mut dyn Write) -> Result<(), Error> {
    let document = flatten(graph, root)?;
    bincode::serialize_into(output, &document).map_err(|error| Error::Format(error.to_string()))
}

/// Reads a binary graph file into `graph` and returns its root.
pub fn read_binary(graph: &mut Graph, input: &mut dyn Read) -> Result<Id, Error> {
    let document =
        bincode::deserialize_from(input).map_err(|error| Error::Format(error.to_string()))?;
    rebuild(graph, document)
}
