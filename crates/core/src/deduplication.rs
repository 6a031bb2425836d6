//! Deduplication
//!
//! Collapses structurally identical subgraphs into a single representative.
//! Fingerprints partition the candidate nodes; the equality pass is the
//! oracle that confirms or refutes each merge, so deduplication never
//! invents an equality. At worst nodes are left un-deduplicated.

use crate::equality::{Equals, HashingEqualityCache};
use crate::graph::{Graph, Id};
use crate::metrics::Metrics;
use crate::substitution::substitute;
use std::collections::HashMap;

/// Deduplicates every fingerprinted node, rewrites the graph, and returns
/// the (possibly remapped) root id.
pub fn deduplicate(
    graph: &mut Graph,
    root: Id,
    hashes: &HashMap<Id, u32>,
    metrics: &mut Metrics,
) -> Id {
    // Sort candidates by id so bucket heads, and therefore the surviving
    // representatives, do not depend on hash map iteration order.
    let mut candidates: Vec<Id> = hashes.keys().copied().collect();
    candidates.sort_by_key(|id| id.0);

    // Partition the nodes by fingerprint.
    let mut partitions: HashMap<u32, Vec<Id>> = HashMap::new();
    for &id in &candidates {
        partitions.entry(hashes[&id]).or_default().push(id);
    }
    metrics.count("deduplicate.nodes", candidates.len() as u64);
    metrics.count("deduplicate.partitions", partitions.len() as u64);
    metrics.histogram(
        "deduplicate.partition_size",
        partitions.values().map(|ids| ids.len() as u64),
    );

    // Refine partitions of nodes with equal fingerprints; the greedy
    // clustering compares every node against the head of its bucket.
    let mut equalities = 0;
    let mut inequalities = 0;
    let mut equals = Equals::new(&*graph, HashingEqualityCache::new(hashes));
    metrics.timed("deduplicate.comparison", |_| {
        for ids in partitions.values() {
            let mut ids = ids.clone();
            while ids.len() > 1 {
                let candidate = ids[0];
                let mut todo = Vec::new();
                for &id in &ids[1..] {
                    if equals.eq(id, candidate) {
                        equalities += 1;
                    } else {
                        todo.push(id);
                        inequalities += 1;
                    }
                }
                ids = todo;
            }
        }
    });
    metrics.count("deduplicate.equalities", equalities);
    metrics.count("deduplicate.inequalities", inequalities);

    // Keep one representative of each set of duplicates.
    let mut cache = equals.cache;
    let mut duplicate = 0;
    let mut unique = 0;
    metrics.timed("deduplicate.rewrite", |_| {
        for &id in &candidates {
            if cache.find(id) != id {
                graph.remove(id);
                duplicate += 1;
            } else {
                substitute(graph, id, &mut |id| cache.find(id));
                unique += 1;
            }
        }
    });
    metrics.count("deduplicate.duplicate", duplicate);
    metrics.count("deduplicate.unique", unique);

    // In case the root node was remapped.
    cache.find(root)
}
