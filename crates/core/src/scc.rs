//! Strongly-connected component finder
//!
//! A path-based SCC finder shared by the fingerprint, equality, and diff
//! passes. The caller drives a depth-first traversal and brackets each node
//! visit with [`Scc::open`] and [`Scc::close`]:
//!
//! - `open` returns `None` if the node is already open (a back edge; the
//!   caller should return a tentative result) or a handle to pass to `close`.
//! - `close` returns the complete component if the node turned out to be its
//!   root, and an empty vector while the component is still open.
//!
//! Nodes must be closed in the reverse order they were opened.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct Scc<N: Clone + Eq + Hash> {
    open: Vec<N>,
    open_index: HashMap<N, usize>,
    roots: Vec<usize>,
}

impl<N: Clone + Eq + Hash> Default for Scc<N> {
    fn default() -> Self {
        Scc {
            open: Vec::new(),
            open_index: HashMap::new(),
            roots: Vec::new(),
        }
    }
}

impl<N: Clone + Eq + Hash> Scc<N> {
    pub fn new() -> Self {
        Scc::default()
    }

    /// True when no traversal is in progress.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.open_index.is_empty() && self.roots.is_empty()
    }

    /// Opens a node, returning a closing handle, or `None` if the node is
    /// already open. A back edge to an open node merges every candidate root
    /// opened after that node into its component.
    pub fn open(&mut self, node: &N) -> Option<usize> {
        if let Some(&ix) = self.open_index.get(node) {
            while let Some(&root) = self.roots.last() {
                if root <= ix {
                    break;
                }
                self.roots.pop();
            }
            return None;
        }
        let ix = self.open.len();
        self.open.push(node.clone());
        self.open_index.insert(node.clone(), ix);
        self.roots.push(ix);
        Some(ix)
    }

    /// Closes a node. If the node is still the root of its component, the
    /// component is complete: its nodes are returned and forgotten.
    pub fn close(&mut self, handle: usize) -> Vec<N> {
        if self.roots.last() != Some(&handle) {
            // Merged into an earlier root; the component is still open.
            return Vec::new();
        }
        self.roots.pop();
        let nodes: Vec<N> = self.open.drain(handle..).collect();
        for node in &nodes {
            self.open_index.remove(node);
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    // Nodes are [0, n); edge lists are the out-edges.
    type TestGraph = Vec<BTreeSet<usize>>;

    fn dfs(
        scc: &mut Scc<usize>,
        graph: &TestGraph,
        node: usize,
        visited: &mut BTreeSet<usize>,
        components: &mut Vec<BTreeSet<usize>>,
    ) {
        if visited.contains(&node) {
            return;
        }
        let Some(handle) = scc.open(&node) else {
            return;
        };
        for &next in &graph[node] {
            dfs(scc, graph, next, visited, components);
        }
        let nodes = scc.close(handle);
        if !nodes.is_empty() {
            let component: BTreeSet<usize> = nodes.into_iter().collect();
            for &n in &component {
                assert!(visited.insert(n));
            }
            components.push(component);
        }
    }

    fn find_components(graph: &TestGraph) -> Vec<BTreeSet<usize>> {
        let mut visited = BTreeSet::new();
        let mut components = Vec::new();
        for node in 0..graph.len() {
            let mut scc = Scc::new();
            dfs(&mut scc, graph, node, &mut visited, &mut components);
            assert!(scc.is_empty());
        }
        components
    }

    // Reference strong-connectivity relation via Floyd-Warshall closure:
    // i ~ j iff there is a path i -> j and a path j -> i.
    fn reference_components(graph: &TestGraph) -> BTreeSet<BTreeSet<usize>> {
        let n = graph.len();
        let mut reach = vec![vec![false; n]; n];
        for (i, row) in reach.iter_mut().enumerate() {
            row[i] = true;
            for &j in &graph[i] {
                row[j] = true;
            }
        }
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    if reach[i][k] && reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
        let mut components = BTreeSet::new();
        for i in 0..n {
            let component: BTreeSet<usize> =
                (0..n).filter(|&j| reach[i][j] && reach[j][i]).collect();
            components.insert(component);
        }
        components
    }

    fn check(graph: &TestGraph) {
        let components = find_components(graph);
        // partition property: every node in exactly one component
        let mut seen = BTreeSet::new();
        for component in &components {
            assert!(!component.is_empty());
            for &node in component {
                assert!(seen.insert(node), "node {node} in two components");
            }
            // topological property: edges point into this or earlier components
            for &node in component {
                for &next in &graph[node] {
                    assert!(seen.contains(&next));
                }
            }
        }
        assert_eq!(seen.len(), graph.len());
        // strong-connectivity property against the independent closure
        let actual: BTreeSet<BTreeSet<usize>> = components.into_iter().collect();
        assert_eq!(actual, reference_components(graph), "graph: {graph:?}");
    }

    fn graph_from_edges(n: usize, edges: &[(usize, usize)]) -> TestGraph {
        let mut graph = vec![BTreeSet::new(); n];
        for &(from, to) in edges {
            graph[from].insert(to);
        }
        graph
    }

    #[test]
    fn test_trivial_graphs() {
        check(&graph_from_edges(0, &[]));
        check(&graph_from_edges(1, &[]));
        check(&graph_from_edges(1, &[(0, 0)]));
    }

    #[test]
    fn test_chain_is_all_trivial() {
        let graph = graph_from_edges(4, &[(0, 1), (1, 2), (2, 3)]);
        let components = find_components(&graph);
        assert_eq!(components.len(), 4);
    }

    #[test]
    fn test_cycle_is_one_component() {
        let graph = graph_from_edges(3, &[(0, 1), (1, 2), (2, 0)]);
        let components = find_components(&graph);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
    }

    #[test]
    fn test_two_cycles_bridged() {
        // 0 <-> 1 -> 2 <-> 3
        let graph = graph_from_edges(4, &[(0, 1), (1, 0), (1, 2), (2, 3), (3, 2)]);
        check(&graph);
        assert_eq!(find_components(&graph).len(), 2);
    }

    #[test]
    fn test_exhaustive_small_graphs() {
        // All directed graphs of up to 3 nodes (including self loops).
        for n in 0..=3usize {
            let bits = n * n;
            for mask in 0..(1u32 << bits) {
                let mut graph = vec![BTreeSet::new(); n];
                for (bit, slot) in (0..bits).map(|b| (b, (b / n, b % n))) {
                    if mask & (1 << bit) != 0 {
                        graph[slot.0].insert(slot.1);
                    }
                }
                check(&graph);
            }
        }
    }

    #[test]
    fn test_pseudo_random_graphs() {
        // A spread of larger graphs from a fixed-seed xorshift generator.
        let mut state: u64 = 0x9e3779b97f4a7c15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        for _ in 0..200 {
            let n = 4 + (next() % 4) as usize;
            let mut graph = vec![BTreeSet::new(); n];
            for row in graph.iter_mut() {
                for j in 0..n {
                    if next() % 3 == 0 {
                        row.insert(j);
                    }
                }
            }
            check(&graph);
        }
    }
}
