//! Connected-components pass over an edge list.
//!
//! Edges are directed in storage but connectivity is direction-agnostic,
//! so the adjacency list is built with both orientations. The DFS walk
//! unions every visited neighbor pair into a [`UnionFind`], with a visited
//! set so each node is expanded once.

use std::collections::{HashMap, HashSet};

use crate::union_find::UnionFind;

/// Computes the connected components of the undirected graph induced by
/// `edges` over `nodes`.
///
/// Nodes that appear in no edge form singleton components. Components are
/// returned in the canonical [`UnionFind::components`] order: size
/// ascending, ties broken by lexicographic member comparison.
pub fn connected_components(nodes: &[String], edges: &[(String, String)]) -> Vec<Vec<String>> {
    let mut uf = UnionFind::new();
    for node in nodes {
        uf.insert(node);
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        adjacency.entry(from).or_default().push(to);
        adjacency.entry(to).or_default().push(from);
    }

    let mut visited: HashSet<&str> = HashSet::new();
    for node in nodes {
        if visited.contains(node.as_str()) {
            continue;
        }
        visited.insert(node);

        let mut stack: Vec<&str> = vec![node];
        while let Some(current) = stack.pop() {
            let Some(neighbors) = adjacency.get(current) else {
                continue;
            };
            for &neighbor in neighbors {
                uf.union(current, neighbor);
                if visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
    }

    uf.components()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn no_edges_yields_singletons() {
        let comps = connected_components(&nodes(&["c", "a", "b"]), &[]);
        assert_eq!(
            comps,
            vec![
                vec!["a".to_owned()],
                vec!["b".to_owned()],
                vec!["c".to_owned()],
            ]
        );
    }

    #[test]
    fn direction_is_ignored() {
        // a -> b and c -> b connect all three despite edge orientation.
        let comps = connected_components(
            &nodes(&["a", "b", "c"]),
            &edges(&[("a", "b"), ("c", "b")]),
        );
        assert_eq!(
            comps,
            vec![vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]]
        );
    }

    #[test]
    fn line_topology_splits_at_missing_middle_edge() {
        // a - b   c - d - e
        let comps = connected_components(
            &nodes(&["a", "b", "c", "d", "e"]),
            &edges(&[("a", "b"), ("c", "d"), ("d", "e")]),
        );
        assert_eq!(
            comps,
            vec![
                vec!["a".to_owned(), "b".to_owned()],
                vec!["c".to_owned(), "d".to_owned(), "e".to_owned()],
            ]
        );
    }

    #[test]
    fn cycle_is_one_component() {
        let comps = connected_components(
            &nodes(&["a", "b", "c"]),
            &edges(&[("a", "b"), ("b", "c"), ("c", "a")]),
        );
        assert_eq!(
            comps,
            vec![vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]]
        );
    }

    #[test]
    fn equal_size_components_sort_lexicographically() {
        let comps = connected_components(
            &nodes(&["x", "y", "a", "b"]),
            &edges(&[("x", "y"), ("a", "b")]),
        );
        assert_eq!(
            comps,
            vec![
                vec!["a".to_owned(), "b".to_owned()],
                vec!["x".to_owned(), "y".to_owned()],
            ]
        );
    }
}
