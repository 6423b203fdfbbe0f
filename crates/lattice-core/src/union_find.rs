//! Disjoint-set (Union-Find) data structure over opaque string keys.
//!
//! Keys are the storage layer's entity primary keys, so the structure is
//! keyed by `String` rather than dense indices. Uses path compression on
//! `find` and union by rank, with a deterministic tie-break so that
//! repeated runs over the same input produce identical components.

use std::collections::HashMap;

/// Union-Find over string keys with path compression and union by rank.
#[derive(Debug, Default)]
pub struct UnionFind {
    parent: HashMap<String, String>,
    rank: HashMap<String, u32>,
}

impl UnionFind {
    pub fn new() -> Self {
        UnionFind::default()
    }

    /// Registers `key` as a singleton set. Idempotent.
    pub fn insert(&mut self, key: &str) {
        if !self.parent.contains_key(key) {
            self.parent.insert(key.to_owned(), key.to_owned());
            self.rank.insert(key.to_owned(), 0);
        }
    }

    /// Returns the representative of the set containing `key`, or `None`
    /// if `key` was never inserted. Compresses the walked path.
    pub fn find(&mut self, key: &str) -> Option<String> {
        self.parent.get(key)?;

        // Walk to the root.
        let mut root = key.to_owned();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }

        // Second pass: point every node on the path directly at the root.
        let mut cur = key.to_owned();
        while self.parent[&cur] != root {
            let next = self.parent[&cur].clone();
            self.parent.insert(cur, root.clone());
            cur = next;
        }

        Some(root)
    }

    /// Merges the sets containing `a` and `b`, inserting either key if it
    /// is not yet known. On equal rank the root of `a` becomes the parent.
    pub fn union(&mut self, a: &str, b: &str) {
        self.insert(a);
        self.insert(b);
        let ra = self.find(a).expect("a was just inserted");
        let rb = self.find(b).expect("b was just inserted");
        if ra == rb {
            return;
        }

        let rank_a = self.rank[&ra];
        let rank_b = self.rank[&rb];
        if rank_a < rank_b {
            self.parent.insert(ra, rb);
        } else if rank_a > rank_b {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(rb, ra.clone());
            self.rank.insert(ra, rank_a + 1);
        }
    }

    /// Returns all disjoint sets in canonical order: members sorted
    /// ascending within each set, sets sorted by size ascending and then
    /// by lexicographic comparison of their sorted members. Singleton
    /// keys appear as size-1 components.
    pub fn components(&mut self) -> Vec<Vec<String>> {
        let mut keys: Vec<String> = self.parent.keys().cloned().collect();
        keys.sort();

        let mut by_root: HashMap<String, Vec<String>> = HashMap::new();
        for key in keys {
            let root = self.find(&key).expect("key is a member");
            by_root.entry(root).or_default().push(key);
        }

        let mut components: Vec<Vec<String>> = by_root.into_values().collect();
        // Members are already sorted because keys were visited in order.
        components.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        components
    }
}
