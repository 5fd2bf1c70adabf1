//! Union-Find (disjoint set) over arbitrary hashable ids.
//!
//! Roots are always the smallest member of their set, so group keys do not
//! depend on insertion or hash-map iteration order.

use std::collections::HashMap;
use std::hash::Hash;

/// Disjoint-set forest with path compression.
#[derive(Debug, Clone, Default)]
pub struct UnionFind<T> {
    parent: HashMap<T, T>,
}

impl<T> UnionFind<T>
where
    T: Clone + Eq + Hash + Ord,
{
    /// Create an empty structure.
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
        }
    }

    /// Create an empty structure with room for `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: HashMap::with_capacity(capacity),
        }
    }

    /// Add `id` as its own singleton set. No-op if already present.
    pub fn make_set(&mut self, id: T) {
        self.parent.entry(id.clone()).or_insert(id);
    }

    /// Number of tracked ids.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of the set containing `id`. Unknown ids are their own root.
    pub fn find(&mut self, id: &T) -> T {
        let mut root = id.clone();
        while let Some(parent) = self.parent.get(&root) {
            if *parent == root {
                break;
            }
            root = parent.clone();
        }

        // Path compression
        let mut current = id.clone();
        while current != root {
            match self.parent.insert(current.clone(), root.clone()) {
                Some(next) => current = next,
                None => break,
            }
        }

        root
    }

    /// Merge the sets containing `a` and `b`.
    pub fn union(&mut self, a: &T, b: &T) {
        self.make_set(a.clone());
        self.make_set(b.clone());
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        if root_a < root_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_a, root_b);
        }
    }

    /// Whether `a` and `b` are in the same set.
    pub fn connected(&mut self, a: &T, b: &T) -> bool {
        self.find(a) == self.find(b)
    }

    /// All sets keyed by root, with members sorted ascending.
    pub fn groups(&mut self) -> HashMap<T, Vec<T>> {
        let ids: Vec<T> = self.parent.keys().cloned().collect();
        let mut groups: HashMap<T, Vec<T>> = HashMap::new();
        for id in ids {
            let root = self.find(&id);
            groups.entry(root).or_default().push(id);
        }
        for members in groups.values_mut() {
            members.sort();
        }
        groups
    }
}
