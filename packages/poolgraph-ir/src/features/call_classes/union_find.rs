//! Disjoint-set forest over function identities
//!
//! Path compression plus union by rank, keyed directly by `FuncId` rather
//! than dense indices: the functions entering classes are a sparse subset
//! of the module.

use rustc_hash::FxHashMap;

use crate::shared::models::FuncId;

/// Union-Find over functions reachable through indirect calls
#[derive(Debug, Default, Clone)]
pub struct FuncUnionFind {
    parent: FxHashMap<FuncId, FuncId>,
    rank: FxHashMap<FuncId, u8>,
    class_count: usize,
}

impl FuncUnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure `f` is present as (at least) a singleton class
    pub fn make_set(&mut self, f: FuncId) {
        if !self.parent.contains_key(&f) {
            self.parent.insert(f, f);
            self.rank.insert(f, 0);
            self.class_count += 1;
        }
    }

    #[inline]
    pub fn contains(&self, f: FuncId) -> bool {
        self.parent.contains_key(&f)
    }

    fn find_root(&mut self, f: FuncId) -> FuncId {
        let p = self.parent[&f];
        if p == f {
            return f;
        }
        let root = self.find_root(p);
        self.parent.insert(f, root);
        root
    }

    /// Class representative of `f`, `None` when `f` was never a candidate
    /// of any indirect call
    pub fn find(&mut self, f: FuncId) -> Option<FuncId> {
        if !self.contains(f) {
            return None;
        }
        Some(self.find_root(f))
    }

    /// Union the classes of `a` and `b`, returning the new representative
    pub fn union(&mut self, a: FuncId, b: FuncId) -> FuncId {
        self.make_set(a);
        self.make_set(b);
        let ra = self.find_root(a);
        let rb = self.find_root(b);
        if ra == rb {
            return ra;
        }
        let (low, high) = if self.rank[&ra] < self.rank[&rb] { (ra, rb) } else { (rb, ra) };
        self.parent.insert(low, high);
        if self.rank[&ra] == self.rank[&rb] {
            if let Some(rank) = self.rank.get_mut(&high) {
                *rank += 1;
            }
        }
        self.class_count -= 1;
        high
    }

    pub fn same_class(&mut self, a: FuncId, b: FuncId) -> bool {
        self.contains(a) && self.contains(b) && self.find_root(a) == self.find_root(b)
    }

    /// Number of disjoint classes
    #[inline]
    pub fn count(&self) -> usize {
        self.class_count
    }

    /// Every member of the class containing `f`, in id order
    pub fn members(&mut self, f: FuncId) -> Vec<FuncId> {
        let Some(rep) = self.find(f) else { return Vec::new() };
        let keys: Vec<FuncId> = self.parent.keys().copied().collect();
        let mut out: Vec<FuncId> =
            keys.into_iter().filter(|&k| self.find_root(k) == rep).collect();
        out.sort();
        out
    }
}
