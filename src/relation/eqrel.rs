// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Equivalence relations
//!
//! A binary relation closed under reflexivity, symmetry, and transitivity.
//! Inserting `(a, b)` unions the classes of `a` and `b`; the full pair set
//! is materialized into the relation's indexes lazily, before the next
//! read.

use rustc_hash::FxHashMap;

use crate::core::{tuple_from, RamDomain, Tuple};

/// Union-find over interned element slots with union by rank.
#[derive(Debug, Default)]
pub struct DisjointSet {
    slots: FxHashMap<RamDomain, usize>,
    values: Vec<RamDomain>,
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl DisjointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn slot(&mut self, value: RamDomain) -> usize {
        if let Some(&slot) = self.slots.get(&value) {
            return slot;
        }
        let slot = self.values.len();
        self.slots.insert(value, slot);
        self.values.push(value);
        self.parent.push(slot);
        self.rank.push(0);
        slot
    }

    fn root(&self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            slot = self.parent[slot];
        }
        slot
    }

    /// Union the classes of two values, interning them as needed.
    pub fn union(&mut self, a: RamDomain, b: RamDomain) {
        let sa = self.slot(a);
        let sb = self.slot(b);
        let ra = self.root(sa);
        let rb = self.root(sb);
        if ra == rb {
            return;
        }
        if self.rank[ra] < self.rank[rb] {
            self.parent[ra] = rb;
        } else if self.rank[ra] > self.rank[rb] {
            self.parent[rb] = ra;
        } else {
            self.parent[rb] = ra;
            self.rank[ra] += 1;
        }
    }

    /// True if both values are known and share a class.
    pub fn same_class(&self, a: RamDomain, b: RamDomain) -> bool {
        match (self.slots.get(&a), self.slots.get(&b)) {
            (Some(&sa), Some(&sb)) => self.root(sa) == self.root(sb),
            _ => false,
        }
    }

    /// Group every known value by its class root.
    pub fn classes(&self) -> Vec<Vec<RamDomain>> {
        let mut by_root: FxHashMap<usize, Vec<RamDomain>> = FxHashMap::default();
        for (slot, &value) in self.values.iter().enumerate() {
            by_root.entry(self.root(slot)).or_default().push(value);
        }
        by_root.into_values().collect()
    }

    /// Every closure pair, one class at a time. Reflexive pairs included.
    pub fn pairs(&self) -> Vec<Tuple> {
        let mut out = Vec::new();
        for class in self.classes() {
            for &a in &class {
                for &b in &class {
                    out.push(tuple_from(&[a, b]));
                }
            }
        }
        out
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.values.clear();
        self.parent.clear();
        self.rank.clear();
    }
}
