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

//! Relation indexes
//!
//! An index is an ordered tuple set under a column permutation. Tuples are
//! stored pre-permuted (encoded) so that plain lexicographic ordering of
//! the backing B-tree realizes the index order; readers decode on access.
//! Range traversal additionally filters componentwise so `[lo, hi]` yields
//! exactly the tuples within bounds on every column.

use crate::core::{tuple_of_arity, Tuple};

use super::btree::BTree;

/// A column permutation of `[0..arity)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    columns: Vec<usize>,
}

impl Order {
    /// Create an order from a permutation.
    pub fn new(columns: Vec<usize>) -> Self {
        debug_assert!({
            let mut sorted = columns.clone();
            sorted.sort_unstable();
            sorted.iter().copied().eq(0..columns.len())
        });
        Order { columns }
    }

    /// The identity order of the given arity.
    pub fn identity(arity: usize) -> Self {
        Order {
            columns: (0..arity).collect(),
        }
    }

    /// The permutation as column positions.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Permute a tuple into index layout.
    pub fn encode(&self, tuple: &Tuple) -> Tuple {
        let mut out = tuple_of_arity(self.columns.len());
        for (i, &col) in self.columns.iter().enumerate() {
            out[i] = tuple[col];
        }
        out
    }

    /// Restore a tuple from index layout.
    pub fn decode(&self, encoded: &Tuple) -> Tuple {
        let mut out = tuple_of_arity(self.columns.len());
        for (i, &col) in self.columns.iter().enumerate() {
            out[col] = encoded[i];
        }
        out
    }
}

/// An ordered tuple set under one column order.
#[derive(Debug, Clone)]
pub struct Index {
    order: Order,
    tree: BTree<Tuple>,
}

impl Index {
    /// Create an empty index under the given order.
    pub fn new(order: Order) -> Self {
        Index {
            order,
            tree: BTree::new(),
        }
    }

    /// The column order of this index.
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// Number of tuples.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// True if the index holds no tuple.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Insert a tuple (original layout). Returns true if it was new.
    pub fn insert(&mut self, tuple: &Tuple) -> bool {
        self.tree.insert(self.order.encode(tuple))
    }

    /// Remove a tuple (original layout). Returns true if it was present.
    pub fn erase(&mut self, tuple: &Tuple) -> bool {
        self.tree.delete(&self.order.encode(tuple))
    }

    /// Full-tuple membership test.
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.tree.contains(&self.order.encode(tuple))
    }

    /// True if any tuple lies within `[lo, hi]` componentwise.
    pub fn contains_range(&self, lo: &Tuple, hi: &Tuple) -> bool {
        self.first_in_range(lo, hi).is_some()
    }

    /// The first in-order tuple within `[lo, hi]`, decoded.
    pub fn first_in_range(&self, lo: &Tuple, hi: &Tuple) -> Option<Tuple> {
        let enc_lo = self.order.encode(lo);
        let enc_hi = self.order.encode(hi);
        let mut found = None;
        self.tree.for_each_in_range(&enc_lo, &enc_hi, |key| {
            if within(key, &enc_lo, &enc_hi) {
                found = Some(self.order.decode(key));
                false
            } else {
                true
            }
        });
        found
    }

    /// Visit every tuple in index order (decoded), with early exit.
    pub fn scan<F>(&self, mut callback: F)
    where
        F: FnMut(&Tuple) -> bool,
    {
        self.tree.for_each(|key| callback(&self.order.decode(key)));
    }

    /// Visit the tuples within `[lo, hi]` componentwise, in index order,
    /// with early exit.
    pub fn range<F>(&self, lo: &Tuple, hi: &Tuple, mut callback: F)
    where
        F: FnMut(&Tuple) -> bool,
    {
        let enc_lo = self.order.encode(lo);
        let enc_hi = self.order.encode(hi);
        self.tree.for_each_in_range(&enc_lo, &enc_hi, |key| {
            if within(key, &enc_lo, &enc_hi) {
                callback(&self.order.decode(key))
            } else {
                true
            }
        });
    }

    /// Collect the full scan in index order.
    pub fn collect(&self) -> Vec<Tuple> {
        let mut out = Vec::with_capacity(self.len());
        self.scan(|t| {
            out.push(t.clone());
            true
        });
        out
    }

    /// Collect the tuples within `[lo, hi]` in index order.
    pub fn collect_range(&self, lo: &Tuple, hi: &Tuple) -> Vec<Tuple> {
        let mut out = Vec::new();
        self.range(lo, hi, |t| {
            out.push(t.clone());
            true
        });
        out
    }

    /// Drop every tuple.
    pub fn purge(&mut self) {
        self.tree.clear();
    }
}

/// Componentwise bounds check in encoded layout.
#[inline]
fn within(key: &Tuple, lo: &Tuple, hi: &Tuple) -> bool {
    key.iter()
        .zip(lo.iter().zip(hi.iter()))
        .all(|(k, (l, h))| l <= k && k <= h)
}

/// Split tuples into at most `target` contiguous chunks for parallel
/// workers. Chunks are disjoint and their union is the input.
pub fn partition(tuples: Vec<Tuple>, target: usize) -> Vec<Vec<Tuple>> {
    if tuples.is_empty() {
        return Vec::new();
    }
    let target = target.max(1);
    let chunk_size = tuples.len().div_ceil(target);
    let mut chunks = Vec::with_capacity(target);
    let mut rest = tuples;
    while rest.len() > chunk_size {
        let tail = rest.split_off(chunk_size);
        chunks.push(rest);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}
