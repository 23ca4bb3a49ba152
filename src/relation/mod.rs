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

//! Relation storage layer
//!
//! A relation is a named, arity-typed tuple set carrying one index per
//! selected column order. The representation kinds differ in mutation
//! support (erase), maintained closure (eqrel), trailing provenance
//! columns, and external population; all of them answer the same narrow
//! read surface. Storage sits behind a per-relation `RwLock`: reads take
//! the shared lock, mutations the exclusive one. Every index of a relation
//! holds the same tuple set.

pub mod btree;
pub mod eqrel;
pub mod external;
pub mod index;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{Error, Result, Tuple};
use crate::ram::{ColumnOrder, RelationDecl, Representation};

pub use btree::BTree;
pub use eqrel::DisjointSet;
pub use external::{EmptySource, ExternalSource, ExternalStorage};
pub use index::{partition, Index, Order};

/// Representation tag of a constructed relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    BTree,
    BTreeDelete,
    Eqrel,
    Provenance,
    External,
}

/// The polymorphic storage surface shared by every representation.
pub trait RelationStorage: Send + Sync {
    /// Insert a tuple into every index. Returns true if it was new.
    fn insert(&mut self, tuple: &Tuple) -> bool;

    /// Remove a tuple from every index. Only the delete-capable
    /// representation overrides this.
    fn erase(&mut self, _tuple: &Tuple) -> bool {
        false
    }

    /// Full-tuple membership under one index.
    fn contains(&self, index_pos: usize, tuple: &Tuple) -> bool;

    /// True if any tuple lies within `[lo, hi]` componentwise.
    fn contains_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> bool;

    /// First in-order tuple within `[lo, hi]`, if any.
    fn first_in_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Option<Tuple>;

    /// The full tuple set in the order of index 0.
    fn collect(&self) -> Vec<Tuple>;

    /// The tuples within `[lo, hi]` in the order of the given index.
    fn collect_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Vec<Tuple>;

    /// Number of tuples.
    fn len(&self) -> usize;

    /// True if no tuple is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tuple.
    fn purge(&mut self);

    /// Number of indexes.
    fn index_count(&self) -> usize;

    /// Column order of one index.
    fn index_order(&self, index_pos: usize) -> &Order;

    /// True if the storage must be prepared before the next read
    /// (external load, eqrel materialization).
    fn needs_prepare(&self) -> bool {
        false
    }

    /// One-shot preparation before reads.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Plain b-tree storage: one tree per selected order.
pub struct BTreeStorage {
    indexes: Vec<Index>,
}

impl BTreeStorage {
    pub fn new(orders: Vec<Order>) -> Self {
        debug_assert!(!orders.is_empty());
        BTreeStorage {
            indexes: orders.into_iter().map(Index::new).collect(),
        }
    }
}

impl RelationStorage for BTreeStorage {
    fn insert(&mut self, tuple: &Tuple) -> bool {
        let (first, rest) = self.indexes.split_first_mut().expect("relation without indexes");
        let inserted = first.insert(tuple);
        if inserted {
            for index in rest {
                index.insert(tuple);
            }
        }
        inserted
    }

    fn erase(&mut self, tuple: &Tuple) -> bool {
        let (first, rest) = self.indexes.split_first_mut().expect("relation without indexes");
        let erased = first.erase(tuple);
        if erased {
            for index in rest {
                index.erase(tuple);
            }
        }
        erased
    }

    fn contains(&self, index_pos: usize, tuple: &Tuple) -> bool {
        self.indexes[index_pos].contains(tuple)
    }

    fn contains_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> bool {
        self.indexes[index_pos].contains_range(lo, hi)
    }

    fn first_in_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Option<Tuple> {
        self.indexes[index_pos].first_in_range(lo, hi)
    }

    fn collect(&self) -> Vec<Tuple> {
        self.indexes[0].collect()
    }

    fn collect_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Vec<Tuple> {
        self.indexes[index_pos].collect_range(lo, hi)
    }

    fn len(&self) -> usize {
        self.indexes[0].len()
    }

    fn purge(&mut self) {
        for index in &mut self.indexes {
            index.purge();
        }
    }

    fn index_count(&self) -> usize {
        self.indexes.len()
    }

    fn index_order(&self, index_pos: usize) -> &Order {
        self.indexes[index_pos].order()
    }
}

/// Equivalence relation storage: a union-find plus indexes materialized
/// from the closure before each read.
pub struct EqrelStorage {
    set: DisjointSet,
    indexes: Vec<Index>,
    dirty: bool,
}

impl EqrelStorage {
    pub fn new(orders: Vec<Order>) -> Self {
        debug_assert!(!orders.is_empty());
        EqrelStorage {
            set: DisjointSet::new(),
            indexes: orders.into_iter().map(Index::new).collect(),
            dirty: false,
        }
    }
}

impl RelationStorage for EqrelStorage {
    fn insert(&mut self, tuple: &Tuple) -> bool {
        debug_assert_eq!(tuple.len(), 2);
        let known = self.set.same_class(tuple[0], tuple[1]);
        if !known {
            self.set.union(tuple[0], tuple[1]);
            self.dirty = true;
        }
        !known
    }

    fn contains(&self, _index_pos: usize, tuple: &Tuple) -> bool {
        self.set.same_class(tuple[0], tuple[1])
    }

    fn contains_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> bool {
        self.indexes[index_pos].contains_range(lo, hi)
    }

    fn first_in_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Option<Tuple> {
        self.indexes[index_pos].first_in_range(lo, hi)
    }

    fn collect(&self) -> Vec<Tuple> {
        self.indexes[0].collect()
    }

    fn collect_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Vec<Tuple> {
        self.indexes[index_pos].collect_range(lo, hi)
    }

    fn len(&self) -> usize {
        self.indexes[0].len()
    }

    fn purge(&mut self) {
        self.set.clear();
        for index in &mut self.indexes {
            index.purge();
        }
        self.dirty = false;
    }

    fn index_count(&self) -> usize {
        self.indexes.len()
    }

    fn index_order(&self, index_pos: usize) -> &Order {
        self.indexes[index_pos].order()
    }

    fn needs_prepare(&self) -> bool {
        self.dirty
    }

    fn prepare(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        for index in &mut self.indexes {
            index.purge();
        }
        for pair in self.set.pairs() {
            for index in &mut self.indexes {
                index.insert(&pair);
            }
        }
        self.dirty = false;
        Ok(())
    }
}

/// A named, typed relation with locked storage.
pub struct Relation {
    name: String,
    arity: usize,
    aux_arity: usize,
    kind: RelationKind,
    storage: RwLock<Box<dyn RelationStorage>>,
}

impl Relation {
    /// Construct a relation from its declaration and selected orders.
    ///
    /// Shadow declarations take their tuples from `source`; a declared
    /// shadow with no registered source reads as empty.
    pub fn create(
        decl: &RelationDecl,
        orders: Vec<ColumnOrder>,
        source: Option<Arc<dyn ExternalSource>>,
    ) -> Result<Relation> {
        let orders: Vec<Order> = orders.into_iter().map(Order::new).collect();
        debug_assert!(orders.iter().all(|o| o.arity() == decl.arity));

        let (kind, aux_arity, storage): (RelationKind, usize, Box<dyn RelationStorage>) =
            if decl.shadow {
                let source = source.unwrap_or_else(|| Arc::new(EmptySource));
                (
                    RelationKind::External,
                    decl.aux_arity,
                    Box::new(ExternalStorage::new(orders, source)),
                )
            } else if decl.is_provenance() {
                (
                    RelationKind::Provenance,
                    2,
                    Box::new(BTreeStorage::new(orders)),
                )
            } else {
                match decl.representation {
                    Representation::Eqrel => {
                        if decl.arity != 2 {
                            return Err(Error::internal(format!(
                                "equivalence relation '{}' must be binary",
                                decl.name
                            )));
                        }
                        (
                            RelationKind::Eqrel,
                            decl.aux_arity,
                            Box::new(EqrelStorage::new(orders)),
                        )
                    }
                    Representation::BTreeDelete => (
                        RelationKind::BTreeDelete,
                        decl.aux_arity,
                        Box::new(BTreeStorage::new(orders)),
                    ),
                    Representation::BTree => (
                        RelationKind::BTree,
                        decl.aux_arity,
                        Box::new(BTreeStorage::new(orders)),
                    ),
                }
            };

        Ok(Relation {
            name: decl.name.clone(),
            arity: decl.arity,
            aux_arity,
            kind,
            storage: RwLock::new(storage),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn aux_arity(&self) -> usize {
        self.aux_arity
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn index_count(&self) -> usize {
        self.storage.read().index_count()
    }

    /// The column order of one index.
    pub fn index_order(&self, index_pos: usize) -> Order {
        self.storage.read().index_order(index_pos).clone()
    }

    fn ensure_prepared(&self) -> Result<()> {
        if self.storage.read().needs_prepare() {
            self.storage.write().prepare()?;
        }
        Ok(())
    }

    /// Insert a tuple. Shadow relations drop the request.
    pub fn insert(&self, tuple: &Tuple) -> Result<bool> {
        if tuple.len() != self.arity {
            return Err(Error::arity_mismatch(&self.name, self.arity, tuple.len()));
        }
        Ok(self.storage.write().insert(tuple))
    }

    /// Erase a tuple. Supported by the delete representation only.
    pub fn erase(&self, tuple: &Tuple) -> Result<bool> {
        if self.kind != RelationKind::BTreeDelete {
            return Err(Error::UnsupportedRelationOperation {
                relation: self.name.clone(),
                operation: "erase",
            });
        }
        Ok(self.storage.write().erase(tuple))
    }

    pub fn contains(&self, index_pos: usize, tuple: &Tuple) -> Result<bool> {
        self.ensure_prepared()?;
        Ok(self.storage.read().contains(index_pos, tuple))
    }

    pub fn contains_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Result<bool> {
        self.ensure_prepared()?;
        Ok(self.storage.read().contains_range(index_pos, lo, hi))
    }

    pub fn first_in_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Result<Option<Tuple>> {
        self.ensure_prepared()?;
        Ok(self.storage.read().first_in_range(index_pos, lo, hi))
    }

    /// The full tuple set in the order of index 0.
    pub fn collect(&self) -> Result<Vec<Tuple>> {
        self.ensure_prepared()?;
        Ok(self.storage.read().collect())
    }

    /// The tuples within `[lo, hi]` in the order of the given index.
    pub fn collect_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Result<Vec<Tuple>> {
        self.ensure_prepared()?;
        Ok(self.storage.read().collect_range(index_pos, lo, hi))
    }

    /// Split the full scan into at most `chunks` disjoint sub-sequences
    /// whose union is the scan. The parallelism unit of `Parallel*` loops.
    pub fn partition_scan(&self, chunks: usize) -> Result<Vec<Vec<Tuple>>> {
        Ok(partition(self.collect()?, chunks))
    }

    /// Split a range query into at most `chunks` disjoint sub-sequences.
    pub fn partition_range(
        &self,
        index_pos: usize,
        lo: &Tuple,
        hi: &Tuple,
        chunks: usize,
    ) -> Result<Vec<Vec<Tuple>>> {
        Ok(partition(self.collect_range(index_pos, lo, hi)?, chunks))
    }

    pub fn len(&self) -> Result<usize> {
        self.ensure_prepared()?;
        Ok(self.storage.read().len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every tuple.
    pub fn purge(&self) {
        self.storage.write().purge();
    }

    /// Exchange storage with another relation of the same shape.
    pub fn swap_contents(&self, other: &Relation) {
        if std::ptr::eq(self, other) {
            return;
        }
        debug_assert_eq!(self.arity, other.arity);
        let mut a = self.storage.write();
        let mut b = other.storage.write();
        std::mem::swap(&mut *a, &mut *b);
    }
}

/// A per-thread cursor over one index of one relation.
#[derive(Clone)]
pub struct IndexView {
    relation: Arc<Relation>,
    index_pos: usize,
}

impl IndexView {
    pub fn new(relation: Arc<Relation>, index_pos: usize) -> Self {
        IndexView {
            relation,
            index_pos,
        }
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn contains(&self, tuple: &Tuple) -> Result<bool> {
        self.relation.contains(self.index_pos, tuple)
    }

    pub fn contains_range(&self, lo: &Tuple, hi: &Tuple) -> Result<bool> {
        self.relation.contains_range(self.index_pos, lo, hi)
    }

    pub fn first_in_range(&self, lo: &Tuple, hi: &Tuple) -> Result<Option<Tuple>> {
        self.relation.first_in_range(self.index_pos, lo, hi)
    }

    pub fn collect_range(&self, lo: &Tuple, hi: &Tuple) -> Result<Vec<Tuple>> {
        self.relation.collect_range(self.index_pos, lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tuple_from;
    use crate::core::{MAX_SIGNED, MIN_SIGNED};

    fn btree_relation(name: &str, arity: usize) -> Relation {
        Relation::create(
            &RelationDecl::btree(name, arity),
            vec![(0..arity).collect()],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_contains() {
        let rel = btree_relation("edge", 2);
        assert!(rel.insert(&tuple_from(&[1, 2])).unwrap());
        assert!(!rel.insert(&tuple_from(&[1, 2])).unwrap());
        assert!(rel.contains(0, &tuple_from(&[1, 2])).unwrap());
        assert_eq!(rel.len().unwrap(), 1);
    }

    #[test]
    fn test_arity_checked() {
        let rel = btree_relation("edge", 2);
        assert!(matches!(
            rel.insert(&tuple_from(&[1])),
            Err(Error::ArityMismatch { .. })
        ));
    }

    #[test]
    fn test_index_coherence() {
        let decl = RelationDecl::btree("r", 2);
        let rel = Relation::create(&decl, vec![vec![0, 1], vec![1, 0]], None).unwrap();
        for (a, b) in [(1, 9), (2, 3), (3, 5)] {
            rel.insert(&tuple_from(&[a, b])).unwrap();
        }

        let mut by_first = rel.collect().unwrap();
        let mut by_second = rel
            .collect_range(
                1,
                &tuple_from(&[MIN_SIGNED, MIN_SIGNED]),
                &tuple_from(&[MAX_SIGNED, MAX_SIGNED]),
            )
            .unwrap();
        assert_eq!(by_second[0], tuple_from(&[2, 3]));
        by_first.sort();
        by_second.sort();
        assert_eq!(by_first, by_second);
    }

    #[test]
    fn test_erase_requires_delete_representation() {
        let rel = btree_relation("r", 1);
        assert!(matches!(
            rel.erase(&tuple_from(&[1])),
            Err(Error::UnsupportedRelationOperation { .. })
        ));

        let rel = Relation::create(&RelationDecl::btree_delete("d", 1), vec![vec![0]], None).unwrap();
        rel.insert(&tuple_from(&[1])).unwrap();
        assert!(rel.erase(&tuple_from(&[1])).unwrap());
        assert!(!rel.erase(&tuple_from(&[1])).unwrap());
        assert!(rel.is_empty().unwrap());
    }

    #[test]
    fn test_swap_contents() {
        let a = btree_relation("a", 1);
        let b = btree_relation("b", 1);
        a.insert(&tuple_from(&[1])).unwrap();
        b.insert(&tuple_from(&[2])).unwrap();
        b.insert(&tuple_from(&[3])).unwrap();

        a.swap_contents(&b);
        assert_eq!(a.len().unwrap(), 2);
        assert_eq!(b.len().unwrap(), 1);
        assert!(b.contains(0, &tuple_from(&[1])).unwrap());

        // Swapping twice restores the original state.
        a.swap_contents(&b);
        assert_eq!(a.len().unwrap(), 1);
        assert!(a.contains(0, &tuple_from(&[1])).unwrap());
    }

    #[test]
    fn test_eqrel_closure() {
        let rel = Relation::create(&RelationDecl::eqrel("eq"), vec![vec![0, 1]], None).unwrap();
        rel.insert(&tuple_from(&[1, 2])).unwrap();
        rel.insert(&tuple_from(&[2, 3])).unwrap();

        assert!(rel.contains(0, &tuple_from(&[3, 1])).unwrap());
        assert!(rel.contains(0, &tuple_from(&[2, 2])).unwrap());
        assert_eq!(rel.len().unwrap(), 9);
    }

    #[test]
    fn test_shadow_relation_reads_from_source() {
        struct TwoTuples;
        impl ExternalSource for TwoTuples {
            fn fetch(&self) -> Result<Vec<Tuple>> {
                Ok(vec![tuple_from(&[1, 2]), tuple_from(&[3, 4])])
            }
        }

        let decl = RelationDecl::btree("ext", 2).as_shadow();
        let rel = Relation::create(&decl, vec![vec![0, 1]], Some(Arc::new(TwoTuples))).unwrap();
        assert_eq!(rel.kind(), RelationKind::External);

        // Engine inserts are dropped; content comes from the source.
        rel.insert(&tuple_from(&[9, 9])).unwrap();
        assert_eq!(rel.len().unwrap(), 2);
        assert!(rel.contains(0, &tuple_from(&[3, 4])).unwrap());
        assert!(!rel.contains(0, &tuple_from(&[9, 9])).unwrap());
    }

    #[test]
    fn test_shadow_without_source_is_empty() {
        let decl = RelationDecl::btree("ext", 2).as_shadow();
        let rel = Relation::create(&decl, vec![vec![0, 1]], None).unwrap();
        assert!(rel.is_empty().unwrap());
    }

    #[test]
    fn test_view_surface() {
        let rel = Arc::new(btree_relation("r", 2));
        for (a, b) in [(1, 2), (1, 4), (2, 2)] {
            rel.insert(&tuple_from(&[a, b])).unwrap();
        }
        let view = IndexView::new(Arc::clone(&rel), 0);

        assert!(view.contains(&tuple_from(&[1, 4])).unwrap());
        let lo = tuple_from(&[1, MIN_SIGNED]);
        let hi = tuple_from(&[1, MAX_SIGNED]);
        assert!(view.contains_range(&lo, &hi).unwrap());
        assert_eq!(view.collect_range(&lo, &hi).unwrap().len(), 2);
        assert_eq!(
            view.first_in_range(&lo, &hi).unwrap().unwrap(),
            tuple_from(&[1, 2])
        );
    }
}
