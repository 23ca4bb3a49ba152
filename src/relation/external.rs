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

//! External adapter relations
//!
//! A shadow relation answers reads from an out-of-process source. The
//! source is authoritative: the engine's own inserts are silently dropped,
//! and the internal index is populated exactly once, on first access.

use std::sync::Arc;

use crate::core::{Result, Tuple};

use super::index::Order;
use super::{BTreeStorage, RelationStorage};

/// An authoritative out-of-process tuple source.
pub trait ExternalSource: Send + Sync {
    /// Produce every tuple of the relation.
    fn fetch(&self) -> Result<Vec<Tuple>>;
}

/// A source with no tuples, used when no source is registered for a
/// declared shadow relation.
pub struct EmptySource;

impl ExternalSource for EmptySource {
    fn fetch(&self) -> Result<Vec<Tuple>> {
        Ok(Vec::new())
    }
}

/// Storage for a shadow relation: a lazily populated b-tree plus the
/// loaded-once flag.
pub struct ExternalStorage {
    inner: BTreeStorage,
    source: Arc<dyn ExternalSource>,
    loaded: bool,
}

impl ExternalStorage {
    pub fn new(orders: Vec<Order>, source: Arc<dyn ExternalSource>) -> Self {
        ExternalStorage {
            inner: BTreeStorage::new(orders),
            source,
            loaded: false,
        }
    }
}

impl RelationStorage for ExternalStorage {
    fn insert(&mut self, _tuple: &Tuple) -> bool {
        // The source is authoritative.
        false
    }

    fn contains(&self, index_pos: usize, tuple: &Tuple) -> bool {
        self.inner.contains(index_pos, tuple)
    }

    fn contains_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> bool {
        self.inner.contains_range(index_pos, lo, hi)
    }

    fn first_in_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Option<Tuple> {
        self.inner.first_in_range(index_pos, lo, hi)
    }

    fn collect(&self) -> Vec<Tuple> {
        self.inner.collect()
    }

    fn collect_range(&self, index_pos: usize, lo: &Tuple, hi: &Tuple) -> Vec<Tuple> {
        self.inner.collect_range(index_pos, lo, hi)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn purge(&mut self) {
        self.inner.purge();
    }

    fn index_count(&self) -> usize {
        self.inner.index_count()
    }

    fn index_order(&self, index_pos: usize) -> &Order {
        self.inner.index_order(index_pos)
    }

    fn needs_prepare(&self) -> bool {
        !self.loaded
    }

    fn prepare(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        for tuple in self.source.fetch()? {
            self.inner.insert(&tuple);
        }
        self.loaded = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tuple_from;

    struct FixedSource(Vec<Tuple>);

    impl ExternalSource for FixedSource {
        fn fetch(&self) -> Result<Vec<Tuple>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_lazy_population() {
        let source = Arc::new(FixedSource(vec![tuple_from(&[1, 2]), tuple_from(&[3, 4])]));
        let mut storage = ExternalStorage::new(vec![Order::identity(2)], source);

        assert!(storage.needs_prepare());
        assert_eq!(storage.len(), 0);

        storage.prepare().unwrap();
        assert!(!storage.needs_prepare());
        assert_eq!(storage.len(), 2);
        assert!(storage.contains(0, &tuple_from(&[1, 2])));
    }

    #[test]
    fn test_inserts_ignored() {
        let source = Arc::new(FixedSource(vec![tuple_from(&[1, 2])]));
        let mut storage = ExternalStorage::new(vec![Order::identity(2)], source);
        storage.prepare().unwrap();

        assert!(!storage.insert(&tuple_from(&[9, 9])));
        assert_eq!(storage.len(), 1);
        assert!(!storage.contains(0, &tuple_from(&[9, 9])));
    }

    #[test]
    fn test_prepare_runs_once() {
        let source = Arc::new(FixedSource(vec![tuple_from(&[5, 6])]));
        let mut storage = ExternalStorage::new(vec![Order::identity(2)], source);
        storage.prepare().unwrap();
        storage.prepare().unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_empty_source() {
        let mut storage = ExternalStorage::new(vec![Order::identity(2)], Arc::new(EmptySource));
        storage.prepare().unwrap();
        assert_eq!(storage.len(), 0);
    }
}
