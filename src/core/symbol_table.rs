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

//! Concurrent string interning
//!
//! Symbols are interned to dense domain handles that are stable for the
//! lifetime of the table. `encode` may be called from any worker thread;
//! the handle vector is append-only.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::error::{Error, Result};
use super::value::RamDomain;

/// Bidirectional string ↔ handle interning service.
pub struct SymbolTable {
    ids: DashMap<Arc<str>, RamDomain>,
    symbols: RwLock<Vec<Arc<str>>>,
}

impl SymbolTable {
    /// Create an empty symbol table.
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            symbols: RwLock::new(Vec::new()),
        }
    }

    /// Intern a string, returning its handle.
    ///
    /// The same string always returns the same handle within a run.
    pub fn encode(&self, symbol: &str) -> RamDomain {
        if let Some(id) = self.ids.get(symbol) {
            return *id;
        }

        let key: Arc<str> = Arc::from(symbol);
        *self
            .ids
            .entry(key.clone())
            .or_insert_with(|| {
                let mut symbols = self.symbols.write();
                symbols.push(key.clone());
                (symbols.len() - 1) as RamDomain
            })
            .value()
    }

    /// Resolve a handle back to its string.
    pub fn decode(&self, handle: RamDomain) -> Result<Arc<str>> {
        let symbols = self.symbols.read();
        usize::try_from(handle)
            .ok()
            .and_then(|idx| symbols.get(idx).cloned())
            .ok_or(Error::UnknownSymbol(handle))
    }

    /// Check whether a string is already interned, without interning it.
    pub fn weak_contains(&self, symbol: &str) -> bool {
        self.ids.contains_key(symbol)
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// True if no symbol has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let table = SymbolTable::new();
        let id = table.encode("hello");
        assert_eq!(&*table.decode(id).unwrap(), "hello");
    }

    #[test]
    fn test_encode_is_stable() {
        let table = SymbolTable::new();
        let a = table.encode("x");
        let b = table.encode("y");
        assert_ne!(a, b);
        assert_eq!(table.encode("x"), a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_weak_contains() {
        let table = SymbolTable::new();
        assert!(!table.weak_contains("a"));
        table.encode("a");
        assert!(table.weak_contains("a"));
        assert!(!table.weak_contains("b"));
    }

    #[test]
    fn test_decode_unknown_handle() {
        let table = SymbolTable::new();
        assert_eq!(table.decode(42), Err(Error::UnknownSymbol(42)));
        assert_eq!(table.decode(-1), Err(Error::UnknownSymbol(-1)));
    }

    #[test]
    fn test_concurrent_encode() {
        let table = Arc::new(SymbolTable::new());
        let mut handles = Vec::new();
        for t in 0..4 {
            let table = Arc::clone(&table);
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..100 {
                    ids.push(table.encode(&format!("sym{}", (i + t) % 50)));
                }
                ids
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        // 50 distinct strings regardless of interleaving.
        assert_eq!(table.len(), 50);
        for i in 0..50 {
            let s = format!("sym{}", i);
            let id = table.encode(&s);
            assert_eq!(&*table.decode(id).unwrap(), s.as_str());
        }
    }
}
