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

//! Record packing
//!
//! Heterogeneous tuples are packed into opaque nonzero record handles and
//! unpacked on demand. Handle 0 is the reserved nil reference. Distinct
//! tuples always receive distinct handles.

use dashmap::DashMap;
use parking_lot::RwLock;

use super::error::{Error, Result};
use super::tuple::{tuple_from, Tuple};
use super::value::{RamDomain, NIL_RECORD};

/// Concurrent tuple ↔ handle packing service.
pub struct RecordTable {
    ids: DashMap<Tuple, RamDomain>,
    records: RwLock<Vec<Tuple>>,
}

impl RecordTable {
    /// Create an empty record table.
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Pack a tuple, returning its nonzero handle.
    pub fn pack(&self, values: &[RamDomain]) -> RamDomain {
        if let Some(id) = self.ids.get(values) {
            return *id;
        }

        let key = tuple_from(values);
        *self
            .ids
            .entry(key.clone())
            .or_insert_with(|| {
                let mut records = self.records.write();
                records.push(key);
                // Handles start at 1; 0 is nil.
                records.len() as RamDomain
            })
            .value()
    }

    /// Unpack a handle back into its tuple.
    pub fn unpack(&self, handle: RamDomain, arity: usize) -> Result<Tuple> {
        if handle == NIL_RECORD {
            return Err(Error::UnknownRecord(handle));
        }
        let records = self.records.read();
        let record = handle
            .checked_sub(1)
            .and_then(|idx| usize::try_from(idx).ok())
            .and_then(|idx| records.get(idx))
            .ok_or(Error::UnknownRecord(handle))?;
        if record.len() != arity {
            return Err(Error::RecordArityMismatch {
                expected: record.len(),
                got: arity,
            });
        }
        Ok(record.clone())
    }

    /// Number of packed records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True if nothing has been packed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}
