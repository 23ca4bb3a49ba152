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

//! Core types of the engine
//!
//! This module provides the value domain, tuple storage, and the two
//! interning services (symbols and records) shared by every other layer.

pub mod error;
pub mod record_table;
pub mod symbol_table;
pub mod tuple;
pub mod value;

pub use error::{Error, Result};
pub use record_table::RecordTable;
pub use symbol_table::SymbolTable;
pub use tuple::{tuple_from, tuple_of_arity, Tuple, INLINE_ARITY};
pub use value::{
    as_float, as_unsigned, from_float, from_unsigned, is_true, truth, RamDomain, RamFloat,
    RamSigned, RamUnsigned, BIT_SHIFT_MASK, MAX_SIGNED, MIN_SIGNED, NIL_RECORD,
};
