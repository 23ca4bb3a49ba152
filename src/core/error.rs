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

//! Error types for the engine
//!
//! Only the fatal tier of failures is represented here; internal control
//! signals travel as falsy domain values and recoverable conditions are
//! reported as stderr warnings with a benign result.

use thiserror::Error;

use super::value::RamDomain;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal evaluation errors
///
/// Every variant terminates the current execution when it reaches the
/// caller of `execute_main` / `execute_subroutine`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Relation errors
    // =========================================================================
    /// Relation name is not declared in the program
    #[error("relation '{0}' not found")]
    RelationNotFound(String),

    /// Relation id is outside the relation map
    #[error("relation id {0} out of range")]
    RelationIdOutOfRange(usize),

    /// Relation was declared twice
    #[error("relation '{0}' already declared")]
    DuplicateRelation(String),

    /// Tuple arity does not match the relation declaration
    #[error("relation '{relation}' expects arity {expected}, got {got}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        got: usize,
    },

    /// Operation requires a representation the relation does not have
    #[error("relation '{relation}' does not support {operation}")]
    UnsupportedRelationOperation {
        relation: String,
        operation: &'static str,
    },

    // =========================================================================
    // Value errors
    // =========================================================================
    /// Symbol handle has no interned string
    #[error("unknown symbol handle {0}")]
    UnknownSymbol(RamDomain),

    /// Record handle has no packed tuple
    #[error("unknown record handle {0}")]
    UnknownRecord(RamDomain),

    /// Record was unpacked at the wrong arity
    #[error("record arity mismatch, expected {expected}, got {got}")]
    RecordArityMismatch { expected: usize, got: usize },

    /// Operator applied to an unsupported type combination
    #[error("type error: {0}")]
    Type(String),

    // =========================================================================
    // Functor errors
    // =========================================================================
    /// User-defined operator name is not registered
    #[error("cannot find user-defined operator '{0}'")]
    UnknownFunctor(String),

    /// Functor invoked with the wrong argument count
    #[error("functor '{name}' expects {expected} arguments, got {got}")]
    FunctorArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    // =========================================================================
    // Program errors
    // =========================================================================
    /// Subroutine name is not part of the program
    #[error("subroutine '{0}' not found")]
    SubroutineNotFound(String),

    /// Directive map is missing a required key
    #[error("missing directive '{0}'")]
    MissingDirective(String),

    /// No IO provider is registered for the directive
    #[error("no IO provider registered for '{0}'")]
    UnknownIoProvider(String),

    // =========================================================================
    // Other errors
    // =========================================================================
    /// Failure while loading or draining a relation
    #[error("error processing {relation} data: {message}")]
    RelationIo { relation: String, message: String },

    /// Malformed input row
    #[error("parse error: {0}")]
    Parse(String),

    /// IO error (wrapped)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new ArityMismatch error
    pub fn arity_mismatch(relation: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ArityMismatch {
            relation: relation.into(),
            expected,
            got,
        }
    }

    /// Create a new Type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }

    /// Create a new RelationIo error
    pub fn relation_io(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RelationIo {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Create a new Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Create a new IO error
    pub fn io(message: impl Into<String>) -> Self {
        Error::Io {
            message: message.into(),
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::RelationNotFound(_)
                | Error::RelationIdOutOfRange(_)
                | Error::UnknownFunctor(_)
                | Error::SubroutineNotFound(_)
                | Error::UnknownIoProvider(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
        }
    }
}
