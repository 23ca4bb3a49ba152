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

//! User-defined operator dispatch
//!
//! User functors are registered by name before the engine starts and
//! resolved once, at shadow-generation time; a missing name is fatal.
//! Two calling conventions exist, mirroring the RAM operator descriptor:
//! stateless functors receive native typed arguments decoded by the
//! engine, stateful functors receive raw domain words plus the symbol and
//! record tables. User-defined aggregates fold through a stateful functor
//! as `(acc, val) → acc`.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{
    as_float, as_unsigned, Error, RamDomain, RamFloat, RamUnsigned, RecordTable, Result,
    SymbolTable,
};

/// A typed argument of a stateless functor call.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctorArg<'a> {
    Signed(RamDomain),
    Unsigned(RamUnsigned),
    Float(RamFloat),
    Symbol(&'a str),
}

/// The typed result of a stateless functor call.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctorResult {
    Signed(RamDomain),
    Unsigned(RamUnsigned),
    Float(RamFloat),
    Symbol(String),
}

/// A functor called with native typed arguments.
pub trait StatelessFunctor: Send + Sync {
    fn call(&self, args: &[FunctorArg]) -> FunctorResult;
}

impl<F> StatelessFunctor for F
where
    F: Fn(&[FunctorArg]) -> FunctorResult + Send + Sync,
{
    fn call(&self, args: &[FunctorArg]) -> FunctorResult {
        self(args)
    }
}

/// A functor called with raw domain words and the interning services.
pub trait StatefulFunctor: Send + Sync {
    fn call(
        &self,
        symbols: &SymbolTable,
        records: &RecordTable,
        args: &[RamDomain],
    ) -> RamDomain;
}

impl<F> StatefulFunctor for F
where
    F: Fn(&SymbolTable, &RecordTable, &[RamDomain]) -> RamDomain + Send + Sync,
{
    fn call(
        &self,
        symbols: &SymbolTable,
        records: &RecordTable,
        args: &[RamDomain],
    ) -> RamDomain {
        self(symbols, records, args)
    }
}

/// A resolved functor handle carried by shadow nodes.
#[derive(Clone)]
pub enum FunctorHandle {
    Stateless(Arc<dyn StatelessFunctor>),
    Stateful(Arc<dyn StatefulFunctor>),
}

impl std::fmt::Debug for FunctorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctorHandle::Stateless(_) => f.write_str("FunctorHandle::Stateless(..)"),
            FunctorHandle::Stateful(_) => f.write_str("FunctorHandle::Stateful(..)"),
        }
    }
}

/// Name → functor map populated before engine construction.
#[derive(Default)]
pub struct FunctorRegistry {
    functors: FxHashMap<String, FunctorHandle>,
}

impl FunctorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stateless functor under a name.
    pub fn register_stateless(
        &mut self,
        name: impl Into<String>,
        functor: impl StatelessFunctor + 'static,
    ) {
        self.functors
            .insert(name.into(), FunctorHandle::Stateless(Arc::new(functor)));
    }

    /// Register a stateful functor under a name.
    pub fn register_stateful(
        &mut self,
        name: impl Into<String>,
        functor: impl StatefulFunctor + 'static,
    ) {
        self.functors
            .insert(name.into(), FunctorHandle::Stateful(Arc::new(functor)));
    }

    /// Resolve a name. Missing functors are fatal.
    pub fn resolve(&self, name: &str) -> Result<FunctorHandle> {
        self.functors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownFunctor(name.to_string()))
    }

    /// Resolve a name, requiring the stateful convention.
    pub fn resolve_stateful(&self, name: &str) -> Result<Arc<dyn StatefulFunctor>> {
        match self.resolve(name)? {
            FunctorHandle::Stateful(f) => Ok(f),
            FunctorHandle::Stateless(_) => Err(Error::type_error(format!(
                "functor '{name}' must be stateful"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.functors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functors.is_empty()
    }
}

/// Decode the untyped accumulator/value convention used by intrinsic call
/// sites: a float argument arrives bit-cast in the word.
#[inline]
pub fn arg_as_float(value: RamDomain) -> RamFloat {
    as_float(value)
}

/// See [`arg_as_float`].
#[inline]
pub fn arg_as_unsigned(value: RamDomain) -> RamUnsigned {
    as_unsigned(value)
}
