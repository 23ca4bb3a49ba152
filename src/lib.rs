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

//! # Ramble - Bottom-up Datalog evaluation engine
//!
//! Ramble is a tree-walking interpreter for lowered relational algebra
//! (RAM) programs: the back half of a Datalog system. A front-end hands it
//! a [`ram::Program`]; the engine creates the indexed relations, lowers
//! the program into a pre-resolved shadow tree, and evaluates it to
//! fixpoint, producing derived tuples and serving queries.
//!
//! ## Key pieces
//!
//! - **Untyped value domain** - one 64-bit word, reinterpreted per
//!   operator as signed, unsigned, float, or symbol handle
//! - **Indexed relations** - B-tree indexes under column permutations,
//!   with erase-capable, equivalence, provenance, and external-adapter
//!   representations
//! - **Shadow IR** - RAM nodes pre-resolved to relation ids, view slots,
//!   search-bound templates, functor handles, and compiled regexes
//! - **Seminaive fixpoint** - loop/exit driving delta/new relation swaps,
//!   with an iteration counter feeding the profiler
//! - **Partition-parallel loops** - `Parallel*` tuple loops fan chunked
//!   scans across a rayon pool; workers clone their evaluation context
//! - **User functors** - named stateless/stateful operators registered
//!   before the run and resolved at generation time
//!
//! ## Quick start
//!
//! ```rust
//! use ramble::ram::{Expression, Operation, Program, RelationDecl, Statement};
//! use ramble::{Engine, EngineConfig};
//!
//! // path(x, y) :- edge(x, y).
//! let program = Program::new(
//!     vec![RelationDecl::btree("edge", 2), RelationDecl::btree("path", 2)],
//!     Statement::seq(vec![Statement::Query(Operation::Scan {
//!         relation: "edge".to_string(),
//!         tuple_id: 0,
//!         nested: Box::new(Operation::Insert {
//!             relation: "path".to_string(),
//!             values: vec![Expression::element(0, 0), Expression::element(0, 1)],
//!         }),
//!         profile_text: None,
//!     })]),
//! );
//!
//! let engine = Engine::new(program, EngineConfig::default()).unwrap();
//! engine.relation("edge").unwrap().insert(&ramble::tuple_from(&[1, 2])).unwrap();
//! engine.execute_main().unwrap();
//! assert_eq!(engine.relation("path").unwrap().len().unwrap(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`core`] - value domain, tuples, errors, symbol and record tables
//! - [`ram`] - the RAM program trees consumed by the engine
//! - [`relation`] - B-tree indexes and relation representations
//! - [`interpreter`] - shadow IR, generator, and the engine
//! - [`io`] - directive-keyed readers and writers
//! - [`profile`] - profile sink and frequency counters

pub mod config;
pub mod core;
pub mod interpreter;
pub mod io;
pub mod profile;
pub mod ram;
pub mod relation;

// Re-export the main types for convenience
pub use config::EngineConfig;
pub use core::{
    tuple_from, tuple_of_arity, Error, RamDomain, RamFloat, RamSigned, RamUnsigned, RecordTable,
    Result, SymbolTable, Tuple,
};
pub use interpreter::{
    Engine, EngineBuilder, FunctorArg, FunctorRegistry, FunctorResult, StatefulFunctor,
    StatelessFunctor,
};
pub use io::{IoProvider, IoRegistry, TupleReader, TupleWriter};
pub use profile::{ProfileEvent, ProfileSink};
pub use relation::{ExternalSource, IndexView, Relation, RelationKind};
