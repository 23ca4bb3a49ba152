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

//! The relational algebra intermediate language
//!
//! The front-end lowers Datalog into this IR; the engine consumes it
//! read-only. See [`node`] for the tree families and [`program`] for the
//! program container.

pub mod node;
pub mod ops;
pub mod program;

pub use node::{
    Aggregator, Condition, DirectiveMap, Expression, Operation, SearchPattern, Statement,
};
pub use ops::{AggregateOp, ConstraintOp, FunctorOp, NestedOp, TypeAttribute};
pub use program::{
    ColumnOrder, IndexSelection, Program, RelationDecl, Representation, LEVEL_ATTRIBUTE,
};
