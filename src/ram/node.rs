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

//! RAM program trees
//!
//! Four node families: expressions yield a domain word, conditions yield a
//! truth value, operations are tuple-binding loops and actions nested
//! inside a query, statements form the control skeleton. The engine never
//! evaluates these trees directly; the generator lowers them to shadow
//! nodes with resolved relation ids and prepared search bounds first.

use rustc_hash::FxHashMap;

use crate::core::RamDomain;

use super::ops::{AggregateOp, ConstraintOp, FunctorOp, NestedOp, TypeAttribute};

/// Key-value directives of an `Io` statement.
pub type DirectiveMap = FxHashMap<String, String>;

/// An expression yielding a domain word.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    NumericConstant(RamDomain),
    /// Interned at generation time.
    StringConstant(String),
    /// An `Assign`ed variable.
    Variable(String),
    /// Element of a bound tuple register.
    TupleElement { tuple_id: usize, element: usize },
    /// The engine-wide monotonic counter.
    AutoIncrement,
    Intrinsic {
        op: FunctorOp,
        args: Vec<Expression>,
    },
    UserDefined {
        name: String,
        stateful: bool,
        arg_types: Vec<TypeAttribute>,
        return_type: TypeAttribute,
        args: Vec<Expression>,
    },
    PackRecord(Vec<Expression>),
    /// Positional argument of the running subroutine.
    SubroutineArgument(usize),
    /// Current size of a relation.
    RelationSize { relation: String },
}

impl Expression {
    /// Shorthand for a numeric constant.
    pub fn number(value: RamDomain) -> Self {
        Expression::NumericConstant(value)
    }

    /// Shorthand for a string constant.
    pub fn string(value: impl Into<String>) -> Self {
        Expression::StringConstant(value.into())
    }

    /// Shorthand for a tuple element reference.
    pub fn element(tuple_id: usize, element: usize) -> Self {
        Expression::TupleElement { tuple_id, element }
    }
}

/// A condition yielding a truth value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    True,
    False,
    Conjunction(Box<Condition>, Box<Condition>),
    Negation(Box<Condition>),
    Constraint {
        op: ConstraintOp,
        lhs: Expression,
        rhs: Expression,
    },
    EmptinessCheck { relation: String },
    /// Membership test against an index. `None` columns are unconstrained.
    ExistenceCheck {
        relation: String,
        index_pos: usize,
        pattern: Vec<Option<Expression>>,
    },
    /// Like `ExistenceCheck` on the data columns, but additionally requires
    /// the found tuple's derivation level (last column) to be ≤ `level`.
    ProvenanceExistenceCheck {
        relation: String,
        index_pos: usize,
        pattern: Vec<Option<Expression>>,
        level: Box<Expression>,
    },
}

impl Condition {
    /// Conjunction of two conditions.
    pub fn and(lhs: Condition, rhs: Condition) -> Self {
        Condition::Conjunction(Box::new(lhs), Box::new(rhs))
    }

    /// A binary constraint.
    pub fn constraint(op: ConstraintOp, lhs: Expression, rhs: Expression) -> Self {
        Condition::Constraint { op, lhs, rhs }
    }
}

/// The summary function of an aggregate loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    Intrinsic(AggregateOp),
    /// A registered stateful functor folded as `(acc, val) → acc`,
    /// starting from the `init` expression.
    UserDefined { name: String, init: Box<Expression> },
}

/// Inclusive per-column search bounds of an index operation.
///
/// `None` columns span the full domain. For equality patterns `lo` and
/// `hi` coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPattern {
    pub lo: Vec<Option<Expression>>,
    pub hi: Vec<Option<Expression>>,
}

impl SearchPattern {
    /// An equality pattern: both bounds are the same expressions.
    pub fn point(columns: Vec<Option<Expression>>) -> Self {
        SearchPattern {
            lo: columns.clone(),
            hi: columns,
        }
    }

    /// A pattern with distinct lower and upper bounds.
    pub fn bounds(lo: Vec<Option<Expression>>, hi: Vec<Option<Expression>>) -> Self {
        SearchPattern { lo, hi }
    }
}

/// A tuple-binding loop or action nested inside a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Scan {
        relation: String,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    ParallelScan {
        relation: String,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    IndexScan {
        relation: String,
        index_pos: usize,
        pattern: SearchPattern,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    ParallelIndexScan {
        relation: String,
        index_pos: usize,
        pattern: SearchPattern,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    /// Run the nested operation for the first tuple satisfying the
    /// condition, then stop.
    IfExists {
        relation: String,
        tuple_id: usize,
        condition: Condition,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    ParallelIfExists {
        relation: String,
        tuple_id: usize,
        condition: Condition,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    IndexIfExists {
        relation: String,
        index_pos: usize,
        pattern: SearchPattern,
        tuple_id: usize,
        condition: Condition,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    ParallelIndexIfExists {
        relation: String,
        index_pos: usize,
        pattern: SearchPattern,
        tuple_id: usize,
        condition: Condition,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    /// Unpack a record handle into a tuple register; nil skips the body.
    UnpackRecord {
        expr: Expression,
        arity: usize,
        tuple_id: usize,
        nested: Box<Operation>,
    },
    Aggregate {
        relation: String,
        aggregator: Aggregator,
        /// Target expression; `None` only for COUNT.
        expr: Option<Expression>,
        condition: Condition,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    ParallelAggregate {
        relation: String,
        aggregator: Aggregator,
        expr: Option<Expression>,
        condition: Condition,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    IndexAggregate {
        relation: String,
        index_pos: usize,
        pattern: SearchPattern,
        aggregator: Aggregator,
        expr: Option<Expression>,
        condition: Condition,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    ParallelIndexAggregate {
        relation: String,
        index_pos: usize,
        pattern: SearchPattern,
        aggregator: Aggregator,
        expr: Option<Expression>,
        condition: Condition,
        tuple_id: usize,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    /// A range generator binding each value to a 1-ary tuple register.
    NestedIntrinsic {
        op: NestedOp,
        args: Vec<Expression>,
        tuple_id: usize,
        nested: Box<Operation>,
    },
    Filter {
        condition: Condition,
        nested: Box<Operation>,
        profile_text: Option<String>,
    },
    /// Stop the enclosing tuple loop when the condition holds.
    Break {
        condition: Condition,
        nested: Box<Operation>,
    },
    GuardedInsert {
        relation: String,
        values: Vec<Expression>,
        condition: Condition,
    },
    Insert {
        relation: String,
        values: Vec<Expression>,
    },
    Erase {
        relation: String,
        values: Vec<Expression>,
    },
    /// Append values to the subroutine return vector; `None` slots yield 0.
    SubroutineReturn(Vec<Option<Expression>>),
}

/// A control statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Sequence(Vec<Statement>),
    /// Children are executed in declaration order on the current thread;
    /// data parallelism lives in the `Parallel*` tuple loops, not here.
    Parallel(Vec<Statement>),
    /// Execute the body until it signals termination via `Exit`.
    Loop(Box<Statement>),
    /// Stops the enclosing loop when the condition becomes true.
    Exit(Condition),
    Query(Operation),
    /// Invoke a named subroutine.
    Call(String),
    Io {
        directives: DirectiveMap,
        relation: String,
    },
    Clear(String),
    Swap(String, String),
    /// Union a source equivalence relation into the target and re-close.
    MergeExtend { source: String, target: String },
    LogSize {
        relation: String,
        message: String,
    },
    LogTimer {
        message: String,
        statement: Box<Statement>,
    },
    LogRelationTimer {
        message: String,
        relation: String,
        statement: Box<Statement>,
    },
    /// Names the active rule for crash diagnostics and verbose tracing.
    DebugInfo {
        message: String,
        statement: Box<Statement>,
    },
    /// Sample one index and report an estimated join size to the profiler.
    EstimateJoinSize {
        relation: String,
        index_pos: usize,
        key_columns: Vec<usize>,
        /// Column → constant expression (numeric or string constants only).
        constants: Vec<(usize, Expression)>,
        recursive: bool,
    },
    Assign {
        variable: String,
        value: Expression,
    },
}

impl Statement {
    /// Shorthand for a sequence.
    pub fn seq(statements: Vec<Statement>) -> Self {
        Statement::Sequence(statements)
    }

    /// Shorthand for a loop.
    pub fn repeat(body: Statement) -> Self {
        Statement::Loop(Box::new(body))
    }
}
