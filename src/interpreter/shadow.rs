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

//! Shadow IR
//!
//! The executable mirror of a RAM program. Where the RAM tree names
//! relations and carries raw constants, shadow nodes carry resolved
//! relation ids, view slot numbers, pre-interned symbols, prepared
//! search-bound templates, resolved functor handles, and precompiled
//! regexes. The RAM tree stays immutable; generation happens once per
//! engine.

use std::sync::Arc;

use regex::Regex;

use crate::core::{RamDomain, Tuple};
use crate::ram::{ConstraintOp, DirectiveMap, FunctorOp, NestedOp, TypeAttribute};

use super::functors::{FunctorHandle, StatefulFunctor};

/// An equality column filled from a tuple register.
#[derive(Debug, Clone)]
pub struct TupleSource {
    pub column: usize,
    pub tuple_id: usize,
    pub element: usize,
}

/// Prepared search-bound template of an index operation or insert.
///
/// `lo`/`hi` hold the generation-time constants, with unconstrained
/// columns already spanning the full domain. The source lists overwrite
/// individual columns at evaluation time: `tuple_both`/`expr_both` set the
/// same value on both bounds (equality columns), `expr_lo`/`expr_hi` set
/// one bound each.
#[derive(Clone, Default)]
pub struct SuperInstruction {
    pub arity: usize,
    pub lo: Tuple,
    pub hi: Tuple,
    pub tuple_both: Vec<TupleSource>,
    pub expr_both: Vec<(usize, ShadowNode)>,
    pub expr_lo: Vec<(usize, ShadowNode)>,
    pub expr_hi: Vec<(usize, ShadowNode)>,
}

/// A view demanded by a query: which relation, which index, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewInfo {
    pub rel_id: usize,
    pub index_pos: usize,
    pub slot: usize,
}

/// The view staging plan of one query.
///
/// Outer-filter conditions that need no view run first; if any fails the
/// whole query is a no-op and no view is ever created. Only then are the
/// outer views staged and the view-backed filter conditions evaluated;
/// the nested views are staged last — by the query itself when the body
/// is sequential, by each worker when it is parallel.
#[derive(Clone, Default)]
pub struct ViewContext {
    pub outer_free_ops: Vec<ShadowNode>,
    pub outer_views: Vec<ViewInfo>,
    pub outer_view_ops: Vec<ShadowNode>,
    pub nested_views: Vec<ViewInfo>,
    pub is_parallel: bool,
}

/// The aggregator of a shadow aggregate node.
#[derive(Clone)]
pub enum ShadowAggregator {
    Intrinsic(crate::ram::AggregateOp),
    UserDefined {
        functor: Arc<dyn StatefulFunctor>,
        init: Box<ShadowNode>,
    },
}

/// An executable node.
///
/// One tree covers all four RAM families; `Engine::execute` dispatches on
/// the variant and returns a domain word whose truthiness doubles as the
/// internal control signal.
#[derive(Clone)]
pub enum ShadowNode {
    // =========================================================================
    // Expressions
    // =========================================================================
    NumericConstant(RamDomain),
    /// Interned at generation time.
    StringConstant(RamDomain),
    Variable(String),
    TupleElement {
        tuple_id: usize,
        element: usize,
    },
    AutoIncrement,
    Intrinsic {
        op: FunctorOp,
        args: Vec<ShadowNode>,
    },
    UserDefined {
        name: String,
        handle: FunctorHandle,
        arg_types: Vec<TypeAttribute>,
        return_type: TypeAttribute,
        args: Vec<ShadowNode>,
    },
    PackRecord(Vec<ShadowNode>),
    SubroutineArgument(usize),
    RelationSize {
        rel_id: usize,
    },

    // =========================================================================
    // Conditions
    // =========================================================================
    True,
    False,
    Conjunction(Box<ShadowNode>, Box<ShadowNode>),
    Negation(Box<ShadowNode>),
    Constraint {
        op: ConstraintOp,
        lhs: Box<ShadowNode>,
        rhs: Box<ShadowNode>,
        /// Compiled at generation time when the pattern is constant.
        regex: Option<Arc<Regex>>,
    },
    EmptinessCheck {
        rel_id: usize,
    },
    ExistenceCheck {
        rel_id: usize,
        relation_name: String,
        /// Temporary (seminaive) relations are excluded from read counts.
        is_temp: bool,
        view_slot: usize,
        /// All columns fixed: a point lookup instead of a range probe.
        total: bool,
        superinst: SuperInstruction,
    },
    ProvenanceExistenceCheck {
        view_slot: usize,
        superinst: SuperInstruction,
        level: Box<ShadowNode>,
    },

    // =========================================================================
    // Tuple operations
    // =========================================================================
    Scan {
        rel_id: usize,
        tuple_id: usize,
        nested: Box<ShadowNode>,
    },
    ParallelScan {
        rel_id: usize,
        tuple_id: usize,
        nested: Box<ShadowNode>,
        view_ctxt: Arc<ViewContext>,
    },
    IndexScan {
        view_slot: usize,
        tuple_id: usize,
        superinst: SuperInstruction,
        nested: Box<ShadowNode>,
    },
    ParallelIndexScan {
        rel_id: usize,
        index_pos: usize,
        tuple_id: usize,
        superinst: SuperInstruction,
        nested: Box<ShadowNode>,
        view_ctxt: Arc<ViewContext>,
    },
    IfExists {
        rel_id: usize,
        tuple_id: usize,
        condition: Box<ShadowNode>,
        nested: Box<ShadowNode>,
    },
    ParallelIfExists {
        rel_id: usize,
        tuple_id: usize,
        condition: Box<ShadowNode>,
        nested: Box<ShadowNode>,
        view_ctxt: Arc<ViewContext>,
    },
    IndexIfExists {
        view_slot: usize,
        tuple_id: usize,
        superinst: SuperInstruction,
        condition: Box<ShadowNode>,
        nested: Box<ShadowNode>,
    },
    ParallelIndexIfExists {
        rel_id: usize,
        index_pos: usize,
        tuple_id: usize,
        superinst: SuperInstruction,
        condition: Box<ShadowNode>,
        nested: Box<ShadowNode>,
        view_ctxt: Arc<ViewContext>,
    },
    UnpackRecord {
        expr: Box<ShadowNode>,
        arity: usize,
        tuple_id: usize,
        nested: Box<ShadowNode>,
    },
    Aggregate {
        rel_id: usize,
        aggregator: ShadowAggregator,
        expr: Option<Box<ShadowNode>>,
        condition: Box<ShadowNode>,
        tuple_id: usize,
        nested: Box<ShadowNode>,
    },
    ParallelAggregate {
        rel_id: usize,
        aggregator: ShadowAggregator,
        expr: Option<Box<ShadowNode>>,
        condition: Box<ShadowNode>,
        tuple_id: usize,
        nested: Box<ShadowNode>,
        view_ctxt: Arc<ViewContext>,
    },
    IndexAggregate {
        view_slot: usize,
        superinst: SuperInstruction,
        aggregator: ShadowAggregator,
        expr: Option<Box<ShadowNode>>,
        condition: Box<ShadowNode>,
        tuple_id: usize,
        nested: Box<ShadowNode>,
    },
    ParallelIndexAggregate {
        view_slot: usize,
        superinst: SuperInstruction,
        aggregator: ShadowAggregator,
        expr: Option<Box<ShadowNode>>,
        condition: Box<ShadowNode>,
        tuple_id: usize,
        nested: Box<ShadowNode>,
        view_ctxt: Arc<ViewContext>,
    },
    NestedIntrinsic {
        op: NestedOp,
        args: Vec<ShadowNode>,
        tuple_id: usize,
        nested: Box<ShadowNode>,
    },
    Filter {
        condition: Box<ShadowNode>,
        nested: Box<ShadowNode>,
    },
    Break {
        condition: Box<ShadowNode>,
        nested: Box<ShadowNode>,
    },
    /// Counts one rule firing per loop iteration around its child.
    Frequency {
        key: String,
        nested: Box<ShadowNode>,
    },
    GuardedInsert {
        rel_id: usize,
        superinst: SuperInstruction,
        condition: Box<ShadowNode>,
    },
    Insert {
        rel_id: usize,
        superinst: SuperInstruction,
    },
    Erase {
        rel_id: usize,
        superinst: SuperInstruction,
    },
    SubroutineReturn(Vec<Option<ShadowNode>>),

    // =========================================================================
    // Statements
    // =========================================================================
    Sequence(Vec<ShadowNode>),
    /// Children run serially; parallelism lives in the tuple loops.
    Parallel(Vec<ShadowNode>),
    Loop(Box<ShadowNode>),
    Exit(Box<ShadowNode>),
    Query {
        view_ctxt: Arc<ViewContext>,
        nested: Box<ShadowNode>,
    },
    Call(String),
    Io {
        directives: DirectiveMap,
        rel_id: usize,
    },
    Clear {
        rel_id: usize,
    },
    Swap {
        rel1: usize,
        rel2: usize,
    },
    MergeExtend {
        source: usize,
        target: usize,
    },
    LogSize {
        rel_id: usize,
        message: String,
    },
    LogTimer {
        message: String,
        nested: Box<ShadowNode>,
    },
    LogRelationTimer {
        message: String,
        rel_id: usize,
        nested: Box<ShadowNode>,
    },
    DebugInfo {
        message: String,
        nested: Box<ShadowNode>,
    },
    EstimateJoinSize {
        rel_id: usize,
        index_pos: usize,
        key_columns: Vec<usize>,
        constants: Vec<(usize, RamDomain)>,
        /// Rendered constants map for the profile key.
        constants_text: String,
        recursive: bool,
    },
    Assign {
        variable: String,
        value: Box<ShadowNode>,
    },
}

impl SuperInstruction {
    /// A template with every column unconstrained within `[lo_fill, hi_fill]`.
    pub fn unconstrained(arity: usize, lo_fill: RamDomain, hi_fill: RamDomain) -> Self {
        let mut lo = Tuple::new();
        lo.resize(arity, lo_fill);
        let mut hi = Tuple::new();
        hi.resize(arity, hi_fill);
        SuperInstruction {
            arity,
            lo,
            hi,
            tuple_both: Vec::new(),
            expr_both: Vec::new(),
            expr_lo: Vec::new(),
            expr_hi: Vec::new(),
        }
    }

    /// True if no column needs per-evaluation work.
    pub fn is_static(&self) -> bool {
        self.tuple_both.is_empty()
            && self.expr_both.is_empty()
            && self.expr_lo.is_empty()
            && self.expr_hi.is_empty()
    }
}
