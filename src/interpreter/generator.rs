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

//! Shadow generation
//!
//! Lowers RAM statements to shadow trees: relation names become ids,
//! string constants are interned, constant regex patterns compile, user
//! functor names resolve against the registry, index operations receive
//! prepared search-bound templates, and every query gets its view staging
//! plan. Generation is the only place view slots are assigned; at runtime
//! views are written into fixed slots with no allocation on the hot path.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{Error, RamDomain, Result, SymbolTable, MAX_SIGNED, MIN_SIGNED};
use crate::ram::{
    Aggregator, Condition, ConstraintOp, Expression, Operation, SearchPattern, Statement,
};

use super::functors::FunctorRegistry;
use super::regex_cache::compile_full_match;
use super::shadow::{
    ShadowAggregator, ShadowNode, SuperInstruction, TupleSource, ViewContext, ViewInfo,
};

/// Statement lowering context.
pub struct Generator<'a> {
    rel_ids: &'a FxHashMap<String, usize>,
    functors: &'a FunctorRegistry,
    symbols: &'a SymbolTable,
    /// Wrap profiled tuple operations with frequency counters.
    freq_enabled: bool,
}

/// Per-query view slot allocation.
#[derive(Default)]
struct QueryCtx {
    next_slot: usize,
    outer_views: Vec<ViewInfo>,
    nested_views: Vec<ViewInfo>,
    in_outer: bool,
}

impl QueryCtx {
    fn alloc_view(&mut self, rel_id: usize, index_pos: usize) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        let info = ViewInfo {
            rel_id,
            index_pos,
            slot,
        };
        if self.in_outer {
            self.outer_views.push(info);
        } else {
            self.nested_views.push(info);
        }
        slot
    }
}

impl<'a> Generator<'a> {
    pub fn new(
        rel_ids: &'a FxHashMap<String, usize>,
        functors: &'a FunctorRegistry,
        symbols: &'a SymbolTable,
        freq_enabled: bool,
    ) -> Self {
        Generator {
            rel_ids,
            functors,
            symbols,
            freq_enabled,
        }
    }

    fn rel_id(&self, name: &str) -> Result<usize> {
        self.rel_ids
            .get(name)
            .copied()
            .ok_or_else(|| Error::RelationNotFound(name.to_string()))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn generate(&self, statement: &Statement) -> Result<ShadowNode> {
        Ok(match statement {
            Statement::Sequence(children) => ShadowNode::Sequence(
                children
                    .iter()
                    .map(|c| self.generate(c))
                    .collect::<Result<_>>()?,
            ),
            Statement::Parallel(children) => ShadowNode::Parallel(
                children
                    .iter()
                    .map(|c| self.generate(c))
                    .collect::<Result<_>>()?,
            ),
            Statement::Loop(body) => ShadowNode::Loop(Box::new(self.generate(body)?)),
            Statement::Exit(condition) => {
                // Exit conditions run outside any query scope; emptiness
                // and constraint checks only, nothing that needs a view.
                let mut qc = QueryCtx::default();
                let node = self.gen_condition(condition, &mut qc)?;
                if qc.next_slot != 0 {
                    return Err(Error::internal(
                        "exit condition may not use index views".to_string(),
                    ));
                }
                ShadowNode::Exit(Box::new(node))
            }
            Statement::Query(operation) => self.gen_query(operation)?,
            Statement::Call(name) => ShadowNode::Call(name.clone()),
            Statement::Io {
                directives,
                relation,
            } => ShadowNode::Io {
                directives: directives.clone(),
                rel_id: self.rel_id(relation)?,
            },
            Statement::Clear(relation) => ShadowNode::Clear {
                rel_id: self.rel_id(relation)?,
            },
            Statement::Swap(rel1, rel2) => ShadowNode::Swap {
                rel1: self.rel_id(rel1)?,
                rel2: self.rel_id(rel2)?,
            },
            Statement::MergeExtend { source, target } => ShadowNode::MergeExtend {
                source: self.rel_id(source)?,
                target: self.rel_id(target)?,
            },
            Statement::LogSize { relation, message } => ShadowNode::LogSize {
                rel_id: self.rel_id(relation)?,
                message: message.clone(),
            },
            Statement::LogTimer { message, statement } => ShadowNode::LogTimer {
                message: message.clone(),
                nested: Box::new(self.generate(statement)?),
            },
            Statement::LogRelationTimer {
                message,
                relation,
                statement,
            } => ShadowNode::LogRelationTimer {
                message: message.clone(),
                rel_id: self.rel_id(relation)?,
                nested: Box::new(self.generate(statement)?),
            },
            Statement::DebugInfo { message, statement } => ShadowNode::DebugInfo {
                message: message.clone(),
                nested: Box::new(self.generate(statement)?),
            },
            Statement::EstimateJoinSize {
                relation,
                index_pos,
                key_columns,
                constants,
                recursive,
            } => {
                let mut resolved = Vec::with_capacity(constants.len());
                let mut rendered: Vec<String> = Vec::with_capacity(constants.len());
                for (column, expr) in constants {
                    let value = match expr {
                        Expression::NumericConstant(v) => {
                            rendered.push(format!("{column}->{v}"));
                            *v
                        }
                        Expression::StringConstant(s) => {
                            rendered.push(format!("{column}->\"{s}\""));
                            self.symbols.encode(s)
                        }
                        other => {
                            return Err(Error::internal(format!(
                                "estimate-join-size constant for column {column} is not a constant: {other:?}"
                            )))
                        }
                    };
                    resolved.push((*column, value));
                }
                ShadowNode::EstimateJoinSize {
                    rel_id: self.rel_id(relation)?,
                    index_pos: *index_pos,
                    key_columns: key_columns.clone(),
                    constants: resolved,
                    constants_text: format!("{{{}}}", rendered.join(",")),
                    recursive: *recursive,
                }
            }
            Statement::Assign { variable, value } => {
                let mut qc = QueryCtx::default();
                ShadowNode::Assign {
                    variable: variable.clone(),
                    value: Box::new(self.gen_expression_in(value, &mut qc)?),
                }
            }
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lower one query: peel the outer filter chain, split its conjunction
    /// into view-free and view-backed parts, and assign view slots so that
    /// runtime staging writes into a pre-sized vector.
    fn gen_query(&self, operation: &Operation) -> Result<ShadowNode> {
        let mut qc = QueryCtx::default();

        // Peel the outermost filter chain.
        let mut filters: Vec<(&Condition, &Option<String>)> = Vec::new();
        let mut cursor = operation;
        while let Operation::Filter {
            condition,
            nested,
            profile_text,
        } = cursor
        {
            filters.push((condition, profile_text));
            cursor = nested;
        }

        let is_parallel = operation_is_parallel(cursor);

        let mut view_ctxt = ViewContext {
            is_parallel,
            ..ViewContext::default()
        };

        // Generate the outer filter leaves once; the rebuilt filter chain
        // below shares the generated nodes and their view slots.
        let mut generated_filters: Vec<(Vec<ShadowNode>, Option<String>)> = Vec::new();
        for (condition, profile_text) in &filters {
            let mut generated_leaves = Vec::new();
            for leaf in conjunction_leaves(condition) {
                let has_view = condition_needs_view(leaf);
                qc.in_outer = has_view;
                let node = self.gen_condition(leaf, &mut qc)?;
                qc.in_outer = false;
                if has_view {
                    view_ctxt.outer_view_ops.push(node.clone());
                } else {
                    view_ctxt.outer_free_ops.push(node.clone());
                }
                generated_leaves.push(node);
            }
            generated_filters.push((generated_leaves, (*profile_text).clone()));
        }

        // The loop body below the filter chain.
        let mut body = self.gen_operation(cursor, &mut qc)?;

        // Rebuild the filter chain, innermost first.
        for (leaves, profile_text) in generated_filters.into_iter().rev() {
            let condition = leaves
                .into_iter()
                .reduce(|lhs, rhs| ShadowNode::Conjunction(Box::new(lhs), Box::new(rhs)))
                .unwrap_or(ShadowNode::True);
            body = ShadowNode::Filter {
                condition: Box::new(condition),
                nested: Box::new(body),
            };
            body = self.wrap_frequency(body, &profile_text);
        }

        view_ctxt.outer_views = std::mem::take(&mut qc.outer_views);
        view_ctxt.nested_views = std::mem::take(&mut qc.nested_views);

        let view_ctxt = Arc::new(view_ctxt);
        attach_view_context(&mut body, &view_ctxt);

        Ok(ShadowNode::Query {
            view_ctxt,
            nested: Box::new(body),
        })
    }

    fn wrap_frequency(&self, node: ShadowNode, profile_text: &Option<String>) -> ShadowNode {
        match profile_text {
            Some(key) if self.freq_enabled && !key.is_empty() => ShadowNode::Frequency {
                key: key.clone(),
                nested: Box::new(node),
            },
            _ => node,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn gen_operation(&self, operation: &Operation, qc: &mut QueryCtx) -> Result<ShadowNode> {
        let node = match operation {
            Operation::Scan {
                relation,
                tuple_id,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::Scan {
                    rel_id: self.rel_id(relation)?,
                    tuple_id: *tuple_id,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::ParallelScan {
                relation,
                tuple_id,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::ParallelScan {
                    rel_id: self.rel_id(relation)?,
                    tuple_id: *tuple_id,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                    view_ctxt: Arc::new(ViewContext::default()),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::IndexScan {
                relation,
                index_pos,
                pattern,
                tuple_id,
                nested,
                profile_text,
            } => {
                let rel_id = self.rel_id(relation)?;
                let view_slot = qc.alloc_view(rel_id, *index_pos);
                let node = ShadowNode::IndexScan {
                    view_slot,
                    tuple_id: *tuple_id,
                    superinst: self.super_instruction(pattern, qc)?,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::ParallelIndexScan {
                relation,
                index_pos,
                pattern,
                tuple_id,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::ParallelIndexScan {
                    rel_id: self.rel_id(relation)?,
                    index_pos: *index_pos,
                    tuple_id: *tuple_id,
                    superinst: self.super_instruction(pattern, qc)?,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                    view_ctxt: Arc::new(ViewContext::default()),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::IfExists {
                relation,
                tuple_id,
                condition,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::IfExists {
                    rel_id: self.rel_id(relation)?,
                    tuple_id: *tuple_id,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::ParallelIfExists {
                relation,
                tuple_id,
                condition,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::ParallelIfExists {
                    rel_id: self.rel_id(relation)?,
                    tuple_id: *tuple_id,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    nested: Box::new(self.gen_operation(nested, qc)?),
                    view_ctxt: Arc::new(ViewContext::default()),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::IndexIfExists {
                relation,
                index_pos,
                pattern,
                tuple_id,
                condition,
                nested,
                profile_text,
            } => {
                let rel_id = self.rel_id(relation)?;
                let view_slot = qc.alloc_view(rel_id, *index_pos);
                let node = ShadowNode::IndexIfExists {
                    view_slot,
                    tuple_id: *tuple_id,
                    superinst: self.super_instruction(pattern, qc)?,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::ParallelIndexIfExists {
                relation,
                index_pos,
                pattern,
                tuple_id,
                condition,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::ParallelIndexIfExists {
                    rel_id: self.rel_id(relation)?,
                    index_pos: *index_pos,
                    tuple_id: *tuple_id,
                    superinst: self.super_instruction(pattern, qc)?,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    nested: Box::new(self.gen_operation(nested, qc)?),
                    view_ctxt: Arc::new(ViewContext::default()),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::UnpackRecord {
                expr,
                arity,
                tuple_id,
                nested,
            } => ShadowNode::UnpackRecord {
                expr: Box::new(self.gen_expression_in(expr, qc)?),
                arity: *arity,
                tuple_id: *tuple_id,
                nested: Box::new(self.gen_operation(nested, qc)?),
            },
            Operation::Aggregate {
                relation,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::Aggregate {
                    rel_id: self.rel_id(relation)?,
                    aggregator: self.gen_aggregator(aggregator, qc)?,
                    expr: self.gen_optional_expression(expr, qc)?,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    tuple_id: *tuple_id,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::ParallelAggregate {
                relation,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::ParallelAggregate {
                    rel_id: self.rel_id(relation)?,
                    aggregator: self.gen_aggregator(aggregator, qc)?,
                    expr: self.gen_optional_expression(expr, qc)?,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    tuple_id: *tuple_id,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                    view_ctxt: Arc::new(ViewContext::default()),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::IndexAggregate {
                relation,
                index_pos,
                pattern,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
                profile_text,
            } => {
                let rel_id = self.rel_id(relation)?;
                let view_slot = qc.alloc_view(rel_id, *index_pos);
                let node = ShadowNode::IndexAggregate {
                    view_slot,
                    superinst: self.super_instruction(pattern, qc)?,
                    aggregator: self.gen_aggregator(aggregator, qc)?,
                    expr: self.gen_optional_expression(expr, qc)?,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    tuple_id: *tuple_id,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::ParallelIndexAggregate {
                relation,
                index_pos,
                pattern,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
                profile_text,
            } => {
                let rel_id = self.rel_id(relation)?;
                let view_slot = qc.alloc_view(rel_id, *index_pos);
                let node = ShadowNode::ParallelIndexAggregate {
                    view_slot,
                    superinst: self.super_instruction(pattern, qc)?,
                    aggregator: self.gen_aggregator(aggregator, qc)?,
                    expr: self.gen_optional_expression(expr, qc)?,
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    tuple_id: *tuple_id,
                    nested: Box::new(self.gen_operation(nested, qc)?),
                    view_ctxt: Arc::new(ViewContext::default()),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::NestedIntrinsic {
                op,
                args,
                tuple_id,
                nested,
            } => ShadowNode::NestedIntrinsic {
                op: *op,
                args: args
                    .iter()
                    .map(|a| self.gen_expression_in(a, qc))
                    .collect::<Result<_>>()?,
                tuple_id: *tuple_id,
                nested: Box::new(self.gen_operation(nested, qc)?),
            },
            Operation::Filter {
                condition,
                nested,
                profile_text,
            } => {
                let node = ShadowNode::Filter {
                    condition: Box::new(self.gen_condition(condition, qc)?),
                    nested: Box::new(self.gen_operation(nested, qc)?),
                };
                self.wrap_frequency(node, profile_text)
            }
            Operation::Break { condition, nested } => ShadowNode::Break {
                condition: Box::new(self.gen_condition(condition, qc)?),
                nested: Box::new(self.gen_operation(nested, qc)?),
            },
            Operation::GuardedInsert {
                relation,
                values,
                condition,
            } => ShadowNode::GuardedInsert {
                rel_id: self.rel_id(relation)?,
                superinst: self.values_instruction(values, qc)?,
                condition: Box::new(self.gen_condition(condition, qc)?),
            },
            Operation::Insert { relation, values } => ShadowNode::Insert {
                rel_id: self.rel_id(relation)?,
                superinst: self.values_instruction(values, qc)?,
            },
            Operation::Erase { relation, values } => ShadowNode::Erase {
                rel_id: self.rel_id(relation)?,
                superinst: self.values_instruction(values, qc)?,
            },
            Operation::SubroutineReturn(values) => ShadowNode::SubroutineReturn(
                values
                    .iter()
                    .map(|v| {
                        v.as_ref()
                            .map(|e| self.gen_expression_in(e, qc))
                            .transpose()
                    })
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(node)
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    fn gen_condition(&self, condition: &Condition, qc: &mut QueryCtx) -> Result<ShadowNode> {
        Ok(match condition {
            Condition::True => ShadowNode::True,
            Condition::False => ShadowNode::False,
            Condition::Conjunction(lhs, rhs) => ShadowNode::Conjunction(
                Box::new(self.gen_condition(lhs, qc)?),
                Box::new(self.gen_condition(rhs, qc)?),
            ),
            Condition::Negation(inner) => {
                ShadowNode::Negation(Box::new(self.gen_condition(inner, qc)?))
            }
            Condition::Constraint { op, lhs, rhs } => {
                // A constant match pattern compiles once, here.
                let regex = match (op, lhs) {
                    (
                        ConstraintOp::Match | ConstraintOp::NotMatch,
                        Expression::StringConstant(pattern),
                    ) => match compile_full_match(pattern) {
                        Some(re) => Some(Arc::new(re)),
                        None => {
                            eprintln!("warning: wrong pattern provided for match(\"{pattern}\")");
                            None
                        }
                    },
                    _ => None,
                };
                ShadowNode::Constraint {
                    op: *op,
                    lhs: Box::new(self.gen_expression_in(lhs, qc)?),
                    rhs: Box::new(self.gen_expression_in(rhs, qc)?),
                    regex,
                }
            }
            Condition::EmptinessCheck { relation } => ShadowNode::EmptinessCheck {
                rel_id: self.rel_id(relation)?,
            },
            Condition::ExistenceCheck {
                relation,
                index_pos,
                pattern,
            } => {
                let rel_id = self.rel_id(relation)?;
                let view_slot = qc.alloc_view(rel_id, *index_pos);
                let total = pattern.iter().all(Option::is_some);
                let superinst =
                    self.pattern_instruction(pattern, pattern, MIN_SIGNED, MAX_SIGNED, qc)?;
                ShadowNode::ExistenceCheck {
                    rel_id,
                    relation_name: relation.clone(),
                    is_temp: relation.starts_with('@'),
                    view_slot,
                    total,
                    superinst,
                }
            }
            Condition::ProvenanceExistenceCheck {
                relation,
                index_pos,
                pattern,
                level,
            } => {
                let rel_id = self.rel_id(relation)?;
                let view_slot = qc.alloc_view(rel_id, *index_pos);
                // Data columns bound as given; the trailing (rule, level)
                // pair spans the whole signed domain.
                let mut full = pattern.clone();
                if full.len() >= 2 {
                    let n = full.len();
                    full[n - 2] = None;
                    full[n - 1] = None;
                }
                let superinst = self.pattern_instruction(&full, &full, MIN_SIGNED, MAX_SIGNED, qc)?;
                ShadowNode::ProvenanceExistenceCheck {
                    view_slot,
                    superinst,
                    level: Box::new(self.gen_expression_in(level, qc)?),
                }
            }
        })
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn gen_expression_in(&self, expr: &Expression, qc: &mut QueryCtx) -> Result<ShadowNode> {
        Ok(match expr {
            Expression::NumericConstant(value) => ShadowNode::NumericConstant(*value),
            Expression::StringConstant(text) => {
                ShadowNode::StringConstant(self.symbols.encode(text))
            }
            Expression::Variable(name) => ShadowNode::Variable(name.clone()),
            Expression::TupleElement { tuple_id, element } => ShadowNode::TupleElement {
                tuple_id: *tuple_id,
                element: *element,
            },
            Expression::AutoIncrement => ShadowNode::AutoIncrement,
            Expression::Intrinsic { op, args } => ShadowNode::Intrinsic {
                op: *op,
                args: args
                    .iter()
                    .map(|a| self.gen_expression_in(a, qc))
                    .collect::<Result<_>>()?,
            },
            Expression::UserDefined {
                name,
                stateful,
                arg_types,
                return_type,
                args,
            } => {
                let handle = self.functors.resolve(name)?;
                if *stateful && matches!(handle, super::functors::FunctorHandle::Stateless(_)) {
                    return Err(Error::type_error(format!(
                        "functor '{name}' is declared stateful but registered stateless"
                    )));
                }
                ShadowNode::UserDefined {
                    name: name.clone(),
                    handle,
                    arg_types: arg_types.clone(),
                    return_type: *return_type,
                    args: args
                        .iter()
                        .map(|a| self.gen_expression_in(a, qc))
                        .collect::<Result<_>>()?,
                }
            }
            Expression::PackRecord(args) => ShadowNode::PackRecord(
                args.iter()
                    .map(|a| self.gen_expression_in(a, qc))
                    .collect::<Result<_>>()?,
            ),
            Expression::SubroutineArgument(index) => ShadowNode::SubroutineArgument(*index),
            Expression::RelationSize { relation } => ShadowNode::RelationSize {
                rel_id: self.rel_id(relation)?,
            },
        })
    }

    fn gen_optional_expression(
        &self,
        expr: &Option<Expression>,
        qc: &mut QueryCtx,
    ) -> Result<Option<Box<ShadowNode>>> {
        expr.as_ref()
            .map(|e| self.gen_expression_in(e, qc).map(Box::new))
            .transpose()
    }

    fn gen_aggregator(&self, aggregator: &Aggregator, qc: &mut QueryCtx) -> Result<ShadowAggregator> {
        Ok(match aggregator {
            Aggregator::Intrinsic(op) => ShadowAggregator::Intrinsic(*op),
            Aggregator::UserDefined { name, init } => ShadowAggregator::UserDefined {
                functor: self.functors.resolve_stateful(name)?,
                init: Box::new(self.gen_expression_in(init, qc)?),
            },
        })
    }

    // =========================================================================
    // Super-instructions
    // =========================================================================

    /// Prepare the bound template of an index search pattern.
    fn super_instruction(
        &self,
        pattern: &SearchPattern,
        qc: &mut QueryCtx,
    ) -> Result<SuperInstruction> {
        self.pattern_instruction(&pattern.lo, &pattern.hi, MIN_SIGNED, MAX_SIGNED, qc)
    }

    /// Prepare the build template of an insert or erase value list.
    fn values_instruction(
        &self,
        values: &[Expression],
        qc: &mut QueryCtx,
    ) -> Result<SuperInstruction> {
        let columns: Vec<Option<Expression>> = values.iter().cloned().map(Some).collect();
        self.pattern_instruction(&columns, &columns, 0, 0, qc)
    }

    fn pattern_instruction(
        &self,
        lo: &[Option<Expression>],
        hi: &[Option<Expression>],
        lo_fill: RamDomain,
        hi_fill: RamDomain,
        qc: &mut QueryCtx,
    ) -> Result<SuperInstruction> {
        debug_assert_eq!(lo.len(), hi.len());
        let mut inst = SuperInstruction::unconstrained(lo.len(), lo_fill, hi_fill);

        for column in 0..lo.len() {
            match (&lo[column], &hi[column]) {
                (None, None) => {}
                (Some(l), Some(h)) if l == h => match l {
                    Expression::NumericConstant(value) => {
                        inst.lo[column] = *value;
                        inst.hi[column] = *value;
                    }
                    Expression::StringConstant(text) => {
                        let value = self.symbols.encode(text);
                        inst.lo[column] = value;
                        inst.hi[column] = value;
                    }
                    Expression::TupleElement { tuple_id, element } => {
                        inst.tuple_both.push(TupleSource {
                            column,
                            tuple_id: *tuple_id,
                            element: *element,
                        });
                    }
                    other => {
                        inst.expr_both
                            .push((column, self.gen_expression_in(other, qc)?));
                    }
                },
                (l, h) => {
                    if let Some(expr) = l {
                        match expr {
                            Expression::NumericConstant(value) => inst.lo[column] = *value,
                            Expression::StringConstant(text) => {
                                inst.lo[column] = self.symbols.encode(text)
                            }
                            other => inst
                                .expr_lo
                                .push((column, self.gen_expression_in(other, qc)?)),
                        }
                    }
                    if let Some(expr) = h {
                        match expr {
                            Expression::NumericConstant(value) => inst.hi[column] = *value,
                            Expression::StringConstant(text) => {
                                inst.hi[column] = self.symbols.encode(text)
                            }
                            other => inst
                                .expr_hi
                                .push((column, self.gen_expression_in(other, qc)?)),
                        }
                    }
                }
            }
        }
        Ok(inst)
    }
}

/// Split a conjunction tree into its leaves, left to right.
fn conjunction_leaves(condition: &Condition) -> Vec<&Condition> {
    let mut leaves = Vec::new();
    let mut stack = vec![condition];
    while let Some(cond) = stack.pop() {
        match cond {
            Condition::Conjunction(lhs, rhs) => {
                stack.push(rhs);
                stack.push(lhs);
            }
            leaf => leaves.push(leaf),
        }
    }
    leaves
}

/// True if the condition consults an index view.
fn condition_needs_view(condition: &Condition) -> bool {
    match condition {
        Condition::ExistenceCheck { .. } | Condition::ProvenanceExistenceCheck { .. } => true,
        Condition::Conjunction(lhs, rhs) => condition_needs_view(lhs) || condition_needs_view(rhs),
        Condition::Negation(inner) => condition_needs_view(inner),
        _ => false,
    }
}

/// Hand the finished query view context to the parallel loop below the
/// filter chain, which stages the nested views in each worker. Parallel
/// loops only ever sit at the top of a query's loop nest.
fn attach_view_context(node: &mut ShadowNode, ctxt: &Arc<ViewContext>) {
    match node {
        ShadowNode::Frequency { nested, .. } | ShadowNode::Filter { nested, .. } => {
            attach_view_context(nested, ctxt)
        }
        ShadowNode::ParallelScan { view_ctxt, .. }
        | ShadowNode::ParallelIndexScan { view_ctxt, .. }
        | ShadowNode::ParallelIfExists { view_ctxt, .. }
        | ShadowNode::ParallelIndexIfExists { view_ctxt, .. }
        | ShadowNode::ParallelAggregate { view_ctxt, .. }
        | ShadowNode::ParallelIndexAggregate { view_ctxt, .. } => {
            *view_ctxt = Arc::clone(ctxt);
        }
        _ => {}
    }
}

/// True if the loop nest below a query fans out across workers.
fn operation_is_parallel(operation: &Operation) -> bool {
    matches!(
        operation,
        Operation::ParallelScan { .. }
            | Operation::ParallelIndexScan { .. }
            | Operation::ParallelIfExists { .. }
            | Operation::ParallelIndexIfExists { .. }
            | Operation::ParallelAggregate { .. }
            | Operation::ParallelIndexAggregate { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::Condition as C;

    #[test]
    fn test_conjunction_leaves_in_order() {
        let cond = C::and(
            C::and(C::True, C::False),
            C::EmptinessCheck {
                relation: "r".to_string(),
            },
        );
        let leaves = conjunction_leaves(&cond);
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0], &C::True);
        assert_eq!(leaves[1], &C::False);
    }

    #[test]
    fn test_condition_needs_view() {
        assert!(!condition_needs_view(&C::True));
        assert!(!condition_needs_view(&C::EmptinessCheck {
            relation: "r".to_string()
        }));
        let exists = C::ExistenceCheck {
            relation: "r".to_string(),
            index_pos: 0,
            pattern: vec![None, None],
        };
        assert!(condition_needs_view(&exists));
        assert!(condition_needs_view(&C::Negation(Box::new(exists))));
    }
}
