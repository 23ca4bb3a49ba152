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

//! The interpreter engine
//!
//! `execute` is one recursive function dispatching on the shadow node
//! kind. The returned domain word doubles as the internal control signal:
//! a falsy return stops the enclosing tuple loop or sequence, fatal
//! failures travel as errors. Statement-level control runs on the calling
//! thread; `Parallel*` tuple loops partition their tuples into
//! `threads × oversubscription` chunks and fan them across the engine's
//! rayon pool, each worker owning a cloned context.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::core::{
    as_float, as_unsigned, from_float, from_unsigned, is_true, truth, tuple_from, Error, RamDomain,
    RamFloat, RamUnsigned, RecordTable, Result, SymbolTable, Tuple, MAX_SIGNED, MIN_SIGNED,
    NIL_RECORD,
};
use crate::io::IoRegistry;
use crate::profile::{FrequencyCounters, ProfileSink, ReadCounters};
use crate::ram::{
    AggregateOp, ConstraintOp, FunctorOp, NestedOp, Operation, Program, Statement, TypeAttribute,
};
use crate::relation::{ExternalSource, IndexView, Relation, RelationKind};

use super::context::Context;
use super::functors::{FunctorArg, FunctorHandle, FunctorRegistry, FunctorResult};
use super::generator::Generator;
use super::regex_cache::RegexCache;
use super::shadow::{
    ShadowAggregator, ShadowNode, SuperInstruction, ViewContext, ViewInfo,
};

/// Configures and constructs an [`Engine`].
pub struct EngineBuilder {
    program: Program,
    config: EngineConfig,
    functors: FunctorRegistry,
    io: IoRegistry,
    sources: FxHashMap<String, Arc<dyn ExternalSource>>,
}

impl EngineBuilder {
    pub fn new(program: Program, config: EngineConfig) -> Self {
        EngineBuilder {
            program,
            config,
            functors: FunctorRegistry::new(),
            io: IoRegistry::with_defaults(),
            sources: FxHashMap::default(),
        }
    }

    /// Replace the functor registry.
    pub fn functors(mut self, functors: FunctorRegistry) -> Self {
        self.functors = functors;
        self
    }

    /// Register the authoritative source of a shadow relation.
    pub fn external_source(
        mut self,
        relation: impl Into<String>,
        source: Arc<dyn ExternalSource>,
    ) -> Self {
        self.sources.insert(relation.into(), source);
        self
    }

    /// Replace the IO registry.
    pub fn io(mut self, io: IoRegistry) -> Self {
        self.io = io;
        self
    }

    /// Create the relations, resolve functors, and lower the program.
    pub fn finish(self) -> Result<Engine> {
        let EngineBuilder {
            program,
            config,
            functors,
            io,
            sources,
        } = self;

        let num_threads = config.resolved_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| Error::internal(format!("thread pool construction failed: {e}")))?;

        let symbols = Arc::new(SymbolTable::new());
        let records = Arc::new(RecordTable::new());

        let mut relations = Vec::with_capacity(program.relations.len());
        let mut rel_ids = FxHashMap::default();
        for (idx, decl) in program.relations.iter().enumerate() {
            if rel_ids.insert(decl.name.clone(), idx).is_some() {
                return Err(Error::DuplicateRelation(decl.name.clone()));
            }
            let source = sources.get(&decl.name).cloned();
            relations.push(Arc::new(Relation::create(
                decl,
                program.orders_for(decl),
                source,
            )?));
        }

        let profiler = match &config.profile_path {
            Some(path) => ProfileSink::to_file(path.clone()),
            None => ProfileSink::disabled(),
        };
        let freq_enabled = profiler.is_enabled() && config.profile_frequency;

        let generator = Generator::new(&rel_ids, &functors, &symbols, freq_enabled);
        let main = generator.generate(&program.main)?;
        let mut subroutines = FxHashMap::default();
        for (name, body) in &program.subroutines {
            subroutines.insert(name.clone(), generator.generate(body)?);
        }

        let frequencies = FrequencyCounters::new();
        if freq_enabled {
            let mut keys = Vec::new();
            collect_profile_texts(&program.main, &mut keys);
            for body in program.subroutines.values() {
                collect_profile_texts(body, &mut keys);
            }
            for key in keys {
                frequencies.register(&key);
            }
        }

        let reads = ReadCounters::new();
        let mut relation_count = 0;
        if profiler.is_enabled() {
            for decl in &program.relations {
                if !decl.name.starts_with('@') {
                    relation_count += 1;
                    reads.register(&decl.name);
                }
            }
        } else {
            relation_count = program
                .relations
                .iter()
                .filter(|d| !d.name.starts_with('@'))
                .count();
        }

        let mut rule_count = 0;
        count_queries(&program.main, &mut rule_count);
        for body in program.subroutines.values() {
            count_queries(body, &mut rule_count);
        }

        Ok(Engine {
            config,
            num_threads,
            pool,
            relations,
            rel_ids,
            symbols,
            records,
            io,
            main,
            subroutines,
            regex_cache: RegexCache::new(),
            counter: AtomicI64::new(0),
            iteration: AtomicUsize::new(0),
            frequencies,
            reads,
            profiler,
            current_rule: Mutex::new(String::new()),
            relation_count,
            rule_count,
        })
    }
}

/// The tree-walking evaluator of a lowered RAM program.
pub struct Engine {
    config: EngineConfig,
    num_threads: usize,
    pool: rayon::ThreadPool,
    relations: Vec<Arc<Relation>>,
    rel_ids: FxHashMap<String, usize>,
    symbols: Arc<SymbolTable>,
    records: Arc<RecordTable>,
    io: IoRegistry,
    main: ShadowNode,
    subroutines: FxHashMap<String, ShadowNode>,
    regex_cache: RegexCache,
    /// `AutoIncrement` counter.
    counter: AtomicI64,
    /// Current loop iteration, saved and restored around nested loops.
    iteration: AtomicUsize,
    frequencies: FrequencyCounters,
    reads: ReadCounters,
    profiler: ProfileSink,
    /// Active rule message set by `DebugInfo`.
    current_rule: Mutex<String>,
    relation_count: usize,
    rule_count: usize,
}

impl Engine {
    /// Build an engine with default registries.
    pub fn new(program: Program, config: EngineConfig) -> Result<Engine> {
        EngineBuilder::new(program, config).finish()
    }

    /// Start configuring an engine.
    pub fn builder(program: Program, config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(program, config)
    }

    /// Run the main statement to completion.
    pub fn execute_main(&self) -> Result<()> {
        if self.profiler.is_enabled() {
            self.profiler.start_timer();
            self.profiler.time_event("@time;starttime");
            self.profiler
                .config("jobs", self.num_threads.to_string());
            self.profiler
                .config("relationCount", self.relation_count.to_string());
            self.profiler
                .config("ruleCount", self.rule_count.to_string());
        }

        let mut ctxt = Context::new();
        self.execute(&self.main, &mut ctxt)?;

        if self.profiler.is_enabled() {
            for (key, counts) in self.frequencies.snapshot() {
                for (iteration, count) in counts.into_iter().enumerate() {
                    self.profiler.quantity_event(key.as_str(), count, iteration);
                }
            }
            for (relation, count) in self.reads.snapshot() {
                self.profiler
                    .quantity_event(format!("@relation-reads;{relation}"), count, 0);
            }
            self.profiler.flush()?;
        }
        Ok(())
    }

    /// Run a named subroutine, appending its results to `ret`.
    pub fn execute_subroutine(
        &self,
        name: &str,
        args: &[RamDomain],
        ret: &mut Vec<RamDomain>,
    ) -> Result<()> {
        let body = self
            .subroutines
            .get(name)
            .ok_or_else(|| Error::SubroutineNotFound(name.to_string()))?;
        let mut ctxt = Context::with_arguments(args.to_vec());
        self.execute(body, &mut ctxt)?;
        ret.append(&mut ctxt.take_return_values());
        Ok(())
    }

    pub fn symbol_table(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn record_table(&self) -> &Arc<RecordTable> {
        &self.records
    }

    /// The relation-name → id map.
    pub fn rel_id_map(&self) -> &FxHashMap<String, usize> {
        &self.rel_ids
    }

    /// The relation registered under an id.
    pub fn relation_handle(&self, id: usize) -> Result<&Arc<Relation>> {
        self.relations.get(id).ok_or(Error::RelationIdOutOfRange(id))
    }

    /// Convenience lookup by relation name.
    pub fn relation(&self, name: &str) -> Result<&Arc<Relation>> {
        let id = self
            .rel_ids
            .get(name)
            .copied()
            .ok_or_else(|| Error::RelationNotFound(name.to_string()))?;
        self.relation_handle(id)
    }

    /// The rule named by the innermost `DebugInfo` statement.
    pub fn current_rule(&self) -> String {
        self.current_rule.lock().clone()
    }

    /// Snapshot of the buffered profile events.
    pub fn profile_events(&self) -> Vec<crate::profile::ProfileEvent> {
        self.profiler.events()
    }

    fn iteration_number(&self) -> usize {
        self.iteration.load(Ordering::Relaxed)
    }

    /// Chunk target of parallel loops, oversubscribed to smooth stragglers.
    fn partition_target(&self) -> usize {
        self.num_threads * self.config.chunk_oversubscription
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn execute(&self, node: &ShadowNode, ctxt: &mut Context) -> Result<RamDomain> {
        match node {
            // -- expressions --------------------------------------------------
            ShadowNode::NumericConstant(value) => Ok(*value),
            ShadowNode::StringConstant(value) => Ok(*value),
            ShadowNode::Variable(name) => Ok(ctxt.variable(name)),
            ShadowNode::TupleElement { tuple_id, element } => {
                Ok(ctxt.element(*tuple_id, *element))
            }
            ShadowNode::AutoIncrement => Ok(self.counter.fetch_add(1, Ordering::Relaxed)),
            ShadowNode::Intrinsic { op, args } => self.eval_intrinsic(*op, args, ctxt),
            ShadowNode::UserDefined {
                name,
                handle,
                arg_types,
                return_type,
                args,
            } => self.eval_user_defined(name, handle, arg_types, *return_type, args, ctxt),
            ShadowNode::PackRecord(args) => {
                let mut data = Tuple::new();
                for arg in args {
                    data.push(self.execute(arg, ctxt)?);
                }
                Ok(self.records.pack(&data))
            }
            ShadowNode::SubroutineArgument(index) => Ok(ctxt.argument(*index)),
            ShadowNode::RelationSize { rel_id } => {
                Ok(self.relation_handle(*rel_id)?.len()? as RamDomain)
            }

            // -- conditions ---------------------------------------------------
            ShadowNode::True => Ok(1),
            ShadowNode::False => Ok(0),
            ShadowNode::Conjunction(lhs, rhs) => {
                if !is_true(self.execute(lhs, ctxt)?) {
                    return Ok(0);
                }
                Ok(truth(is_true(self.execute(rhs, ctxt)?)))
            }
            ShadowNode::Negation(inner) => Ok(truth(!is_true(self.execute(inner, ctxt)?))),
            ShadowNode::Constraint {
                op,
                lhs,
                rhs,
                regex,
            } => self.eval_constraint(*op, lhs, rhs, regex.as_deref(), ctxt),
            ShadowNode::EmptinessCheck { rel_id } => {
                Ok(truth(self.relation_handle(*rel_id)?.is_empty()?))
            }
            ShadowNode::ExistenceCheck {
                relation_name,
                is_temp,
                view_slot,
                total,
                superinst,
                ..
            } => {
                if self.profiler.is_enabled() && !*is_temp {
                    self.reads.bump(relation_name);
                }
                if *total {
                    let tuple = self.build_point(superinst, ctxt)?;
                    Ok(truth(ctxt.view(*view_slot).contains(&tuple)?))
                } else {
                    let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                    Ok(truth(ctxt.view(*view_slot).contains_range(&lo, &hi)?))
                }
            }
            ShadowNode::ProvenanceExistenceCheck {
                view_slot,
                superinst,
                level,
            } => {
                let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                let Some(found) = ctxt.view(*view_slot).first_in_range(&lo, &hi)? else {
                    return Ok(0);
                };
                let threshold = self.execute(level, ctxt)?;
                Ok(truth(found[superinst.arity - 1] <= threshold))
            }

            // -- tuple operations ---------------------------------------------
            ShadowNode::Scan {
                rel_id,
                tuple_id,
                nested,
            } => {
                let tuples = self.relation_handle(*rel_id)?.collect()?;
                self.run_scan(tuples, *tuple_id, nested, ctxt)
            }
            ShadowNode::ParallelScan {
                rel_id,
                tuple_id,
                nested,
                view_ctxt,
            } => {
                let chunks = self
                    .relation_handle(*rel_id)?
                    .partition_scan(self.partition_target())?;
                self.run_parallel_scan(chunks, *tuple_id, None, nested, view_ctxt, ctxt)
            }
            ShadowNode::IndexScan {
                view_slot,
                tuple_id,
                superinst,
                nested,
            } => {
                let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                let tuples = ctxt.view(*view_slot).collect_range(&lo, &hi)?;
                self.run_scan(tuples, *tuple_id, nested, ctxt)
            }
            ShadowNode::ParallelIndexScan {
                rel_id,
                index_pos,
                tuple_id,
                superinst,
                nested,
                view_ctxt,
            } => {
                let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                let chunks = self.relation_handle(*rel_id)?.partition_range(
                    *index_pos,
                    &lo,
                    &hi,
                    self.partition_target(),
                )?;
                self.run_parallel_scan(chunks, *tuple_id, None, nested, view_ctxt, ctxt)
            }
            ShadowNode::IfExists {
                rel_id,
                tuple_id,
                condition,
                nested,
            } => {
                let tuples = self.relation_handle(*rel_id)?.collect()?;
                self.run_if_exists(tuples, *tuple_id, condition, nested, ctxt)
            }
            ShadowNode::ParallelIfExists {
                rel_id,
                tuple_id,
                condition,
                nested,
                view_ctxt,
            } => {
                let chunks = self
                    .relation_handle(*rel_id)?
                    .partition_scan(self.partition_target())?;
                self.run_parallel_scan(chunks, *tuple_id, Some(condition), nested, view_ctxt, ctxt)
            }
            ShadowNode::IndexIfExists {
                view_slot,
                tuple_id,
                superinst,
                condition,
                nested,
            } => {
                let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                let tuples = ctxt.view(*view_slot).collect_range(&lo, &hi)?;
                self.run_if_exists(tuples, *tuple_id, condition, nested, ctxt)
            }
            ShadowNode::ParallelIndexIfExists {
                rel_id,
                index_pos,
                tuple_id,
                superinst,
                condition,
                nested,
                view_ctxt,
            } => {
                let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                let chunks = self.relation_handle(*rel_id)?.partition_range(
                    *index_pos,
                    &lo,
                    &hi,
                    self.partition_target(),
                )?;
                self.run_parallel_scan(chunks, *tuple_id, Some(condition), nested, view_ctxt, ctxt)
            }
            ShadowNode::UnpackRecord {
                expr,
                arity,
                tuple_id,
                nested,
            } => {
                let handle = self.execute(expr, ctxt)?;
                if handle == NIL_RECORD {
                    return Ok(1);
                }
                let tuple = self.records.unpack(handle, *arity)?;
                ctxt.set_tuple(*tuple_id, tuple);
                self.execute(nested, ctxt)
            }
            ShadowNode::Aggregate {
                rel_id,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
            } => {
                let tuples = self.relation_handle(*rel_id)?.collect()?;
                self.eval_aggregate(aggregator, expr.as_deref(), condition, *tuple_id, nested, tuples, ctxt)
            }
            ShadowNode::ParallelAggregate {
                rel_id,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
                view_ctxt,
            } => {
                // Sequential under a worker-local context, like the original.
                let mut worker = ctxt.clone();
                self.stage_views(&view_ctxt.nested_views, &mut worker)?;
                let tuples = self.relation_handle(*rel_id)?.collect()?;
                self.eval_aggregate(
                    aggregator,
                    expr.as_deref(),
                    condition,
                    *tuple_id,
                    nested,
                    tuples,
                    &mut worker,
                )
            }
            ShadowNode::IndexAggregate {
                view_slot,
                superinst,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
            } => {
                let (lo, hi) = self.build_bounds(superinst, ctxt)?;
                let tuples = ctxt.view(*view_slot).collect_range(&lo, &hi)?;
                self.eval_aggregate(aggregator, expr.as_deref(), condition, *tuple_id, nested, tuples, ctxt)
            }
            ShadowNode::ParallelIndexAggregate {
                view_slot,
                superinst,
                aggregator,
                expr,
                condition,
                tuple_id,
                nested,
                view_ctxt,
            } => {
                let mut worker = ctxt.clone();
                self.stage_views(&view_ctxt.nested_views, &mut worker)?;
                let (lo, hi) = self.build_bounds(superinst, &mut worker)?;
                let tuples = worker.view(*view_slot).collect_range(&lo, &hi)?;
                self.eval_aggregate(
                    aggregator,
                    expr.as_deref(),
                    condition,
                    *tuple_id,
                    nested,
                    tuples,
                    &mut worker,
                )
            }
            ShadowNode::NestedIntrinsic {
                op,
                args,
                tuple_id,
                nested,
            } => self.eval_range(*op, args, *tuple_id, nested, ctxt),
            ShadowNode::Filter { condition, nested } => {
                if is_true(self.execute(condition, ctxt)?) {
                    self.execute(nested, ctxt)
                } else {
                    Ok(1)
                }
            }
            ShadowNode::Break { condition, nested } => {
                if is_true(self.execute(condition, ctxt)?) {
                    return Ok(0);
                }
                self.execute(nested, ctxt)
            }
            ShadowNode::Frequency { key, nested } => {
                self.frequencies.bump(key, self.iteration_number());
                self.execute(nested, ctxt)
            }
            ShadowNode::GuardedInsert {
                rel_id,
                superinst,
                condition,
            } => {
                if !is_true(self.execute(condition, ctxt)?) {
                    return Ok(1);
                }
                let tuple = self.build_point(superinst, ctxt)?;
                self.relation_handle(*rel_id)?.insert(&tuple)?;
                Ok(1)
            }
            ShadowNode::Insert { rel_id, superinst } => {
                let tuple = self.build_point(superinst, ctxt)?;
                self.relation_handle(*rel_id)?.insert(&tuple)?;
                Ok(1)
            }
            ShadowNode::Erase { rel_id, superinst } => {
                let tuple = self.build_point(superinst, ctxt)?;
                self.relation_handle(*rel_id)?.erase(&tuple)?;
                Ok(1)
            }
            ShadowNode::SubroutineReturn(values) => {
                for value in values {
                    match value {
                        Some(expr) => {
                            let v = self.execute(expr, ctxt)?;
                            ctxt.add_return_value(v);
                        }
                        None => ctxt.add_return_value(0),
                    }
                }
                Ok(1)
            }

            // -- statements ---------------------------------------------------
            ShadowNode::Sequence(children) | ShadowNode::Parallel(children) => {
                for child in children {
                    if !is_true(self.execute(child, ctxt)?) {
                        return Ok(0);
                    }
                }
                Ok(1)
            }
            ShadowNode::Loop(body) => {
                let saved = self.iteration.swap(0, Ordering::Relaxed);
                while is_true(self.execute(body, ctxt)?) {
                    self.iteration.fetch_add(1, Ordering::Relaxed);
                }
                self.iteration.store(saved, Ordering::Relaxed);
                Ok(1)
            }
            ShadowNode::Exit(condition) => Ok(truth(!is_true(self.execute(condition, ctxt)?))),
            ShadowNode::Query { view_ctxt, nested } => {
                // View-free outer conditions short-circuit the whole query
                // before any view is created.
                for op in &view_ctxt.outer_free_ops {
                    if !is_true(self.execute(op, ctxt)?) {
                        return Ok(1);
                    }
                }
                self.stage_views(&view_ctxt.outer_views, ctxt)?;
                for op in &view_ctxt.outer_view_ops {
                    if !is_true(self.execute(op, ctxt)?) {
                        return Ok(1);
                    }
                }
                if !view_ctxt.is_parallel {
                    self.stage_views(&view_ctxt.nested_views, ctxt)?;
                }
                self.execute(nested, ctxt)?;
                Ok(1)
            }
            ShadowNode::Call(name) => {
                let body = self
                    .subroutines
                    .get(name)
                    .ok_or_else(|| Error::SubroutineNotFound(name.clone()))?;
                self.execute(body, ctxt)?;
                Ok(1)
            }
            ShadowNode::Io { directives, rel_id } => {
                let relation = self.relation_handle(*rel_id)?;
                self.run_io(directives, relation)?;
                Ok(1)
            }
            ShadowNode::Clear { rel_id } => {
                self.relation_handle(*rel_id)?.purge();
                Ok(1)
            }
            ShadowNode::Swap { rel1, rel2 } => {
                let a = self.relation_handle(*rel1)?;
                let b = self.relation_handle(*rel2)?;
                a.swap_contents(b);
                Ok(1)
            }
            ShadowNode::MergeExtend { source, target } => {
                let src = self.relation_handle(*source)?;
                let trg = self.relation_handle(*target)?;
                if src.kind() != RelationKind::Eqrel || trg.kind() != RelationKind::Eqrel {
                    return Err(Error::UnsupportedRelationOperation {
                        relation: trg.name().to_string(),
                        operation: "merge-extend",
                    });
                }
                // Inserting every source pair re-closes the union in the
                // target.
                for pair in src.collect()? {
                    trg.insert(&pair)?;
                }
                Ok(1)
            }
            ShadowNode::LogSize { rel_id, message } => {
                let size = self.relation_handle(*rel_id)?.len()?;
                self.profiler
                    .quantity_event(message.as_str(), size, self.iteration_number());
                Ok(1)
            }
            ShadowNode::LogTimer { message, nested } => {
                let start = Instant::now();
                let result = self.execute(nested, ctxt)?;
                self.profiler
                    .duration_event(message.as_str(), start.elapsed(), self.iteration_number());
                Ok(result)
            }
            ShadowNode::LogRelationTimer {
                message,
                rel_id,
                nested,
            } => {
                let start = Instant::now();
                let result = self.execute(nested, ctxt)?;
                self.profiler
                    .duration_event(message.as_str(), start.elapsed(), self.iteration_number());
                let size = self.relation_handle(*rel_id)?.len()?;
                self.profiler
                    .quantity_event(message.as_str(), size, self.iteration_number());
                Ok(result)
            }
            ShadowNode::DebugInfo { message, nested } => {
                *self.current_rule.lock() = message.clone();
                if self.config.verbose {
                    eprintln!("{message}");
                }
                self.execute(nested, ctxt)
            }
            ShadowNode::EstimateJoinSize {
                rel_id,
                index_pos,
                key_columns,
                constants,
                constants_text,
                recursive,
            } => {
                self.estimate_join_size(
                    *rel_id,
                    *index_pos,
                    key_columns,
                    constants,
                    constants_text,
                    *recursive,
                )?;
                Ok(1)
            }
            ShadowNode::Assign { variable, value } => {
                let v = self.execute(value, ctxt)?;
                ctxt.set_variable(variable, v);
                Ok(1)
            }
        }
    }

    // =========================================================================
    // Tuple loops
    // =========================================================================

    fn run_scan(
        &self,
        tuples: Vec<Tuple>,
        tuple_id: usize,
        nested: &ShadowNode,
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        for tuple in tuples {
            ctxt.set_tuple(tuple_id, tuple);
            if !is_true(self.execute(nested, ctxt)?) {
                break;
            }
        }
        Ok(1)
    }

    fn run_if_exists(
        &self,
        tuples: Vec<Tuple>,
        tuple_id: usize,
        condition: &ShadowNode,
        nested: &ShadowNode,
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        for tuple in tuples {
            ctxt.set_tuple(tuple_id, tuple);
            if is_true(self.execute(condition, ctxt)?) {
                self.execute(nested, ctxt)?;
                break;
            }
        }
        Ok(1)
    }

    /// Fan tuple chunks across the pool. With a condition this is the
    /// if-exists flavor: each worker stops its chunk after the first
    /// matching tuple.
    fn run_parallel_scan(
        &self,
        chunks: Vec<Vec<Tuple>>,
        tuple_id: usize,
        condition: Option<&ShadowNode>,
        nested: &ShadowNode,
        view_ctxt: &ViewContext,
        ctxt: &Context,
    ) -> Result<RamDomain> {
        self.pool.install(|| {
            chunks.into_par_iter().try_for_each(|chunk| -> Result<()> {
                let mut worker = ctxt.clone();
                self.stage_views(&view_ctxt.nested_views, &mut worker)?;
                for tuple in chunk {
                    worker.set_tuple(tuple_id, tuple);
                    match condition {
                        Some(cond) => {
                            if is_true(self.execute(cond, &mut worker)?) {
                                self.execute(nested, &mut worker)?;
                                break;
                            }
                        }
                        None => {
                            if !is_true(self.execute(nested, &mut worker)?) {
                                break;
                            }
                        }
                    }
                }
                Ok(())
            })
        })?;
        Ok(1)
    }

    fn stage_views(&self, views: &[ViewInfo], ctxt: &mut Context) -> Result<()> {
        for info in views {
            let relation = Arc::clone(self.relation_handle(info.rel_id)?);
            ctxt.create_view(info.slot, IndexView::new(relation, info.index_pos));
        }
        Ok(())
    }

    // =========================================================================
    // Search bounds
    // =========================================================================

    /// Materialize the point tuple of a total search or insert template.
    fn build_point(&self, inst: &SuperInstruction, ctxt: &mut Context) -> Result<Tuple> {
        let mut tuple = inst.lo.clone();
        for src in &inst.tuple_both {
            tuple[src.column] = ctxt.element(src.tuple_id, src.element);
        }
        for (column, expr) in &inst.expr_both {
            tuple[*column] = self.execute(expr, ctxt)?;
        }
        Ok(tuple)
    }

    /// Materialize the inclusive bounds of a range search template.
    fn build_bounds(&self, inst: &SuperInstruction, ctxt: &mut Context) -> Result<(Tuple, Tuple)> {
        let mut lo = inst.lo.clone();
        let mut hi = inst.hi.clone();
        for src in &inst.tuple_both {
            let value = ctxt.element(src.tuple_id, src.element);
            lo[src.column] = value;
            hi[src.column] = value;
        }
        for (column, expr) in &inst.expr_both {
            let value = self.execute(expr, ctxt)?;
            lo[*column] = value;
            hi[*column] = value;
        }
        for (column, expr) in &inst.expr_lo {
            lo[*column] = self.execute(expr, ctxt)?;
        }
        for (column, expr) in &inst.expr_hi {
            hi[*column] = self.execute(expr, ctxt)?;
        }
        Ok((lo, hi))
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    fn aggregate_init(
        &self,
        aggregator: &ShadowAggregator,
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        Ok(match aggregator {
            ShadowAggregator::Intrinsic(op) => match op {
                AggregateOp::Min => MAX_SIGNED,
                AggregateOp::UMin => from_unsigned(RamUnsigned::MAX),
                AggregateOp::FMin => from_float(RamFloat::MAX),
                AggregateOp::Max => MIN_SIGNED,
                AggregateOp::UMax => from_unsigned(RamUnsigned::MIN),
                AggregateOp::FMax => from_float(RamFloat::MIN),
                AggregateOp::Sum | AggregateOp::USum => 0,
                AggregateOp::FSum => from_float(0.0),
                AggregateOp::Mean => 0,
                AggregateOp::Count => 0,
            },
            ShadowAggregator::UserDefined { init, .. } => self.execute(init, ctxt)?,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_aggregate(
        &self,
        aggregator: &ShadowAggregator,
        expr: Option<&ShadowNode>,
        condition: &ShadowNode,
        tuple_id: usize,
        nested: &ShadowNode,
        tuples: Vec<Tuple>,
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        let mut res = self.aggregate_init(aggregator, ctxt)?;
        // COUNT and the sums run the nested operation even over an empty
        // candidate set; the extrema do not.
        let mut should_run_nested = match aggregator {
            ShadowAggregator::Intrinsic(op) => matches!(
                op,
                AggregateOp::Count | AggregateOp::Sum | AggregateOp::USum | AggregateOp::FSum
            ),
            ShadowAggregator::UserDefined { .. } => true,
        };
        let mut mean_sum = 0.0;
        let mut mean_count = 0.0;

        for tuple in tuples {
            ctxt.set_tuple(tuple_id, tuple);
            if !is_true(self.execute(condition, ctxt)?) {
                continue;
            }
            should_run_nested = true;

            if matches!(aggregator, ShadowAggregator::Intrinsic(AggregateOp::Count)) {
                res += 1;
                continue;
            }

            let target = expr.ok_or_else(|| {
                Error::internal("aggregate without a target expression".to_string())
            })?;
            let val = self.execute(target, ctxt)?;

            match aggregator {
                ShadowAggregator::Intrinsic(op) => match op {
                    AggregateOp::Min => res = res.min(val),
                    AggregateOp::UMin => {
                        res = from_unsigned(as_unsigned(res).min(as_unsigned(val)))
                    }
                    AggregateOp::FMin => res = from_float(as_float(res).min(as_float(val))),
                    AggregateOp::Max => res = res.max(val),
                    AggregateOp::UMax => {
                        res = from_unsigned(as_unsigned(res).max(as_unsigned(val)))
                    }
                    AggregateOp::FMax => res = from_float(as_float(res).max(as_float(val))),
                    AggregateOp::Sum => res = res.wrapping_add(val),
                    AggregateOp::USum => {
                        res = from_unsigned(as_unsigned(res).wrapping_add(as_unsigned(val)))
                    }
                    AggregateOp::FSum => res = from_float(as_float(res) + as_float(val)),
                    AggregateOp::Mean => {
                        mean_sum += as_float(val);
                        mean_count += 1.0;
                    }
                    AggregateOp::Count => unreachable!("count handled above"),
                },
                ShadowAggregator::UserDefined { functor, .. } => {
                    res = functor.call(&self.symbols, &self.records, &[res, val]);
                }
            }
        }

        if matches!(aggregator, ShadowAggregator::Intrinsic(AggregateOp::Mean))
            && mean_count != 0.0
        {
            res = from_float(mean_sum / mean_count);
        }

        ctxt.set_tuple(tuple_id, tuple_from(&[res]));
        if should_run_nested {
            self.execute(nested, ctxt)
        } else {
            Ok(1)
        }
    }

    // =========================================================================
    // Range generators
    // =========================================================================

    fn eval_range(
        &self,
        op: NestedOp,
        args: &[ShadowNode],
        tuple_id: usize,
        nested: &ShadowNode,
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        match op {
            NestedOp::Range => {
                let from = self.execute(&args[0], ctxt)?;
                let to = self.execute(&args[1], ctxt)?;
                let step = match args.get(2) {
                    Some(expr) => self.execute(expr, ctxt)?,
                    None => {
                        if from <= to {
                            1
                        } else {
                            -1
                        }
                    }
                };
                if step == 0 {
                    return Ok(1);
                }
                let mut cur = from;
                while (step > 0 && cur < to) || (step < 0 && cur > to) {
                    ctxt.set_tuple(tuple_id, tuple_from(&[cur]));
                    self.execute(nested, ctxt)?;
                    cur = cur.wrapping_add(step);
                }
                Ok(1)
            }
            NestedOp::URange => {
                let from = as_unsigned(self.execute(&args[0], ctxt)?);
                let to = as_unsigned(self.execute(&args[1], ctxt)?);
                // An unsigned step is never negative, so the loop only
                // ascends; the defaulted backward step wraps to the maximum
                // word and terminates immediately, as in the source
                // semantics.
                let step = match args.get(2) {
                    Some(expr) => as_unsigned(self.execute(expr, ctxt)?),
                    None => {
                        if from <= to {
                            1
                        } else {
                            RamUnsigned::MAX
                        }
                    }
                };
                if step == 0 {
                    return Ok(1);
                }
                let mut cur = from;
                while cur < to {
                    ctxt.set_tuple(tuple_id, tuple_from(&[from_unsigned(cur)]));
                    self.execute(nested, ctxt)?;
                    cur = cur.wrapping_add(step);
                }
                Ok(1)
            }
            NestedOp::FRange => {
                let from = as_float(self.execute(&args[0], ctxt)?);
                let to = as_float(self.execute(&args[1], ctxt)?);
                let step = match args.get(2) {
                    Some(expr) => as_float(self.execute(expr, ctxt)?),
                    None => {
                        if from <= to {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                };
                if step == 0.0 {
                    return Ok(1);
                }
                let mut cur = from;
                while (step > 0.0 && cur < to) || (step < 0.0 && cur > to) {
                    ctxt.set_tuple(tuple_id, tuple_from(&[from_float(cur)]));
                    self.execute(nested, ctxt)?;
                    cur += step;
                }
                Ok(1)
            }
        }
    }

    // =========================================================================
    // IO and profiling statements
    // =========================================================================

    fn run_io(&self, directives: &crate::ram::DirectiveMap, relation: &Arc<Relation>) -> Result<()> {
        let operation = directives
            .get("operation")
            .ok_or_else(|| Error::MissingDirective("operation".to_string()))?;
        match operation.as_str() {
            "input" => {
                let mut reader = self
                    .io
                    .reader(directives, Arc::clone(&self.symbols), Arc::clone(&self.records))
                    .map_err(|e| Error::relation_io(relation.name(), e.to_string()))?;
                reader
                    .read_into(relation)
                    .map_err(|e| Error::relation_io(relation.name(), e.to_string()))?;
                Ok(())
            }
            "output" | "printsize" => {
                let mut writer = self
                    .io
                    .writer(directives, Arc::clone(&self.symbols), Arc::clone(&self.records))
                    .map_err(|e| Error::relation_io(relation.name(), e.to_string()))?;
                writer
                    .write_all(relation)
                    .map_err(|e| Error::relation_io(relation.name(), e.to_string()))?;
                Ok(())
            }
            other => Err(Error::internal(format!("unknown IO operation '{other}'"))),
        }
    }

    fn estimate_join_size(
        &self,
        rel_id: usize,
        index_pos: usize,
        key_columns: &[usize],
        constants: &[(usize, RamDomain)],
        constants_text: &str,
        recursive: bool,
    ) -> Result<()> {
        let relation = self.relation_handle(rel_id)?;
        let order = relation.index_order(index_pos);
        let arity = relation.arity();

        let mut lo = Tuple::new();
        lo.resize(arity, MIN_SIGNED);
        let mut hi = Tuple::new();
        hi.resize(arity, MAX_SIGNED);
        let tuples = relation.collect_range(index_pos, &lo, &hi)?;

        let only_constants = key_columns
            .iter()
            .all(|col| constants.iter().any(|(c, _)| c == col));

        // Duplicates are runs on the leading key columns in index layout.
        let key_width = key_columns.len();
        let mut total = 0.0;
        let mut duplicates = 0.0;
        let mut prev: Option<Tuple> = None;
        for tuple in &tuples {
            let matches_constants = constants.iter().all(|(col, value)| tuple[*col] == *value);
            if !matches_constants {
                continue;
            }
            let encoded = order.encode(tuple);
            if let Some(prev_encoded) = &prev {
                if encoded[..key_width] == prev_encoded[..key_width] {
                    duplicates += 1.0;
                }
            }
            prev = Some(encoded);
            total += 1.0;
        }

        let join_size = if only_constants {
            total
        } else {
            total / f64::max(1.0, total - duplicates)
        };

        let columns = format!(
            "[{}]",
            key_columns
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );
        if recursive {
            let key = format!(
                "@recursive-estimate-join-size;{};{};{}",
                relation.name(),
                columns,
                constants_text
            );
            self.profiler
                .recursive_count_event(key, join_size, self.iteration_number());
        } else {
            let key = format!(
                "@non-recursive-estimate-join-size;{};{};{}",
                relation.name(),
                columns,
                constants_text
            );
            self.profiler.non_recursive_count_event(key, join_size);
        }
        Ok(())
    }

    // =========================================================================
    // Intrinsic operators
    // =========================================================================

    fn decode(&self, handle: RamDomain) -> Result<Arc<str>> {
        self.symbols.decode(handle)
    }

    fn eval_intrinsic(
        &self,
        op: FunctorOp,
        args: &[ShadowNode],
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        use FunctorOp as Op;

        match op {
            Op::Ord | Op::I2I | Op::U2U | Op::F2F | Op::S2S => self.execute(&args[0], ctxt),
            Op::StrLen => {
                let s = self.decode(self.execute(&args[0], ctxt)?)?;
                Ok(s.len() as RamDomain)
            }
            Op::Neg => Ok(self.execute(&args[0], ctxt)?.wrapping_neg()),
            Op::FNeg => {
                let x = as_float(self.execute(&args[0], ctxt)?);
                Ok(from_float(-x))
            }
            Op::BNot => Ok(!self.execute(&args[0], ctxt)?),
            Op::UBNot => Ok(from_unsigned(!as_unsigned(self.execute(&args[0], ctxt)?))),
            Op::LNot => Ok(truth(!is_true(self.execute(&args[0], ctxt)?))),
            Op::ULNot => Ok(truth(as_unsigned(self.execute(&args[0], ctxt)?) == 0)),

            Op::F2I => Ok(as_float(self.execute(&args[0], ctxt)?) as RamDomain),
            Op::F2U => Ok(from_unsigned(
                as_float(self.execute(&args[0], ctxt)?) as RamUnsigned
            )),
            Op::I2U | Op::U2I => self.execute(&args[0], ctxt),
            Op::I2F => Ok(from_float(self.execute(&args[0], ctxt)? as RamFloat)),
            Op::U2F => Ok(from_float(
                as_unsigned(self.execute(&args[0], ctxt)?) as RamFloat
            )),

            Op::I2S => {
                let x = self.execute(&args[0], ctxt)?;
                Ok(self.symbols.encode(&x.to_string()))
            }
            Op::U2S => {
                let x = as_unsigned(self.execute(&args[0], ctxt)?);
                Ok(self.symbols.encode(&x.to_string()))
            }
            Op::F2S => {
                let x = as_float(self.execute(&args[0], ctxt)?);
                Ok(self.symbols.encode(&x.to_string()))
            }
            Op::S2I => {
                let s = self.decode(self.execute(&args[0], ctxt)?)?;
                s.trim()
                    .parse::<RamDomain>()
                    .map_err(|_| Error::type_error(format!("cannot convert \"{s}\" to number")))
            }
            Op::S2U => {
                let s = self.decode(self.execute(&args[0], ctxt)?)?;
                s.trim()
                    .parse::<RamUnsigned>()
                    .map(from_unsigned)
                    .map_err(|_| Error::type_error(format!("cannot convert \"{s}\" to unsigned")))
            }
            Op::S2F => {
                let s = self.decode(self.execute(&args[0], ctxt)?)?;
                s.trim()
                    .parse::<RamFloat>()
                    .map(from_float)
                    .map_err(|_| Error::type_error(format!("cannot convert \"{s}\" to float")))
            }

            Op::Add => self.binary_signed(args, ctxt, i64::wrapping_add),
            Op::UAdd => self.binary_unsigned(args, ctxt, u64::wrapping_add),
            Op::FAdd => self.binary_float(args, ctxt, |a, b| a + b),
            Op::Sub => self.binary_signed(args, ctxt, i64::wrapping_sub),
            Op::USub => self.binary_unsigned(args, ctxt, u64::wrapping_sub),
            Op::FSub => self.binary_float(args, ctxt, |a, b| a - b),
            Op::Mul => self.binary_signed(args, ctxt, i64::wrapping_mul),
            Op::UMul => self.binary_unsigned(args, ctxt, u64::wrapping_mul),
            Op::FMul => self.binary_float(args, ctxt, |a, b| a * b),
            Op::FDiv => self.binary_float(args, ctxt, |a, b| a / b),
            Op::Div => {
                let a = self.execute(&args[0], ctxt)?;
                let b = self.execute(&args[1], ctxt)?;
                if b == 0 {
                    eprintln!("warning: division by zero");
                    return Ok(0);
                }
                Ok(a.wrapping_div(b))
            }
            Op::UDiv => {
                let a = as_unsigned(self.execute(&args[0], ctxt)?);
                let b = as_unsigned(self.execute(&args[1], ctxt)?);
                if b == 0 {
                    eprintln!("warning: division by zero");
                    return Ok(0);
                }
                Ok(from_unsigned(a / b))
            }
            Op::Mod => {
                let a = self.execute(&args[0], ctxt)?;
                let b = self.execute(&args[1], ctxt)?;
                if b == 0 {
                    eprintln!("warning: division by zero");
                    return Ok(0);
                }
                Ok(a.wrapping_rem(b))
            }
            Op::UMod => {
                let a = as_unsigned(self.execute(&args[0], ctxt)?);
                let b = as_unsigned(self.execute(&args[1], ctxt)?);
                if b == 0 {
                    eprintln!("warning: division by zero");
                    return Ok(0);
                }
                Ok(from_unsigned(a % b))
            }
            Op::Exp => {
                let a = self.execute(&args[0], ctxt)? as RamFloat;
                let b = self.execute(&args[1], ctxt)? as RamFloat;
                Ok(a.powf(b) as RamDomain)
            }
            Op::UExp => {
                let a = as_unsigned(self.execute(&args[0], ctxt)?) as RamFloat;
                let b = as_unsigned(self.execute(&args[1], ctxt)?) as RamFloat;
                Ok(from_unsigned(a.powf(b) as RamUnsigned))
            }
            Op::FExp => self.binary_float(args, ctxt, RamFloat::powf),

            Op::BAnd => self.binary_signed(args, ctxt, |a, b| a & b),
            Op::UBAnd => self.binary_unsigned(args, ctxt, |a, b| a & b),
            Op::BOr => self.binary_signed(args, ctxt, |a, b| a | b),
            Op::UBOr => self.binary_unsigned(args, ctxt, |a, b| a | b),
            Op::BXor => self.binary_signed(args, ctxt, |a, b| a ^ b),
            Op::UBXor => self.binary_unsigned(args, ctxt, |a, b| a ^ b),

            // Left shifts run as unsigned on both variants; a signed left
            // shift of a negative operand would be undefined in the source
            // semantics.
            Op::BShiftL | Op::UBShiftL => self.binary_unsigned(args, ctxt, |a, b| a << (b & 63)),
            Op::BShiftR => self.binary_signed(args, ctxt, |a, b| a >> (b & 63)),
            Op::UBShiftR | Op::BShiftRUnsigned | Op::UBShiftRUnsigned => {
                self.binary_unsigned(args, ctxt, |a, b| a >> (b & 63))
            }

            Op::LAnd => self.binary_signed(args, ctxt, |a, b| truth(a != 0 && b != 0)),
            Op::ULAnd => self.binary_unsigned(args, ctxt, |a, b| u64::from(a != 0 && b != 0)),
            Op::LOr => self.binary_signed(args, ctxt, |a, b| truth(a != 0 || b != 0)),
            Op::ULOr => self.binary_unsigned(args, ctxt, |a, b| u64::from(a != 0 || b != 0)),
            Op::LXor => self.binary_signed(args, ctxt, |a, b| truth((a != 0) ^ (b != 0))),
            Op::ULXor => self.binary_unsigned(args, ctxt, |a, b| u64::from((a != 0) ^ (b != 0))),

            Op::Max => self.fold_signed(args, ctxt, i64::max),
            Op::UMax => self.fold_unsigned(args, ctxt, u64::max),
            Op::FMax => self.fold_float(args, ctxt, RamFloat::max),
            Op::Min => self.fold_signed(args, ctxt, i64::min),
            Op::UMin => self.fold_unsigned(args, ctxt, u64::min),
            Op::FMin => self.fold_float(args, ctxt, RamFloat::min),
            Op::SMax => self.fold_symbol(args, ctxt, true),
            Op::SMin => self.fold_symbol(args, ctxt, false),

            Op::Cat => {
                let mut out = String::new();
                for arg in args {
                    let s = self.decode(self.execute(arg, ctxt)?)?;
                    out.push_str(&s);
                }
                Ok(self.symbols.encode(&out))
            }
            Op::SSAdd => {
                let left = self.decode(self.execute(&args[0], ctxt)?)?;
                let right = self.decode(self.execute(&args[1], ctxt)?)?;
                Ok(self.symbols.encode(&format!("{left}{right}")))
            }
            Op::Substr => {
                let s = self.decode(self.execute(&args[0], ctxt)?)?;
                let idx = self.execute(&args[1], ctxt)?;
                let len = self.execute(&args[2], ctxt)?;
                let bytes = s.as_bytes();
                if idx < 0 || idx as usize > bytes.len() {
                    eprintln!(
                        "warning: wrong index position provided by substr(\"{s}\",{idx},{len}) functor"
                    );
                    return Ok(self.symbols.encode(""));
                }
                let start = idx as usize;
                let rest = bytes.len() - start;
                let take = if len < 0 { rest } else { rest.min(len as usize) };
                let sub = String::from_utf8_lossy(&bytes[start..start + take]).into_owned();
                Ok(self.symbols.encode(&sub))
            }
        }
    }

    fn binary_signed(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        f: impl Fn(RamDomain, RamDomain) -> RamDomain,
    ) -> Result<RamDomain> {
        let a = self.execute(&args[0], ctxt)?;
        let b = self.execute(&args[1], ctxt)?;
        Ok(f(a, b))
    }

    fn binary_unsigned(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        f: impl Fn(RamUnsigned, RamUnsigned) -> RamUnsigned,
    ) -> Result<RamDomain> {
        let a = as_unsigned(self.execute(&args[0], ctxt)?);
        let b = as_unsigned(self.execute(&args[1], ctxt)?);
        Ok(from_unsigned(f(a, b)))
    }

    fn binary_float(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        f: impl Fn(RamFloat, RamFloat) -> RamFloat,
    ) -> Result<RamDomain> {
        let a = as_float(self.execute(&args[0], ctxt)?);
        let b = as_float(self.execute(&args[1], ctxt)?);
        Ok(from_float(f(a, b)))
    }

    fn fold_signed(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        f: impl Fn(RamDomain, RamDomain) -> RamDomain,
    ) -> Result<RamDomain> {
        let mut acc = self.execute(&args[0], ctxt)?;
        for arg in &args[1..] {
            acc = f(acc, self.execute(arg, ctxt)?);
        }
        Ok(acc)
    }

    fn fold_unsigned(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        f: impl Fn(RamUnsigned, RamUnsigned) -> RamUnsigned,
    ) -> Result<RamDomain> {
        let mut acc = as_unsigned(self.execute(&args[0], ctxt)?);
        for arg in &args[1..] {
            acc = f(acc, as_unsigned(self.execute(arg, ctxt)?));
        }
        Ok(from_unsigned(acc))
    }

    fn fold_float(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        f: impl Fn(RamFloat, RamFloat) -> RamFloat,
    ) -> Result<RamDomain> {
        let mut acc = as_float(self.execute(&args[0], ctxt)?);
        for arg in &args[1..] {
            acc = f(acc, as_float(self.execute(arg, ctxt)?));
        }
        Ok(from_float(acc))
    }

    /// Lexicographic extrema over decoded symbols; ties keep the earlier
    /// argument.
    fn fold_symbol(
        &self,
        args: &[ShadowNode],
        ctxt: &mut Context,
        want_max: bool,
    ) -> Result<RamDomain> {
        let mut best = self.execute(&args[0], ctxt)?;
        let mut best_text = self.decode(best)?;
        for arg in &args[1..] {
            let alt = self.execute(arg, ctxt)?;
            if alt == best {
                continue;
            }
            let alt_text = self.decode(alt)?;
            let replace = if want_max {
                *best_text < *alt_text
            } else {
                *best_text > *alt_text
            };
            if replace {
                best = alt;
                best_text = alt_text;
            }
        }
        Ok(best)
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    fn eval_constraint(
        &self,
        op: ConstraintOp,
        lhs: &ShadowNode,
        rhs: &ShadowNode,
        regex: Option<&regex::Regex>,
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        use ConstraintOp as Op;

        match op {
            Op::Eq => {
                let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
                Ok(truth(a == b))
            }
            Op::Ne => {
                let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
                Ok(truth(a != b))
            }
            Op::FEq => {
                let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
                Ok(truth(as_float(a) == as_float(b)))
            }
            Op::FNe => {
                let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
                Ok(truth(as_float(a) != as_float(b)))
            }
            Op::Lt => self.compare(lhs, rhs, ctxt, |a, b| a < b),
            Op::Le => self.compare(lhs, rhs, ctxt, |a, b| a <= b),
            Op::Gt => self.compare(lhs, rhs, ctxt, |a, b| a > b),
            Op::Ge => self.compare(lhs, rhs, ctxt, |a, b| a >= b),
            Op::ULt => self.compare_unsigned(lhs, rhs, ctxt, |a, b| a < b),
            Op::ULe => self.compare_unsigned(lhs, rhs, ctxt, |a, b| a <= b),
            Op::UGt => self.compare_unsigned(lhs, rhs, ctxt, |a, b| a > b),
            Op::UGe => self.compare_unsigned(lhs, rhs, ctxt, |a, b| a >= b),
            Op::FLt => self.compare_float(lhs, rhs, ctxt, |a, b| a < b),
            Op::FLe => self.compare_float(lhs, rhs, ctxt, |a, b| a <= b),
            Op::FGt => self.compare_float(lhs, rhs, ctxt, |a, b| a > b),
            Op::FGe => self.compare_float(lhs, rhs, ctxt, |a, b| a >= b),
            Op::SLt => self.compare_symbol(lhs, rhs, ctxt, |a, b| a < b),
            Op::SLe => self.compare_symbol(lhs, rhs, ctxt, |a, b| a <= b),
            Op::SGt => self.compare_symbol(lhs, rhs, ctxt, |a, b| a > b),
            Op::SGe => self.compare_symbol(lhs, rhs, ctxt, |a, b| a >= b),
            Op::Match | Op::NotMatch => {
                let text = self.decode(self.execute(rhs, ctxt)?)?;
                let matched = match regex {
                    Some(re) => re.is_match(&text),
                    None if matches!(lhs, ShadowNode::StringConstant(_)) => {
                        // Constant pattern that failed to compile; warned
                        // at generation.
                        return Ok(0);
                    }
                    None => {
                        let pattern = self.decode(self.execute(lhs, ctxt)?)?;
                        match self.regex_cache.get_or_compile(&pattern) {
                            Some(re) => re.is_match(&text),
                            None => {
                                eprintln!(
                                    "warning: wrong pattern provided for match(\"{pattern}\",\"{text}\")"
                                );
                                return Ok(0);
                            }
                        }
                    }
                };
                Ok(truth(if op == Op::Match { matched } else { !matched }))
            }
            Op::Contains => {
                let needle = self.decode(self.execute(lhs, ctxt)?)?;
                let haystack = self.decode(self.execute(rhs, ctxt)?)?;
                Ok(truth(haystack.contains(&*needle)))
            }
            Op::NotContains => {
                let needle = self.decode(self.execute(lhs, ctxt)?)?;
                let haystack = self.decode(self.execute(rhs, ctxt)?)?;
                Ok(truth(!haystack.contains(&*needle)))
            }
        }
    }

    fn eval_pair(
        &self,
        lhs: &ShadowNode,
        rhs: &ShadowNode,
        ctxt: &mut Context,
    ) -> Result<(RamDomain, RamDomain)> {
        let a = self.execute(lhs, ctxt)?;
        let b = self.execute(rhs, ctxt)?;
        Ok((a, b))
    }

    fn compare(
        &self,
        lhs: &ShadowNode,
        rhs: &ShadowNode,
        ctxt: &mut Context,
        f: impl Fn(RamDomain, RamDomain) -> bool,
    ) -> Result<RamDomain> {
        let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
        Ok(truth(f(a, b)))
    }

    fn compare_unsigned(
        &self,
        lhs: &ShadowNode,
        rhs: &ShadowNode,
        ctxt: &mut Context,
        f: impl Fn(RamUnsigned, RamUnsigned) -> bool,
    ) -> Result<RamDomain> {
        let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
        Ok(truth(f(as_unsigned(a), as_unsigned(b))))
    }

    fn compare_float(
        &self,
        lhs: &ShadowNode,
        rhs: &ShadowNode,
        ctxt: &mut Context,
        f: impl Fn(RamFloat, RamFloat) -> bool,
    ) -> Result<RamDomain> {
        let (a, b) = self.eval_pair(lhs, rhs, ctxt)?;
        Ok(truth(f(as_float(a), as_float(b))))
    }

    fn compare_symbol(
        &self,
        lhs: &ShadowNode,
        rhs: &ShadowNode,
        ctxt: &mut Context,
        f: impl Fn(&str, &str) -> bool,
    ) -> Result<RamDomain> {
        let a = self.decode(self.execute(lhs, ctxt)?)?;
        let b = self.decode(self.execute(rhs, ctxt)?)?;
        Ok(truth(f(a.as_ref(), b.as_ref())))
    }

    // =========================================================================
    // User-defined operators
    // =========================================================================

    fn eval_user_defined(
        &self,
        name: &str,
        handle: &FunctorHandle,
        arg_types: &[TypeAttribute],
        return_type: TypeAttribute,
        args: &[ShadowNode],
        ctxt: &mut Context,
    ) -> Result<RamDomain> {
        match handle {
            FunctorHandle::Stateful(functor) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.execute(arg, ctxt)?);
                }
                Ok(functor.call(&self.symbols, &self.records, &values))
            }
            FunctorHandle::Stateless(functor) => {
                if arg_types.len() != args.len() {
                    return Err(Error::FunctorArityMismatch {
                        name: name.to_string(),
                        expected: arg_types.len(),
                        got: args.len(),
                    });
                }
                let mut raw = Vec::with_capacity(args.len());
                for arg in args {
                    raw.push(self.execute(arg, ctxt)?);
                }
                // Decode symbols up front so borrowed arguments stay alive
                // across the call.
                let mut decoded: Vec<Option<Arc<str>>> = Vec::with_capacity(args.len());
                for (value, ty) in raw.iter().zip(arg_types) {
                    decoded.push(match ty {
                        TypeAttribute::Symbol => Some(self.decode(*value)?),
                        _ => None,
                    });
                }
                let typed: Vec<FunctorArg> = raw
                    .iter()
                    .zip(arg_types)
                    .zip(&decoded)
                    .map(|((value, ty), text)| match ty {
                        TypeAttribute::Signed => FunctorArg::Signed(*value),
                        TypeAttribute::Unsigned => FunctorArg::Unsigned(as_unsigned(*value)),
                        TypeAttribute::Float => FunctorArg::Float(as_float(*value)),
                        TypeAttribute::Symbol => {
                            FunctorArg::Symbol(text.as_deref().unwrap_or_default())
                        }
                    })
                    .collect();

                let result = functor.call(&typed);
                match (return_type, result) {
                    (TypeAttribute::Signed, FunctorResult::Signed(v)) => Ok(v),
                    (TypeAttribute::Unsigned, FunctorResult::Unsigned(v)) => Ok(from_unsigned(v)),
                    (TypeAttribute::Float, FunctorResult::Float(v)) => Ok(from_float(v)),
                    (TypeAttribute::Symbol, FunctorResult::Symbol(s)) => {
                        Ok(self.symbols.encode(&s))
                    }
                    (expected, got) => Err(Error::type_error(format!(
                        "functor '{name}' returned {got:?}, expected {expected:?}"
                    ))),
                }
            }
        }
    }
}

/// Collect the frequency keys of every profiled operation.
fn collect_profile_texts(statement: &Statement, keys: &mut Vec<String>) {
    match statement {
        Statement::Sequence(children) | Statement::Parallel(children) => {
            for child in children {
                collect_profile_texts(child, keys);
            }
        }
        Statement::Loop(body) => collect_profile_texts(body, keys),
        Statement::Query(operation) => collect_operation_profile_texts(operation, keys),
        Statement::LogTimer { statement, .. }
        | Statement::LogRelationTimer { statement, .. }
        | Statement::DebugInfo { statement, .. } => collect_profile_texts(statement, keys),
        _ => {}
    }
}

fn collect_operation_profile_texts(operation: &Operation, keys: &mut Vec<String>) {
    let (profile_text, nested) = match operation {
        Operation::Scan {
            profile_text,
            nested,
            ..
        }
        | Operation::ParallelScan {
            profile_text,
            nested,
            ..
        }
        | Operation::IndexScan {
            profile_text,
            nested,
            ..
        }
        | Operation::ParallelIndexScan {
            profile_text,
            nested,
            ..
        }
        | Operation::IfExists {
            profile_text,
            nested,
            ..
        }
        | Operation::ParallelIfExists {
            profile_text,
            nested,
            ..
        }
        | Operation::IndexIfExists {
            profile_text,
            nested,
            ..
        }
        | Operation::ParallelIndexIfExists {
            profile_text,
            nested,
            ..
        }
        | Operation::Aggregate {
            profile_text,
            nested,
            ..
        }
        | Operation::ParallelAggregate {
            profile_text,
            nested,
            ..
        }
        | Operation::IndexAggregate {
            profile_text,
            nested,
            ..
        }
        | Operation::ParallelIndexAggregate {
            profile_text,
            nested,
            ..
        }
        | Operation::Filter {
            profile_text,
            nested,
            ..
        } => (profile_text.as_ref(), Some(nested)),
        Operation::UnpackRecord { nested, .. }
        | Operation::NestedIntrinsic { nested, .. }
        | Operation::Break { nested, .. } => (None, Some(nested)),
        Operation::GuardedInsert { .. }
        | Operation::Insert { .. }
        | Operation::Erase { .. }
        | Operation::SubroutineReturn(_) => (None, None),
    };
    if let Some(text) = profile_text {
        if !text.is_empty() {
            keys.push(text.clone());
        }
    }
    if let Some(nested) = nested {
        collect_operation_profile_texts(nested, keys);
    }
}

/// Count the query statements of a program for the profile header.
fn count_queries(statement: &Statement, count: &mut usize) {
    match statement {
        Statement::Sequence(children) | Statement::Parallel(children) => {
            for child in children {
                count_queries(child, count);
            }
        }
        Statement::Loop(body) => count_queries(body, count),
        Statement::Query(_) => *count += 1,
        Statement::LogTimer { statement, .. }
        | Statement::LogRelationTimer { statement, .. }
        | Statement::DebugInfo { statement, .. } => count_queries(statement, count),
        _ => {}
    }
}
