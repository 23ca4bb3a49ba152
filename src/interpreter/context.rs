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

//! Evaluation context
//!
//! The per-invocation state threaded through `execute`: tuple registers
//! bound by the enclosing loops, view slots staged per query, the
//! subroutine argument and return vectors, and the `Assign` variable map.
//! Parallel workers clone the context at loop entry; nothing here is
//! shared between threads.

use rustc_hash::FxHashMap;

use crate::core::{RamDomain, Tuple};
use crate::relation::IndexView;

/// Per-invocation evaluation state.
#[derive(Clone, Default)]
pub struct Context {
    tuples: Vec<Tuple>,
    views: Vec<Option<IndexView>>,
    variables: FxHashMap<String, RamDomain>,
    arguments: Vec<RamDomain>,
    return_values: Vec<RamDomain>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context primed with subroutine arguments.
    pub fn with_arguments(arguments: Vec<RamDomain>) -> Self {
        Context {
            arguments,
            ..Self::default()
        }
    }

    /// Bind a tuple register.
    pub fn set_tuple(&mut self, tuple_id: usize, tuple: Tuple) {
        if self.tuples.len() <= tuple_id {
            self.tuples.resize_with(tuple_id + 1, Tuple::new);
        }
        self.tuples[tuple_id] = tuple;
    }

    /// Read a tuple register element.
    #[inline]
    pub fn element(&self, tuple_id: usize, element: usize) -> RamDomain {
        self.tuples[tuple_id][element]
    }

    /// Read a whole tuple register.
    pub fn tuple(&self, tuple_id: usize) -> &Tuple {
        &self.tuples[tuple_id]
    }

    /// Stage a view in its slot.
    pub fn create_view(&mut self, slot: usize, view: IndexView) {
        if self.views.len() <= slot {
            self.views.resize_with(slot + 1, || None);
        }
        self.views[slot] = Some(view);
    }

    /// The view staged in a slot. Generation guarantees the slot is
    /// populated before any node reads it.
    pub fn view(&self, slot: usize) -> &IndexView {
        self.views[slot]
            .as_ref()
            .expect("view slot read before creation")
    }

    pub fn set_variable(&mut self, name: &str, value: RamDomain) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn variable(&self, name: &str) -> RamDomain {
        self.variables.get(name).copied().unwrap_or(0)
    }

    pub fn argument(&self, index: usize) -> RamDomain {
        self.arguments.get(index).copied().unwrap_or(0)
    }

    pub fn add_return_value(&mut self, value: RamDomain) {
        self.return_values.push(value);
    }

    /// Move the accumulated return values out.
    pub fn take_return_values(&mut self) -> Vec<RamDomain> {
        std::mem::take(&mut self.return_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tuple_from;

    #[test]
    fn test_tuple_registers() {
        let mut ctxt = Context::new();
        ctxt.set_tuple(2, tuple_from(&[7, 8]));
        assert_eq!(ctxt.element(2, 1), 8);
        assert_eq!(ctxt.tuple(2), &tuple_from(&[7, 8]));
    }

    #[test]
    fn test_variables_default_to_zero() {
        let mut ctxt = Context::new();
        assert_eq!(ctxt.variable("x"), 0);
        ctxt.set_variable("x", 9);
        assert_eq!(ctxt.variable("x"), 9);
    }

    #[test]
    fn test_arguments_and_returns() {
        let mut ctxt = Context::with_arguments(vec![10, 20]);
        assert_eq!(ctxt.argument(0), 10);
        assert_eq!(ctxt.argument(5), 0);

        ctxt.add_return_value(1);
        ctxt.add_return_value(2);
        assert_eq!(ctxt.take_return_values(), vec![1, 2]);
        assert!(ctxt.take_return_values().is_empty());
    }

    #[test]
    fn test_clone_isolates_workers() {
        let mut parent = Context::new();
        parent.set_tuple(0, tuple_from(&[1]));

        let mut worker = parent.clone();
        worker.set_tuple(0, tuple_from(&[2]));

        assert_eq!(parent.element(0, 0), 1);
        assert_eq!(worker.element(0, 0), 2);
    }
}
