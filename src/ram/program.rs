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

//! The RAM program
//!
//! A program bundles the relation declarations, the index selection
//! computed by the front-end's index analysis, the main statement, and the
//! named subroutines produced by SCC decomposition. The engine consumes it
//! read-only.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::node::Statement;

/// Storage representation requested for a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Ordered index, the default.
    BTree,
    /// Ordered index supporting erase.
    BTreeDelete,
    /// Binary equivalence relation under reflexive-symmetric-transitive
    /// closure.
    Eqrel,
}

/// The attribute name marking a provenance level column.
pub const LEVEL_ATTRIBUTE: &str = "@level_number";

/// A relation declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDecl {
    pub name: String,
    pub arity: usize,
    /// Trailing columns excluded from key semantics (provenance data).
    pub aux_arity: usize,
    pub representation: Representation,
    /// Attribute names; a trailing `@level_number` marks provenance.
    pub attributes: Vec<String>,
    /// Shadow relations ignore engine inserts and answer reads from an
    /// externally registered source.
    pub shadow: bool,
}

impl RelationDecl {
    /// Declare a plain b-tree relation of the given arity.
    pub fn btree(name: impl Into<String>, arity: usize) -> Self {
        RelationDecl {
            name: name.into(),
            arity,
            aux_arity: 0,
            representation: Representation::BTree,
            attributes: Vec::new(),
            shadow: false,
        }
    }

    /// Declare a b-tree relation supporting erase.
    pub fn btree_delete(name: impl Into<String>, arity: usize) -> Self {
        RelationDecl {
            representation: Representation::BTreeDelete,
            ..Self::btree(name, arity)
        }
    }

    /// Declare a binary equivalence relation.
    pub fn eqrel(name: impl Into<String>) -> Self {
        RelationDecl {
            representation: Representation::Eqrel,
            ..Self::btree(name, 2)
        }
    }

    /// Declare a provenance relation: `arity` data columns followed by the
    /// `(rule, level)` pair.
    pub fn provenance(name: impl Into<String>, data_arity: usize) -> Self {
        let arity = data_arity + 2;
        let mut attributes: Vec<String> = (0..data_arity).map(|i| format!("x{i}")).collect();
        attributes.push("@rule_number".to_string());
        attributes.push(LEVEL_ATTRIBUTE.to_string());
        RelationDecl {
            aux_arity: 2,
            attributes,
            ..Self::btree(name, arity)
        }
    }

    /// Mark this declaration as a shadow relation.
    pub fn as_shadow(mut self) -> Self {
        self.shadow = true;
        self
    }

    /// True if the trailing attribute marks a provenance level column.
    pub fn is_provenance(&self) -> bool {
        self.arity > 0 && self.attributes.last().map(String::as_str) == Some(LEVEL_ATTRIBUTE)
    }
}

/// A column order: a permutation of `[0..arity)`.
pub type ColumnOrder = Vec<usize>;

/// Index analysis result: relation name → list of column orders. Shadow
/// nodes reference entries by position; a missing relation defaults to a
/// single identity order.
pub type IndexSelection = FxHashMap<String, Vec<ColumnOrder>>;

/// A complete RAM program.
#[derive(Debug, Clone)]
pub struct Program {
    pub relations: Vec<RelationDecl>,
    pub index_selection: IndexSelection,
    pub main: Statement,
    pub subroutines: BTreeMap<String, Statement>,
}

impl Program {
    /// Create a program with no subroutines and identity index orders.
    pub fn new(relations: Vec<RelationDecl>, main: Statement) -> Self {
        Program {
            relations,
            index_selection: IndexSelection::default(),
            main,
            subroutines: BTreeMap::new(),
        }
    }

    /// Attach a named subroutine.
    pub fn with_subroutine(mut self, name: impl Into<String>, body: Statement) -> Self {
        self.subroutines.insert(name.into(), body);
        self
    }

    /// Attach the index orders for one relation.
    pub fn with_index_orders(mut self, relation: impl Into<String>, orders: Vec<ColumnOrder>) -> Self {
        self.index_selection.insert(relation.into(), orders);
        self
    }

    /// The orders selected for a relation (identity if the analysis left
    /// no entry).
    pub fn orders_for(&self, decl: &RelationDecl) -> Vec<ColumnOrder> {
        match self.index_selection.get(&decl.name) {
            Some(orders) if !orders.is_empty() => orders.clone(),
            _ => vec![(0..decl.arity).collect()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_detection() {
        let decl = RelationDecl::provenance("p", 1);
        assert_eq!(decl.arity, 3);
        assert_eq!(decl.aux_arity, 2);
        assert!(decl.is_provenance());
        assert!(!RelationDecl::btree("r", 3).is_provenance());
    }

    #[test]
    fn test_default_index_orders() {
        let decl = RelationDecl::btree("edge", 2);
        let program = Program::new(vec![decl.clone()], Statement::Sequence(vec![]));
        assert_eq!(program.orders_for(&decl), vec![vec![0, 1]]);

        let program = program.with_index_orders("edge", vec![vec![1, 0]]);
        assert_eq!(program.orders_for(&decl), vec![vec![1, 0]]);
    }

    #[test]
    fn test_shadow_flag() {
        let decl = RelationDecl::btree("ext", 2).as_shadow();
        assert!(decl.shadow);
    }
}
