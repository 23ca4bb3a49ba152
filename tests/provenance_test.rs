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

//! Integration tests for provenance-annotated relations

use ramble::ram::{Condition, Expression, Operation, Program, RelationDecl, Statement};
use ramble::{tuple_from, Engine, EngineConfig, RamDomain, RelationKind};

/// `marker(1) :- prov(data)@level ≤ threshold`.
fn cutoff_program(data: RamDomain, threshold: RamDomain) -> Program {
    Program::new(
        vec![
            RelationDecl::provenance("prov", 1),
            RelationDecl::btree("marker", 1),
        ],
        Statement::seq(vec![Statement::Query(Operation::Filter {
            condition: Condition::ProvenanceExistenceCheck {
                relation: "prov".to_string(),
                index_pos: 0,
                pattern: vec![Some(Expression::number(data)), None, None],
                level: Box::new(Expression::number(threshold)),
            },
            nested: Box::new(Operation::Insert {
                relation: "marker".to_string(),
                values: vec![Expression::number(1)],
            }),
            profile_text: None,
        })]),
    )
}

fn run_cutoff(data: RamDomain, threshold: RamDomain) -> bool {
    let engine = Engine::new(cutoff_program(data, threshold), EngineConfig::default()).unwrap();
    let prov = engine.relation("prov").unwrap();
    // (data, rule, level)
    prov.insert(&tuple_from(&[10, 1, 1])).unwrap();
    prov.insert(&tuple_from(&[10, 2, 5])).unwrap();
    engine.execute_main().unwrap();
    !engine.relation("marker").unwrap().is_empty().unwrap()
}

#[test]
fn test_declaration_shape() {
    let decl = RelationDecl::provenance("prov", 1);
    assert_eq!(decl.arity, 3);
    assert_eq!(decl.aux_arity, 2);
    assert!(decl.is_provenance());

    let engine = Engine::new(cutoff_program(10, 3), EngineConfig::default()).unwrap();
    assert_eq!(
        engine.relation("prov").unwrap().kind(),
        RelationKind::Provenance
    );
}

#[test]
fn test_level_within_threshold() {
    // The minimum level for data 10 is 1 ≤ 3.
    assert!(run_cutoff(10, 3));
}

#[test]
fn test_level_above_threshold() {
    // 1 > 0, so even the lowest derivation is too deep.
    assert!(!run_cutoff(10, 0));
}

#[test]
fn test_missing_data_fails() {
    assert!(!run_cutoff(99, 100));
}

#[test]
fn test_monotone_in_threshold() {
    // Once present at level L, present at every threshold ≥ L.
    assert!(!run_cutoff(10, 0));
    for threshold in 1..8 {
        assert!(run_cutoff(10, threshold), "threshold {threshold}");
    }
}

#[test]
fn test_existence_ignores_annotation_columns() {
    // Tuples differing only in (rule, level) answer the same data query;
    // the check consults the first derivation in index order.
    let engine = Engine::new(cutoff_program(10, 4), EngineConfig::default()).unwrap();
    let prov = engine.relation("prov").unwrap();
    prov.insert(&tuple_from(&[10, 7, 5])).unwrap();
    prov.insert(&tuple_from(&[10, 3, 4])).unwrap();
    engine.execute_main().unwrap();
    assert!(!engine.relation("marker").unwrap().is_empty().unwrap());
}
