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

//! Integration tests for equivalence relations

use ramble::ram::{Expression, Operation, Program, RelationDecl, Statement};
use ramble::{tuple_from, Engine, EngineConfig, RelationKind};

/// Copy `pairs` into the eqrel `eq`, then merge `eq` into `acc`.
fn merge_program() -> Program {
    Program::new(
        vec![
            RelationDecl::btree("pairs", 2),
            RelationDecl::eqrel("eq"),
            RelationDecl::eqrel("acc"),
        ],
        Statement::seq(vec![
            Statement::Query(Operation::Scan {
                relation: "pairs".to_string(),
                tuple_id: 0,
                nested: Box::new(Operation::Insert {
                    relation: "eq".to_string(),
                    values: vec![Expression::element(0, 0), Expression::element(0, 1)],
                }),
                profile_text: None,
            }),
            Statement::MergeExtend {
                source: "eq".to_string(),
                target: "acc".to_string(),
            },
        ]),
    )
}

#[test]
fn test_closure_through_program_inserts() {
    let engine = Engine::new(merge_program(), EngineConfig::default()).unwrap();
    let pairs = engine.relation("pairs").unwrap();
    pairs.insert(&tuple_from(&[1, 2])).unwrap();
    pairs.insert(&tuple_from(&[2, 3])).unwrap();
    engine.execute_main().unwrap();

    let eq = engine.relation("eq").unwrap();
    assert_eq!(eq.kind(), RelationKind::Eqrel);
    // {1,2,3} in one class: 9 ordered pairs, including reflexive and
    // symmetric ones.
    assert_eq!(eq.len().unwrap(), 9);
    assert!(eq.contains(0, &tuple_from(&[3, 1])).unwrap());
    assert!(eq.contains(0, &tuple_from(&[1, 1])).unwrap());
    assert!(!eq.contains(0, &tuple_from(&[1, 4])).unwrap());
}

#[test]
fn test_merge_extend_closes_union() {
    let engine = Engine::new(merge_program(), EngineConfig::default()).unwrap();
    let pairs = engine.relation("pairs").unwrap();
    pairs.insert(&tuple_from(&[1, 2])).unwrap();
    engine.execute_main().unwrap();

    let acc = engine.relation("acc").unwrap();
    assert_eq!(acc.len().unwrap(), 4);
    assert!(acc.contains(0, &tuple_from(&[2, 1])).unwrap());

    // Pre-link 2 and 5 in the target, merge again: the union closes.
    acc.insert(&tuple_from(&[2, 5])).unwrap();
    engine.execute_main().unwrap();
    assert!(acc.contains(0, &tuple_from(&[1, 5])).unwrap());
    assert!(acc.contains(0, &tuple_from(&[5, 1])).unwrap());
}

#[test]
fn test_separate_classes_stay_apart() {
    let engine = Engine::new(merge_program(), EngineConfig::default()).unwrap();
    let pairs = engine.relation("pairs").unwrap();
    pairs.insert(&tuple_from(&[1, 2])).unwrap();
    pairs.insert(&tuple_from(&[10, 20])).unwrap();
    engine.execute_main().unwrap();

    let eq = engine.relation("eq").unwrap();
    assert_eq!(eq.len().unwrap(), 8);
    assert!(!eq.contains(0, &tuple_from(&[1, 10])).unwrap());
}

#[test]
fn test_scan_yields_all_closure_pairs() {
    let engine = Engine::new(merge_program(), EngineConfig::default()).unwrap();
    let pairs = engine.relation("pairs").unwrap();
    pairs.insert(&tuple_from(&[7, 8])).unwrap();
    engine.execute_main().unwrap();

    let mut seen = engine.relation("eq").unwrap().collect().unwrap();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            tuple_from(&[7, 7]),
            tuple_from(&[7, 8]),
            tuple_from(&[8, 7]),
            tuple_from(&[8, 8])
        ]
    );
}

#[test]
fn test_purge_resets_classes() {
    let engine = Engine::new(merge_program(), EngineConfig::default()).unwrap();
    let pairs = engine.relation("pairs").unwrap();
    pairs.insert(&tuple_from(&[1, 2])).unwrap();
    engine.execute_main().unwrap();

    let eq = engine.relation("eq").unwrap();
    eq.purge();
    assert!(eq.is_empty().unwrap());
    assert!(!eq.contains(0, &tuple_from(&[1, 2])).unwrap());
}
