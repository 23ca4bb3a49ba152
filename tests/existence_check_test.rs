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

//! Integration tests for existence checks and query staging

use ramble::ram::{Condition, Expression, Operation, Program, RelationDecl, Statement};
use ramble::{tuple_from, Engine, EngineConfig, RamDomain};

/// `marker(tag) :- exists r(pattern)` with the existence check sitting in
/// the query's outer filter.
fn existence_program(pattern: Vec<Option<Expression>>, tag: RamDomain) -> Program {
    Program::new(
        vec![RelationDecl::btree("r", 3), RelationDecl::btree("marker", 1)],
        Statement::seq(vec![Statement::Query(Operation::Filter {
            condition: Condition::ExistenceCheck {
                relation: "r".to_string(),
                index_pos: 0,
                pattern,
            },
            nested: Box::new(Operation::Insert {
                relation: "marker".to_string(),
                values: vec![Expression::number(tag)],
            }),
            profile_text: None,
        })]),
    )
}

fn run_with_r(program: Program) -> Engine {
    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    let r = engine.relation("r").unwrap();
    for row in [[1, 2, 3], [1, 4, 5], [2, 2, 2]] {
        r.insert(&tuple_from(&row)).unwrap();
    }
    engine.execute_main().unwrap();
    engine
}

#[test]
fn test_partial_key_hit() {
    // exists r(1, _, _)
    let engine = run_with_r(existence_program(
        vec![Some(Expression::number(1)), None, None],
        7,
    ));
    assert_eq!(
        engine.relation("marker").unwrap().collect().unwrap(),
        vec![tuple_from(&[7])]
    );
}

#[test]
fn test_partial_key_miss() {
    // exists r(3, _, _)
    let engine = run_with_r(existence_program(
        vec![Some(Expression::number(3)), None, None],
        7,
    ));
    assert!(engine.relation("marker").unwrap().is_empty().unwrap());
}

#[test]
fn test_total_key() {
    let engine = run_with_r(existence_program(
        vec![
            Some(Expression::number(1)),
            Some(Expression::number(4)),
            Some(Expression::number(5)),
        ],
        1,
    ));
    assert_eq!(engine.relation("marker").unwrap().len().unwrap(), 1);

    let engine = run_with_r(existence_program(
        vec![
            Some(Expression::number(1)),
            Some(Expression::number(4)),
            Some(Expression::number(6)),
        ],
        1,
    ));
    assert!(engine.relation("marker").unwrap().is_empty().unwrap());
}

#[test]
fn test_middle_column_pattern() {
    // exists r(_, 2, _) matches (1,2,3) and (2,2,2).
    let engine = run_with_r(existence_program(
        vec![None, Some(Expression::number(2)), None],
        9,
    ));
    assert_eq!(engine.relation("marker").unwrap().len().unwrap(), 1);
}

#[test]
fn test_scan_agrees_with_contains() {
    // Everything a scan visits answers contains(), and vice versa.
    let engine = run_with_r(existence_program(
        vec![Some(Expression::number(1)), None, None],
        0,
    ));
    let r = engine.relation("r").unwrap();
    for tuple in r.collect().unwrap() {
        assert!(r.contains(0, &tuple).unwrap());
    }
    assert!(!r.contains(0, &tuple_from(&[9, 9, 9])).unwrap());
}

#[test]
fn test_negated_existence_as_set_difference() {
    // diff(x) :- a(x), !b(x).
    let program = Program::new(
        vec![
            RelationDecl::btree("a", 1),
            RelationDecl::btree("b", 1),
            RelationDecl::btree("diff", 1),
        ],
        Statement::seq(vec![Statement::Query(Operation::Scan {
            relation: "a".to_string(),
            tuple_id: 0,
            nested: Box::new(Operation::Filter {
                condition: Condition::Negation(Box::new(Condition::ExistenceCheck {
                    relation: "b".to_string(),
                    index_pos: 0,
                    pattern: vec![Some(Expression::element(0, 0))],
                })),
                nested: Box::new(Operation::Insert {
                    relation: "diff".to_string(),
                    values: vec![Expression::element(0, 0)],
                }),
                profile_text: None,
            }),
            profile_text: None,
        })]),
    );

    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    for x in [1, 2, 3, 4] {
        engine.relation("a").unwrap().insert(&tuple_from(&[x])).unwrap();
    }
    for x in [2, 4] {
        engine.relation("b").unwrap().insert(&tuple_from(&[x])).unwrap();
    }
    engine.execute_main().unwrap();

    let mut diff = engine.relation("diff").unwrap().collect().unwrap();
    diff.sort();
    assert_eq!(diff, vec![tuple_from(&[1]), tuple_from(&[3])]);
}

#[test]
fn test_emptiness_check_short_circuits_query() {
    // The query body never runs when the guarded relation is empty.
    let program = Program::new(
        vec![
            RelationDecl::btree("guard", 1),
            RelationDecl::btree("out", 1),
        ],
        Statement::seq(vec![Statement::Query(Operation::Filter {
            condition: Condition::Negation(Box::new(Condition::EmptinessCheck {
                relation: "guard".to_string(),
            })),
            nested: Box::new(Operation::Insert {
                relation: "out".to_string(),
                values: vec![Expression::number(1)],
            }),
            profile_text: None,
        })]),
    );

    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    engine.execute_main().unwrap();
    assert!(engine.relation("out").unwrap().is_empty().unwrap());

    engine
        .relation("guard")
        .unwrap()
        .insert(&tuple_from(&[1]))
        .unwrap();
    engine.execute_main().unwrap();
    assert_eq!(engine.relation("out").unwrap().len().unwrap(), 1);
}

#[test]
fn test_if_exists_fires_once() {
    // witness(x) :- r(x, _, _), x > 1, picking a single witness.
    let program = Program::new(
        vec![
            RelationDecl::btree("r", 3),
            RelationDecl::btree("witness", 1),
        ],
        Statement::seq(vec![Statement::Query(Operation::IfExists {
            relation: "r".to_string(),
            tuple_id: 0,
            condition: Condition::constraint(
                ramble::ram::ConstraintOp::Gt,
                Expression::element(0, 0),
                Expression::number(1),
            ),
            nested: Box::new(Operation::Insert {
                relation: "witness".to_string(),
                values: vec![Expression::element(0, 0)],
            }),
            profile_text: None,
        })]),
    );

    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    let r = engine.relation("r").unwrap();
    for row in [[1, 2, 3], [2, 2, 2], [3, 1, 1]] {
        r.insert(&tuple_from(&row)).unwrap();
    }
    engine.execute_main().unwrap();

    // Exactly one witness, the first in scan order that passes.
    assert_eq!(
        engine.relation("witness").unwrap().collect().unwrap(),
        vec![tuple_from(&[2])]
    );
}
