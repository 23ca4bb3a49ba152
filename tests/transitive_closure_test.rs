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

//! Integration test for seminaive fixpoint evaluation: transitive closure

use ramble::ram::{
    Condition, Expression, Operation, Program, RelationDecl, SearchPattern, Statement,
};
use ramble::{tuple_from, Engine, EngineConfig, RamDomain, Tuple};

/// The classic program:
///
/// ```text
/// path(x, y) :- edge(x, y).
/// path(x, z) :- path(x, y), edge(y, z).
/// ```
///
/// lowered the way the front-end does it: `path` seeded from `edge`, then
/// a loop joining the delta against `edge`, exiting once no new tuple
/// shows up.
fn transitive_closure_program(parallel: bool) -> Program {
    let copy_edge_to_path = Statement::Query(Operation::Scan {
        relation: "edge".to_string(),
        tuple_id: 0,
        nested: Box::new(Operation::Insert {
            relation: "path".to_string(),
            values: vec![Expression::element(0, 0), Expression::element(0, 1)],
        }),
        profile_text: None,
    });

    let seed_delta = Statement::Query(Operation::Scan {
        relation: "path".to_string(),
        tuple_id: 0,
        nested: Box::new(Operation::Insert {
            relation: "@delta_path".to_string(),
            values: vec![Expression::element(0, 0), Expression::element(0, 1)],
        }),
        profile_text: None,
    });

    // @new_path(x, z) :- @delta_path(x, y), edge(y, z), !path(x, z).
    let join_inner = Operation::IndexScan {
        relation: "edge".to_string(),
        index_pos: 0,
        pattern: SearchPattern::point(vec![Some(Expression::element(0, 1)), None]),
        tuple_id: 1,
        nested: Box::new(Operation::Filter {
            condition: Condition::Negation(Box::new(Condition::ExistenceCheck {
                relation: "path".to_string(),
                index_pos: 0,
                pattern: vec![
                    Some(Expression::element(0, 0)),
                    Some(Expression::element(1, 1)),
                ],
            })),
            nested: Box::new(Operation::Insert {
                relation: "@new_path".to_string(),
                values: vec![Expression::element(0, 0), Expression::element(1, 1)],
            }),
            profile_text: None,
        }),
        profile_text: None,
    };
    let join = if parallel {
        Operation::ParallelScan {
            relation: "@delta_path".to_string(),
            tuple_id: 0,
            nested: Box::new(join_inner),
            profile_text: None,
        }
    } else {
        Operation::Scan {
            relation: "@delta_path".to_string(),
            tuple_id: 0,
            nested: Box::new(join_inner),
            profile_text: None,
        }
    };

    let merge_new_into_path = Statement::Query(Operation::Scan {
        relation: "@new_path".to_string(),
        tuple_id: 0,
        nested: Box::new(Operation::Insert {
            relation: "path".to_string(),
            values: vec![Expression::element(0, 0), Expression::element(0, 1)],
        }),
        profile_text: None,
    });

    let fixpoint = Statement::repeat(Statement::seq(vec![
        Statement::Query(join),
        Statement::Exit(Condition::EmptinessCheck {
            relation: "@new_path".to_string(),
        }),
        merge_new_into_path,
        Statement::Swap("@delta_path".to_string(), "@new_path".to_string()),
        Statement::Clear("@new_path".to_string()),
    ]));

    Program::new(
        vec![
            RelationDecl::btree("edge", 2),
            RelationDecl::btree("path", 2),
            RelationDecl::btree("@delta_path", 2),
            RelationDecl::btree("@new_path", 2),
        ],
        Statement::seq(vec![copy_edge_to_path, seed_delta, fixpoint]),
    )
}

fn run_closure(edges: &[(RamDomain, RamDomain)], parallel: bool, threads: usize) -> Vec<Tuple> {
    let config = EngineConfig::new().with_threads(threads);
    let engine = Engine::new(transitive_closure_program(parallel), config).unwrap();
    let edge = engine.relation("edge").unwrap();
    for (a, b) in edges {
        edge.insert(&tuple_from(&[*a, *b])).unwrap();
    }
    engine.execute_main().unwrap();
    let mut result = engine.relation("path").unwrap().collect().unwrap();
    result.sort();
    result
}

#[test]
fn test_chain_closure() {
    let result = run_closure(&[(1, 2), (2, 3), (3, 4)], false, 1);
    let expected: Vec<Tuple> = [(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)]
        .iter()
        .map(|(a, b)| tuple_from(&[*a, *b]))
        .collect();
    assert_eq!(result, expected);
}

#[test]
fn test_cycle_closure() {
    // A 3-cycle reaches everything from everywhere.
    let result = run_closure(&[(1, 2), (2, 3), (3, 1)], false, 1);
    assert_eq!(result.len(), 9);
}

#[test]
fn test_empty_edge_set() {
    let result = run_closure(&[], false, 1);
    assert!(result.is_empty());
}

#[test]
fn test_self_loop() {
    let result = run_closure(&[(5, 5)], false, 1);
    assert_eq!(result, vec![tuple_from(&[5, 5])]);
}

#[test]
fn test_closure_is_fixpoint() {
    // Running the whole program again must not grow the result.
    let program = transitive_closure_program(false);
    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    let edge = engine.relation("edge").unwrap();
    for (a, b) in [(1, 2), (2, 3), (3, 4)] {
        edge.insert(&tuple_from(&[a, b])).unwrap();
    }
    engine.execute_main().unwrap();
    let first = engine.relation("path").unwrap().len().unwrap();
    engine.execute_main().unwrap();
    assert_eq!(engine.relation("path").unwrap().len().unwrap(), first);
}

#[test]
fn test_swap_twice_is_identity() {
    let program = transitive_closure_program(false);
    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    let delta = engine.relation("@delta_path").unwrap();
    let new = engine.relation("@new_path").unwrap();
    delta.insert(&tuple_from(&[1, 2])).unwrap();
    new.insert(&tuple_from(&[3, 4])).unwrap();
    new.insert(&tuple_from(&[5, 6])).unwrap();

    delta.swap_contents(new);
    delta.swap_contents(new);

    assert_eq!(delta.len().unwrap(), 1);
    assert!(delta.contains(0, &tuple_from(&[1, 2])).unwrap());
    assert_eq!(new.len().unwrap(), 2);
}

#[test]
fn test_parallel_closure_matches_sequential() {
    let edges = [(1, 2), (2, 3), (3, 4), (4, 5), (1, 5), (5, 1)];
    let sequential = run_closure(&edges, false, 1);
    let parallel = run_closure(&edges, true, 4);
    assert_eq!(sequential, parallel);
}
