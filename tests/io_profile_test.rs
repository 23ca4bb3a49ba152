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

//! Integration tests for IO statements, profiling, and the external
//! adapter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ramble::ram::{DirectiveMap, Expression, Operation, Program, RelationDecl, Statement};
use ramble::{
    tuple_from, Engine, EngineConfig, ExternalSource, ProfileEvent, Result, Tuple,
};

fn directives(pairs: &[(&str, &str)]) -> DirectiveMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_input_output_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("edge.facts");
    let out_path = dir.path().join("edge.csv");
    std::fs::write(&in_path, "1\t2\n3\t4\n").unwrap();

    let program = Program::new(
        vec![RelationDecl::btree("edge", 2)],
        Statement::seq(vec![
            Statement::Io {
                directives: directives(&[
                    ("operation", "input"),
                    ("IO", "file"),
                    ("filename", in_path.to_str().unwrap()),
                ]),
                relation: "edge".to_string(),
            },
            Statement::Io {
                directives: directives(&[
                    ("operation", "output"),
                    ("IO", "file"),
                    ("filename", out_path.to_str().unwrap()),
                ]),
                relation: "edge".to_string(),
            },
        ]),
    );

    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    engine.execute_main().unwrap();

    assert_eq!(engine.relation("edge").unwrap().len().unwrap(), 2);
    assert_eq!(
        std::fs::read_to_string(&out_path).unwrap(),
        "1\t2\n3\t4\n"
    );
}

#[test]
fn test_missing_input_file_names_the_relation() {
    let program = Program::new(
        vec![RelationDecl::btree("edge", 2)],
        Statement::seq(vec![Statement::Io {
            directives: directives(&[
                ("operation", "input"),
                ("IO", "file"),
                ("filename", "/nonexistent/edge.facts"),
            ]),
            relation: "edge".to_string(),
        }]),
    );

    let engine = Engine::new(program, EngineConfig::default()).unwrap();
    let err = engine.execute_main().unwrap_err();
    assert!(err.to_string().contains("edge"));
}

#[test]
fn test_profile_log_written() {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = dir.path().join("profile.log");

    let program = Program::new(
        vec![RelationDecl::btree("r", 1)],
        Statement::seq(vec![
            Statement::Query(Operation::Insert {
                relation: "r".to_string(),
                values: vec![Expression::number(1)],
            }),
            Statement::LogSize {
                relation: "r".to_string(),
                message: "@size;r".to_string(),
            },
        ]),
    );

    let engine = Engine::new(
        program,
        EngineConfig::new().with_profile(&profile_path),
    )
    .unwrap();
    engine.execute_main().unwrap();

    let log = std::fs::read_to_string(&profile_path).unwrap();
    assert!(log.contains("@time;starttime"));
    assert!(log.contains("@size;r"));
    assert!(log.contains("@relation-reads;r"));
}

#[test]
fn test_estimate_join_size_events() {
    let program = Program::new(
        vec![RelationDecl::btree("r", 2)],
        Statement::seq(vec![Statement::EstimateJoinSize {
            relation: "r".to_string(),
            index_pos: 0,
            key_columns: vec![0],
            constants: vec![],
            recursive: false,
        }]),
    );

    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(
        program,
        EngineConfig::new().with_profile(dir.path().join("p.log")),
    )
    .unwrap();
    let r = engine.relation("r").unwrap();
    // Key column 0 has values 1 (twice) and 2 (once): 3 tuples over 2
    // distinct keys.
    for (a, b) in [(1, 10), (1, 11), (2, 20)] {
        r.insert(&tuple_from(&[a, b])).unwrap();
    }
    engine.execute_main().unwrap();

    let events = engine.profile_events();
    let estimate = events
        .iter()
        .find_map(|e| match e {
            ProfileEvent::NonRecursiveCount { key, value }
                if key.starts_with("@non-recursive-estimate-join-size;r") =>
            {
                Some(*value)
            }
            _ => None,
        })
        .expect("estimate event missing");
    assert_eq!(estimate, 1.5);
}

#[test]
fn test_frequency_counters_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = dir.path().join("freq.log");

    let program = Program::new(
        vec![RelationDecl::btree("src", 1), RelationDecl::btree("dst", 1)],
        Statement::seq(vec![Statement::Query(Operation::Scan {
            relation: "src".to_string(),
            tuple_id: 0,
            nested: Box::new(Operation::Insert {
                relation: "dst".to_string(),
                values: vec![Expression::element(0, 0)],
            }),
            profile_text: Some("dst(x) :- src(x).".to_string()),
        })]),
    );

    let engine = Engine::new(
        program,
        EngineConfig::new()
            .with_profile(&profile_path)
            .with_profile_frequency(),
    )
    .unwrap();
    for i in 0..4 {
        engine.relation("src").unwrap().insert(&tuple_from(&[i])).unwrap();
    }
    engine.execute_main().unwrap();

    let fired = engine.profile_events().into_iter().any(|e| {
        matches!(e, ProfileEvent::Quantity { key, value, .. }
            if key == "dst(x) :- src(x)." && value == 1)
    });
    assert!(fired, "frequency bucket for the rule not recorded");
}

struct CountingSource {
    fetches: AtomicUsize,
}

impl ExternalSource for CountingSource {
    fn fetch(&self) -> Result<Vec<Tuple>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![tuple_from(&[1, 2]), tuple_from(&[3, 4])])
    }
}

#[test]
fn test_shadow_relation_loads_once_and_ignores_inserts() {
    // copy(x, y) :- ext(x, y), with the engine also trying to insert into
    // ext; the source stays authoritative.
    let program = Program::new(
        vec![
            RelationDecl::btree("ext", 2).as_shadow(),
            RelationDecl::btree("copy", 2),
        ],
        Statement::seq(vec![
            Statement::Query(Operation::Insert {
                relation: "ext".to_string(),
                values: vec![Expression::number(9), Expression::number(9)],
            }),
            Statement::Query(Operation::Scan {
                relation: "ext".to_string(),
                tuple_id: 0,
                nested: Box::new(Operation::Insert {
                    relation: "copy".to_string(),
                    values: vec![Expression::element(0, 0), Expression::element(0, 1)],
                }),
                profile_text: None,
            }),
            Statement::Query(Operation::Scan {
                relation: "ext".to_string(),
                tuple_id: 0,
                nested: Box::new(Operation::Insert {
                    relation: "copy".to_string(),
                    values: vec![Expression::element(0, 0), Expression::element(0, 1)],
                }),
                profile_text: None,
            }),
        ]),
    );

    let source = Arc::new(CountingSource {
        fetches: AtomicUsize::new(0),
    });
    let engine = Engine::builder(program, EngineConfig::default())
        .external_source("ext", Arc::clone(&source) as Arc<dyn ExternalSource>)
        .finish()
        .unwrap();
    engine.execute_main().unwrap();

    // One fetch despite two scans and one attempted insert.
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    let mut copied = engine.relation("copy").unwrap().collect().unwrap();
    copied.sort();
    assert_eq!(copied, vec![tuple_from(&[1, 2]), tuple_from(&[3, 4])]);
    assert!(!engine
        .relation("ext")
        .unwrap()
        .contains(0, &tuple_from(&[9, 9]))
        .unwrap());
}
