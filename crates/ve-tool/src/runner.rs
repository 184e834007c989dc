use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;
use ve_api::{registry_from_sources, spawn_entity, SpawnOptions, SpawnedEntity};
use ve_core::{Event, Terrain};
use ve_runtime::{Entity, EntityOptions, MemoryRegion};
use ve_script::{BehaviorRegistry, ScriptLimits};

use crate::source::{read_behaviors_from_dir, read_test_case};
use crate::{ExpectedEvent, TestCase, VeToolError};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub observed_events: Vec<Event>,
    pub states: BTreeMap<String, Value>,
}

pub fn run_case(example_dir: &Path, case: &TestCase) -> Result<RunReport, VeToolError> {
    let sources = read_behaviors_from_dir(example_dir)?;
    let registry = registry_from_sources(&sources, ScriptLimits::default())?;
    let region = Arc::new(MemoryRegion::new(
        "testcase",
        Terrain::new(case.region.width, case.region.height),
    ));

    let mut spawned = Vec::new();
    let result = drive(case, &registry, &region, &mut spawned);
    for entity in &spawned {
        entity.destroy.destroy();
    }
    result
}

fn drive(
    case: &TestCase,
    registry: &BehaviorRegistry,
    region: &Arc<MemoryRegion>,
    spawned: &mut Vec<SpawnedEntity>,
) -> Result<RunReport, VeToolError> {
    let events = region.subscribe();
    let entity_options =
        EntityOptions::default().with_tick_interval(Duration::from_millis(case.tick_interval_ms));

    for spawn in &case.spawns {
        let entity = spawn_entity(
            registry,
            region,
            SpawnOptions {
                behavior: spawn.behavior.clone(),
                id: spawn.id.clone(),
                position: spawn.position(),
                entity: entity_options.clone(),
            },
        )?;
        spawned.push(entity);
    }

    let states: BTreeMap<String, Value> = spawned
        .iter()
        .map(|entity| {
            let described = serde_json::from_str(&entity.entity.describe()).unwrap_or(Value::Null);
            (entity.id().to_string(), described)
        })
        .collect();

    let mut expected_by_origin: BTreeMap<&str, Vec<&ExpectedEvent>> = BTreeMap::new();
    for expected in &case.expected_events {
        expected_by_origin
            .entry(expected.origin.as_str())
            .or_default()
            .push(expected);
    }
    let mut matched: BTreeMap<&str, usize> = BTreeMap::new();
    let mut observed_events = Vec::new();
    let deadline = Instant::now() + Duration::from_millis(case.timeout_ms);

    while !all_matched(&expected_by_origin, &matched) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(event) = events.recv_timeout(remaining) else {
            let observed = serde_json::to_string(&observed_events)
                .map_err(VeToolError::EventSerialize)?;
            return Err(VeToolError::EventTimeout {
                timeout_ms: case.timeout_ms,
                observed,
            });
        };
        debug!(target: "ve_tool", kind = %event.kind, body = %event.body, "observed event");

        if let Some(origin) = event.origin.as_deref() {
            if let Some((&origin, expected)) = expected_by_origin.get_key_value(origin) {
                let index = matched.entry(origin).or_insert(0);
                if let Some(next) = expected.get(*index) {
                    if next.kind != event.kind || next.body != event.body {
                        let actual = ExpectedEvent {
                            origin: origin.to_string(),
                            kind: event.kind.clone(),
                            body: event.body.clone(),
                        };
                        return Err(VeToolError::EventMismatch {
                            origin: origin.to_string(),
                            index: *index,
                            expected: serde_json::to_string(next)
                                .map_err(VeToolError::EventSerialize)?,
                            actual: serde_json::to_string(&actual)
                                .map_err(VeToolError::EventSerialize)?,
                        });
                    }
                    *index += 1;
                }
            }
        }
        observed_events.push(event);
    }

    Ok(RunReport {
        observed_events,
        states,
    })
}

fn all_matched(
    expected_by_origin: &BTreeMap<&str, Vec<&ExpectedEvent>>,
    matched: &BTreeMap<&str, usize>,
) -> bool {
    expected_by_origin
        .iter()
        .all(|(origin, expected)| matched.get(origin).copied().unwrap_or(0) >= expected.len())
}

pub fn assert_case(example_dir: &Path, case_path: &Path) -> Result<RunReport, VeToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(example_dir, &case)?;

    for expected in &case.expected_states {
        let state = report
            .states
            .get(&expected.id)
            .ok_or_else(|| VeToolError::EntityMissing {
                id: expected.id.clone(),
            })?;
        for (field, expected_value) in &expected.fields {
            let actual = state.get(field).cloned().unwrap_or(Value::Null);
            if !values_match(expected_value, &actual) {
                return Err(VeToolError::StateMismatch {
                    id: expected.id.clone(),
                    field: field.clone(),
                    expected: expected_value.to_string(),
                    actual: actual.to_string(),
                });
            }
        }
    }

    Ok(report)
}

// Script numbers are floats or ints depending on how they were produced, so
// numeric fields compare by value.
fn values_match(expected: &Value, actual: &Value) -> bool {
    match (expected.as_f64(), actual.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => expected == actual,
    }
}

#[cfg(test)]
mod runner_tests {
    use super::*;

    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};
    use ve_core::EventKind;

    use crate::{RegionSpec, SpawnSpec, TESTCASE_SCHEMA_V1};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("ve-tool-runner-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    const GREETER: &str = r#"
        fn setup() { this.count = 0; }
        fn tick(now, elapsed) {
            this.count += 1;
            if this.count <= 2 { sendEvent("cha", `hello ${this.count}`); }
        }
        fn getData() { #{ mood: "cheerful", level: 3 } }
    "#;

    fn greeter_case(expected_events: Vec<ExpectedEvent>) -> TestCase {
        TestCase {
            schema_version: TESTCASE_SCHEMA_V1.to_string(),
            region: RegionSpec::default(),
            tick_interval_ms: 10,
            timeout_ms: 2_000,
            spawns: vec![SpawnSpec {
                behavior: "greeter".to_string(),
                id: Some("g".to_string()),
                x: None,
                y: None,
            }],
            expected_states: Vec::new(),
            expected_events,
        }
    }

    fn chat(body: &str) -> ExpectedEvent {
        ExpectedEvent {
            origin: "g".to_string(),
            kind: EventKind::Chat,
            body: body.to_string(),
        }
    }

    #[test]
    fn run_case_matches_event_prefix() {
        let root = temp_dir("prefix");
        write_file(&root.join("greeter.rhai"), GREETER);

        let case = greeter_case(vec![chat("hello 1"), chat("hello 2")]);
        let report = run_case(&root, &case).expect("run should pass");

        assert_eq!(report.observed_events.len(), 2);
        assert_eq!(report.observed_events[1].body, "hello 2");
        assert_eq!(report.states["g"]["mood"], "cheerful");
    }

    #[test]
    fn run_case_reports_mismatch() {
        let root = temp_dir("mismatch");
        write_file(&root.join("greeter.rhai"), GREETER);

        let case = greeter_case(vec![chat("goodbye")]);
        let error = run_case(&root, &case).expect_err("mismatch should fail");
        assert!(matches!(error, VeToolError::EventMismatch { index: 0, .. }));
    }

    #[test]
    fn run_case_times_out_waiting_for_missing_events() {
        let root = temp_dir("timeout");
        write_file(&root.join("greeter.rhai"), GREETER);

        let mut case = greeter_case(vec![chat("hello 1"), chat("hello 2"), chat("hello 3")]);
        case.timeout_ms = 300;
        let error = run_case(&root, &case).expect_err("third event never comes");
        assert!(matches!(error, VeToolError::EventTimeout { .. }));
    }

    #[test]
    fn run_case_surfaces_runtime_errors() {
        let root = temp_dir("runtime-error");
        write_file(&root.join("greeter.rhai"), "fn setup( {");

        let error = run_case(&root, &greeter_case(Vec::new())).expect_err("compile should fail");
        match error {
            VeToolError::Runtime(error) => assert_eq!(error.code, "SCRIPT_COMPILE"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn assert_case_checks_expected_states() {
        let root = temp_dir("states");
        write_file(&root.join("greeter.rhai"), GREETER);
        write_file(
            &root.join("testcase.json"),
            r#"{
  "schemaVersion": "ve-tool-case.v1",
  "spawns": [{"behavior": "greeter", "id": "g"}],
  "expectedStates": [{"id": "g", "fields": {"level": 3.0, "mood": "cheerful"}}]
}"#,
        );
        assert_case(&root, &root.join("testcase.json")).expect("states should match");

        write_file(
            &root.join("wrong.json"),
            r#"{
  "schemaVersion": "ve-tool-case.v1",
  "spawns": [{"behavior": "greeter", "id": "g"}],
  "expectedStates": [{"id": "nobody", "fields": {}}]
}"#,
        );
        let error = assert_case(&root, &root.join("wrong.json")).expect_err("missing id should fail");
        assert!(matches!(error, VeToolError::EntityMissing { .. }));
    }

    #[test]
    fn numeric_fields_compare_by_value() {
        assert!(values_match(&serde_json::json!(3), &serde_json::json!(3.0)));
        assert!(!values_match(&serde_json::json!(3), &serde_json::json!("3")));
        assert!(values_match(&serde_json::json!("a"), &serde_json::json!("a")));
    }
}
