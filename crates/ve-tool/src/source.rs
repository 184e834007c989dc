use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ve_script::BEHAVIOR_EXTENSION;
use walkdir::WalkDir;

use crate::{TestCase, VeToolError, TESTCASE_SCHEMA_V1};

// Behavior sources keyed by file stem.
pub fn read_behaviors_from_dir(
    example_dir: &Path,
) -> Result<BTreeMap<String, String>, VeToolError> {
    let mut behaviors = BTreeMap::new();

    for entry in WalkDir::new(example_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(BEHAVIOR_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        let content = fs::read_to_string(path).map_err(|source| VeToolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        behaviors.insert(name.to_string(), content);
    }

    if behaviors.is_empty() {
        return Err(VeToolError::SourceEmpty {
            path: example_dir.to_path_buf(),
        });
    }

    Ok(behaviors)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, VeToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| VeToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| VeToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(VeToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod source_tests {
    use super::*;

    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("ve-tool-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    #[test]
    fn read_behaviors_from_dir_keys_by_file_stem() {
        let root = temp_dir("behaviors");
        write_file(&root.join("homely.rhai"), "fn setup() {}");
        write_file(&root.join("more/trader.rhai"), "fn setup() {}");
        write_file(&root.join("testcase.json"), "{}");

        let behaviors = read_behaviors_from_dir(&root).expect("scan should pass");
        assert_eq!(behaviors.len(), 2);
        assert!(behaviors.contains_key("homely"));
        assert!(behaviors.contains_key("trader"));
    }

    #[test]
    fn read_behaviors_from_dir_fails_when_no_behaviors() {
        let root = temp_dir("empty");
        write_file(&root.join("ignore.txt"), "skip");

        let error = read_behaviors_from_dir(&root).expect_err("empty source should fail");
        assert!(matches!(error, VeToolError::SourceEmpty { .. }));
    }

    #[test]
    fn read_test_case_parses_valid_json() {
        let root = temp_dir("case-ok");
        let case_path = root.join("testcase.json");
        write_file(
            &case_path,
            r#"{
  "schemaVersion":"ve-tool-case.v1",
  "spawns":[{"behavior":"homely","id":"h","x":1,"y":2}],
  "expectedEvents":[{"origin":"h","kind":"cha","body":"hello"}]
}"#,
        );

        let parsed = read_test_case(&case_path).expect("case should parse");
        assert_eq!(parsed.spawns[0].id.as_deref(), Some("h"));
        assert_eq!(parsed.expected_events.len(), 1);
    }

    #[test]
    fn read_test_case_reports_read_parse_and_schema_errors() {
        let root = temp_dir("case-errors");
        let missing = read_test_case(&root.join("missing.json")).expect_err("missing should fail");
        assert!(matches!(missing, VeToolError::ReadFile { .. }));

        let bad_json_path = root.join("bad.json");
        write_file(&bad_json_path, "{");
        let parse_error = read_test_case(&bad_json_path).expect_err("parse should fail");
        assert!(matches!(parse_error, VeToolError::ParseCase { .. }));

        let bad_schema_path = root.join("bad-schema.json");
        write_file(
            &bad_schema_path,
            r#"{"schemaVersion":"ve-tool-case.v0","spawns":[]}"#,
        );
        let schema_error = read_test_case(&bad_schema_path).expect_err("schema should fail");
        assert!(matches!(
            schema_error,
            VeToolError::InvalidSchemaVersion { .. }
        ));
    }
}
