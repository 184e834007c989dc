mod case;
mod runner;
mod source;

pub use case::{
    ExpectedEvent, ExpectedState, RegionSpec, SpawnSpec, TestCase, DEFAULT_TIMEOUT_MS,
    TESTCASE_SCHEMA_V1,
};
pub use runner::{assert_case, run_case, RunReport};
pub use source::{read_behaviors_from_dir, read_test_case};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VeToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No .rhai behaviors under {path}.")]
    SourceEmpty { path: PathBuf },
    #[error("Runtime error: {0}")]
    Runtime(#[from] ve_core::VeError),
    #[error("Expected state for entity \"{id}\", but it was not spawned.")]
    EntityMissing { id: String },
    #[error("State mismatch for entity \"{id}\" field \"{field}\". expected={expected} actual={actual}")]
    StateMismatch {
        id: String,
        field: String,
        expected: String,
        actual: String,
    },
    #[error("Event mismatch from \"{origin}\" at index {index}. expected={expected} actual={actual}")]
    EventMismatch {
        origin: String,
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("Expected events did not arrive within {timeout_ms}ms. observed={observed}")]
    EventTimeout { timeout_ms: u64, observed: String },
    #[error("Failed to serialize event for diff: {0}")]
    EventSerialize(serde_json::Error),
}
