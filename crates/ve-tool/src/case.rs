use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ve_core::EventKind;

pub const TESTCASE_SCHEMA_V1: &str = "ve-tool-case.v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default)]
    pub region: RegionSpec,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub spawns: Vec<SpawnSpec>,
    #[serde(default)]
    pub expected_states: Vec<ExpectedState>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
}

fn default_tick_interval_ms() -> u64 {
    20
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for RegionSpec {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub behavior: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl SpawnSpec {
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (None, None) => None,
            (x, y) => Some((x.unwrap_or(0.0), y.unwrap_or(0.0))),
        }
    }
}

// Only the listed fields are compared; the rest of the entity state is free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedState {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEvent {
    pub origin: String,
    pub kind: EventKind,
    pub body: String,
}
