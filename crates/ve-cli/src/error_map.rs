use std::fmt::Display;

use ve_core::VeError;
use ve_tool::VeToolError;

fn map_error(code: &'static str, error: impl Display) -> VeError {
    VeError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: VeError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
    );
    1
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> VeError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_tool_error(error: VeToolError) -> VeError {
    let code = match &error {
        VeToolError::Runtime(inner) => return inner.clone(),
        VeToolError::ReadFile { .. } => "CASE_READ",
        VeToolError::ParseCase { .. } => "CASE_PARSE",
        VeToolError::InvalidSchemaVersion { .. } => "CASE_SCHEMA",
        VeToolError::SourceEmpty { .. } => "CASE_SOURCE_EMPTY",
        VeToolError::EntityMissing { .. } => "CASE_ENTITY_MISSING",
        VeToolError::StateMismatch { .. } => "CASE_STATE_MISMATCH",
        VeToolError::EventMismatch { .. } => "CASE_EVENT_MISMATCH",
        VeToolError::EventTimeout { .. } => "CASE_EVENT_TIMEOUT",
        VeToolError::EventSerialize(_) => "CASE_EVENT_SERIALIZE",
    };
    map_error(code, error)
}
