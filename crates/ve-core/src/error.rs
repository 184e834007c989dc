use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct VeError {
    pub code: String,
    pub message: String,
}

impl VeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn display_joins_code_and_message() {
        let error = VeError::new("BEHAVIOR_NOT_FOUND", "Behavior \"wolf\" is not registered.");
        assert_eq!(
            error.to_string(),
            "BEHAVIOR_NOT_FOUND: Behavior \"wolf\" is not registered."
        );
    }
}
