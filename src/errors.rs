//! Typed error hierarchy for stepwise.
//!
//! Three top-level enums cover the three layers:
//! - `StrategyError`: a single step's command failed or could not start
//! - `PipelineError`: sequential runner failures
//! - `PlanError`: plan file loading and validation failures

use std::path::PathBuf;

use thiserror::Error;

use crate::step::StrategyKind;

/// Errors from executing one step under a progress strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Failed to spawn command `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command `{command}` exited with code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },
}

impl StrategyError {
    /// Exit code of the failed command, if it ran at all.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StrategyError::CommandFailed { exit_code, .. } => Some(*exit_code),
            StrategyError::SpawnFailed { .. } => None,
        }
    }
}

/// Errors from the pipeline runner.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Plan contains no steps")]
    EmptyPlan,

    #[error("Step index {index} is out of range for a pipeline of {total} steps")]
    InvalidContext { index: usize, total: usize },

    #[error("No strategy registered for kind '{kind}'")]
    UnregisteredStrategy { kind: StrategyKind },

    #[error("Step {} ({name}) failed: {source}", .index + 1)]
    StepFailed {
        index: usize,
        name: String,
        #[source]
        source: StrategyError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Errors from loading or validating a plan file.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Failed to read plan file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse plan: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Invalid plan: {0}")]
    Invalid(String),

    #[error("Step '{step}' references unknown variable '{name}'")]
    UnknownVariable { step: String, name: String },

    #[error("Invalid engine setting '{setting}': {message}")]
    InvalidEngine { setting: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_error_command_failed_carries_exit_code() {
        let err = StrategyError::CommandFailed {
            command: "npm install".to_string(),
            exit_code: 127,
        };
        assert_eq!(err.exit_code(), Some(127));
        let message = err.to_string();
        assert!(message.contains("npm install"));
        assert!(message.contains("127"));
    }

    #[test]
    fn strategy_error_spawn_failed_has_no_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "sh not found");
        let err = StrategyError::SpawnFailed {
            command: "git clone".to_string(),
            source: io_err,
        };
        assert_eq!(err.exit_code(), None);
        match &err {
            StrategyError::SpawnFailed { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected SpawnFailed variant"),
        }
    }

    #[test]
    fn pipeline_error_step_failed_uses_one_based_index() {
        let err = PipelineError::StepFailed {
            index: 1,
            name: "Clone component".to_string(),
            source: StrategyError::CommandFailed {
                command: "git clone x".to_string(),
                exit_code: 128,
            },
        };
        let message = err.to_string();
        assert!(message.starts_with("Step 2 (Clone component) failed"));
        assert!(message.contains("128"));
    }

    #[test]
    fn pipeline_error_converts_from_plan_error() {
        let inner = PlanError::Invalid("no steps".to_string());
        let err: PipelineError = inner.into();
        assert!(matches!(err, PipelineError::Plan(PlanError::Invalid(_))));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StrategyError::CommandFailed {
            command: "x".into(),
            exit_code: 1,
        });
        assert_std_error(&PipelineError::EmptyPlan);
        assert_std_error(&PlanError::Invalid("x".into()));
    }
}
