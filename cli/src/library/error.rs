use thiserror::Error;
use zsnap_library::{record::RecordError, tabular::TabularError};
use zsnap_runner::library::{RunnerError, preflight::PreflightError};

#[derive(Debug, Error)]
pub enum ZsnapError {
    #[error("invalid options: {0}")]
    Configuration(String),

    #[error("`{command}` failed ({}): {message}", describe_exit(.exit_code))]
    SubsystemUnavailable {
        command: String,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("device name not found: {0}")]
    VolumeNotFound(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("illegal target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("snapshot creation failed for {target}: {exit_code}\n  reason = \"{message}\"")]
    CreateFailed {
        target: String,
        exit_code: i32,
        message: String,
    },

    #[error("snapshot destroy failed for {target}: {exit_code}\n  reason = \"{message}\"")]
    DestroyFailed {
        target: String,
        exit_code: i32,
        message: String,
    },

    #[error("unexpected output from `{command}`: {source}")]
    MalformedOutput {
        command: String,
        #[source]
        source: TabularError,
    },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Preflight(#[from] PreflightError),
}

impl ZsnapError {
    pub fn invalid_target(target: &str, reason: &str) -> Self {
        ZsnapError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<RunnerError> for ZsnapError {
    fn from(error: RunnerError) -> Self {
        let command = match &error {
            RunnerError::Spawn { command, .. } => command.clone(),
            RunnerError::Unscripted(command) => command.clone(),
        };

        ZsnapError::SubsystemUnavailable {
            command,
            exit_code: None,
            message: error.to_string(),
        }
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit {}", code),
        None => "not started".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ZsnapError>;
