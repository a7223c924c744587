//! Checks run once before any subsystem command is issued.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("this program is only supported on Unix systems")]
    UnsupportedPlatform,

    #[error("this program only works as root (running as `{0}`)")]
    NotRoot(String),

    #[error("`{0}` command not found")]
    ProgramMissing(String),
}

pub fn ensure_unix() -> Result<(), PreflightError> {
    match cfg!(unix) {
        true => Ok(()),
        false => Err(PreflightError::UnsupportedPlatform),
    }
}

pub fn ensure_root() -> Result<(), PreflightError> {
    ensure_user(&whoami::username(), "root")
}

fn ensure_user(actual: &str, required: &str) -> Result<(), PreflightError> {
    match actual == required {
        true => Ok(()),
        false => Err(PreflightError::NotRoot(actual.to_string())),
    }
}

/// Resolves every program on `PATH` (or as given, when it is a path).
pub fn ensure_programs(programs: &[&str]) -> Result<Vec<PathBuf>, PreflightError> {
    programs
        .iter()
        .map(|program| {
            let path = which::which(program)
                .map_err(|_| PreflightError::ProgramMissing(program.to_string()))?;

            debug!(program, path = %path.display(), "found");

            Ok(path)
        })
        .collect()
}
