use std::process;

use tracing::{debug, trace};

use crate::library::command::{Command, CommandOutput, CommandRunner, RunnerError};

/// Runs commands as child processes, blocking until each one exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &Command) -> Result<CommandOutput, RunnerError> {
        debug!(%command, "running");

        let output = process::Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(process::Stdio::null())
            .output()
            .map_err(|source| RunnerError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let output = CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        };

        trace!(code = output.code, stdout = %output.stdout, stderr = %output.stderr);

        Ok(output)
    }
}
