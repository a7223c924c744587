use std::sync::{Arc, Mutex};

use crate::library::command::{Command, CommandOutput, CommandRunner, RunnerError};

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send>;

/// A [`CommandRunner`] answering from scripted expectations.
///
/// Expectations are tried in the order they were added. One limited with
/// [`MockExpectation::times`] stops matching once used up, which lets a later
/// expectation for the same command describe the state after a mutation.
#[derive(Clone, Default)]
pub struct MockRunner {
    expectations: Arc<Mutex<Vec<Expectation>>>,
    history: Arc<Mutex<Vec<Command>>>,
}

struct Expectation {
    program: String,
    args_matcher: Option<ArgsMatcher>,
    response: CommandOutput,
    times_called: usize,
    limit: Option<usize>,
}

pub struct MockExpectation {
    runner: MockRunner,
    expectation: Expectation,
}

impl MockRunner {
    pub fn new() -> Self {
        MockRunner::default()
    }

    pub fn expect(&self, program: &str) -> MockExpectation {
        MockExpectation {
            runner: self.clone(),
            expectation: Expectation {
                program: program.to_string(),
                args_matcher: None,
                response: CommandOutput {
                    code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                },
                times_called: 0,
                limit: None,
            },
        }
    }

    pub fn calls(&self) -> Vec<Command> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Number of recorded calls to `program` whose first argument is `subcommand`.
    pub fn count(&self, program: &str, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program == program && c.args.first().is_some_and(|a| a == subcommand))
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &Command) -> Result<CommandOutput, RunnerError> {
        if let Ok(mut history) = self.history.lock() {
            history.push(command.clone());
        }

        let mut expectations = self
            .expectations
            .lock()
            .map_err(|_| RunnerError::Unscripted(command.to_string()))?;

        let found = expectations.iter_mut().find(|e| {
            e.program == command.program
                && e.limit.is_none_or(|limit| e.times_called < limit)
                && e.args_matcher
                    .as_ref()
                    .is_none_or(|matcher| matcher(command.args.as_slice()))
        });

        match found {
            Some(expectation) => {
                expectation.times_called += 1;
                Ok(expectation.response.clone())
            }
            None => Err(RunnerError::Unscripted(command.to_string())),
        }
    }
}

impl MockExpectation {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    /// Matches when the arguments are exactly `args`.
    pub fn with_exact_args(self, args: &[&str]) -> Self {
        let expected = args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        self.with_args(move |actual| actual == expected.as_slice())
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.code = code;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.limit = Some(n);
        self
    }

    pub fn finish(self) {
        if let Ok(mut expectations) = self.runner.expectations.lock() {
            expectations.push(self.expectation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_expectation_answers() {
        let mock = MockRunner::new();
        mock.expect("zfs")
            .with_exact_args(&["list", "-t", "snapshot"])
            .returns_stdout("NAME\n")
            .finish();
        mock.expect("zfs").returns_exit_code(1).finish();

        let listed = mock
            .run(&Command::new("zfs").args(["list", "-t", "snapshot"]))
            .unwrap();
        let other = mock.run(&Command::new("zfs").arg("destroy")).unwrap();

        assert_eq!(listed.stdout, "NAME\n");
        assert!(listed.success());
        assert_eq!(other.code, 1);
        assert_eq!(mock.calls().len(), 2);
        assert_eq!(mock.count("zfs", "destroy"), 1);
    }

    #[test]
    fn limited_expectations_give_way_to_later_ones() {
        let mock = MockRunner::new();
        mock.expect("zpool").returns_stdout("before").times(1).finish();
        mock.expect("zpool").returns_stdout("after").finish();

        let command = Command::new("zpool").arg("list");

        assert_eq!(mock.run(&command).unwrap().stdout, "before");
        assert_eq!(mock.run(&command).unwrap().stdout, "after");
        assert_eq!(mock.run(&command).unwrap().stdout, "after");
    }

    #[test]
    fn unscripted_commands_fail_but_are_recorded() {
        let mock = MockRunner::new();

        let error = mock.run(&Command::new("zfs").arg("snapshot")).unwrap_err();

        assert!(matches!(error, RunnerError::Unscripted(c) if c == "zfs snapshot"));
        assert_eq!(mock.count("zfs", "snapshot"), 1);
    }
}
