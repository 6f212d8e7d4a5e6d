use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ProcessCommand, ProcessOutput, ProcessRunner};

/// Scripted stand-in for external tools.
///
/// Expectations are matched in registration order; one registered with
/// `times(n)` stops matching after `n` calls, which lets tests script a
/// failure followed by a success for the same command.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

type ArgsMatcher = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

struct MockExpectation {
    program: String,
    args_matcher: Option<ArgsMatcher>,
    response: ProcessOutput,
    timeout: bool,
    remaining: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: ProcessOutput {
                    code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                },
                timeout: false,
                remaining: None,
            },
        }
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    /// Number of recorded calls whose program matches and whose first
    /// argument equals `subcommand`.
    pub fn count_calls(&self, program: &str, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|cmd| cmd.program == program)
            .filter(|cmd| cmd.args.first().map(String::as_str) == Some(subcommand))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let mut expectations = self.expectations.lock().unwrap();

        for expectation in expectations.iter_mut() {
            if expectation.program != command.program || expectation.remaining == Some(0) {
                continue;
            }

            if let Some(ref args_matcher) = expectation.args_matcher {
                if !(args_matcher)(&command.args) {
                    continue;
                }
            }

            if let Some(remaining) = expectation.remaining.as_mut() {
                *remaining -= 1;
            }

            if expectation.timeout {
                return Err(ProcessError::Timeout {
                    command: command.display(),
                    timeout: command.timeout.unwrap_or(Duration::from_secs(1)),
                });
            }

            return Ok(expectation.response.clone());
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {}",
            command.display()
        )))
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    /// Matches when the first argument equals `subcommand`.
    pub fn subcommand(self, subcommand: &'static str) -> Self {
        self.with_args(move |args| args.first().map(String::as_str) == Some(subcommand))
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
        self.expectation.response.code = Some(code);
        self
    }

    pub fn times_out(mut self) -> Self {
        self.expectation.timeout = true;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.remaining = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}
