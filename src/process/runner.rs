use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use super::error::ProcessError;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Variables added to the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// When false, stdout/stderr are inherited instead of captured
    pub capture_output: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            timeout: None,
            capture_output: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.capture_output = false;
        self
    }

    /// Command line as a single string, for logs and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd.envs(command.env.iter().map(|(k, v)| (k, v)));

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        if command.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }

        cmd
    }

    fn spawn_error(command: &ProcessCommand, source: std::io::Error) -> ProcessError {
        if source.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            ProcessError::Io {
                command: command.display(),
                source,
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        match &command.working_dir {
            Some(dir) => debug!("Running command: {} in {}", command.display(), dir.display()),
            None => debug!("Running command: {} in current directory", command.display()),
        }

        let child = Self::configure_command(&command)
            .spawn()
            .map_err(|e| Self::spawn_error(&command, e))?;

        // Dropping the child on timeout kills it (kill_on_drop)
        let wait = child.wait_with_output();
        let output = match command.timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                ProcessError::Timeout {
                    command: command.display(),
                    timeout,
                }
            })?,
            None => wait.await,
        }
        .map_err(|source| ProcessError::Io {
            command: command.display(),
            source,
        })?;

        let output = ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.stdout.trim().is_empty() {
            debug!("Command output: {}", output.stdout.trim());
        }

        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runner_captures_stdout() {
        let command = ProcessCommand::new("echo").arg("hello world");

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello world");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_runner_reports_exit_code() {
        let output = TokioProcessRunner
            .run(ProcessCommand::new("false"))
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.code, Some(1));
    }

    #[tokio::test]
    async fn test_runner_command_not_found() {
        let result = TokioProcessRunner
            .run(ProcessCommand::new("tfcollect-nonexistent-command-12345"))
            .await;

        assert!(matches!(result, Err(ProcessError::CommandNotFound(_))));
    }

    #[tokio::test]
    async fn test_runner_timeout() {
        let command = ProcessCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100));

        let result = TokioProcessRunner.run(command).await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_runner_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let command = ProcessCommand::new("pwd").current_dir(dir.path());

        let output = TokioProcessRunner.run(command).await.unwrap();
        let reported = std::path::PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_runner_passes_extra_env() {
        let command = ProcessCommand::new("sh")
            .args(["-c", "echo $TFCOLLECT_TEST_VAR"])
            .env("TFCOLLECT_TEST_VAR", "pull");

        let output = TokioProcessRunner.run(command).await.unwrap();
        assert_eq!(output.stdout.trim(), "pull");
    }

    #[test]
    fn test_display() {
        let command = ProcessCommand::new("git").args(["clone", "--depth", "1"]);
        assert_eq!(command.display(), "git clone --depth 1");
        assert_eq!(ProcessCommand::new("terraform").display(), "terraform");
    }
}
