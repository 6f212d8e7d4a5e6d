mod git;
mod terraform;

pub use git::GitClient;
pub use terraform::TerraformClient;

use log::{debug, error};
use std::time::Duration;

use crate::error::{CollectError, Result};
use crate::process::{ProcessCommand, ProcessOutput, ProcessRunner};

/// Returns true if `program --version` exits successfully within `timeout`.
pub async fn is_available(runner: &dyn ProcessRunner, program: &str, timeout: Duration) -> bool {
    let command = ProcessCommand::new(program).arg("--version").timeout(timeout);

    match runner.run(command).await {
        Ok(output) if output.success() => {
            debug!("{program} is available: {}", output.stdout.lines().next().unwrap_or(""));
            true
        }
        Ok(output) => {
            debug!("{program} --version exited with {:?}", output.code);
            false
        }
        Err(e) => {
            debug!("{program} is not available: {e}");
            false
        }
    }
}

/// Checks every program and logs the ones that are missing.
pub async fn check_prerequisites(
    runner: &dyn ProcessRunner,
    programs: &[&str],
    timeout: Duration,
) -> bool {
    let mut missing = Vec::new();
    for program in programs {
        if !is_available(runner, program, timeout).await {
            missing.push(*program);
        }
    }

    if missing.is_empty() {
        return true;
    }

    error!("Missing required tools: {}", missing.join(", "));
    error!("Please ensure they are installed and available in PATH");
    false
}

/// Runs a command and turns a non-zero exit into [`CollectError::CommandFailed`].
pub(crate) async fn run_checked(
    runner: &dyn ProcessRunner,
    command: ProcessCommand,
) -> Result<ProcessOutput> {
    let display = command.display();
    let output = runner.run(command).await?;

    if output.success() {
        Ok(output)
    } else {
        Err(CollectError::CommandFailed {
            command: display,
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::mock::MockProcessRunner;

    #[tokio::test]
    async fn test_prerequisites_all_present() {
        let mock = MockProcessRunner::new();
        mock.expect_command("git").returns_stdout("git version 2.44.0").finish();
        mock.expect_command("terraform").returns_stdout("Terraform v1.7.5").finish();

        assert!(check_prerequisites(&mock, &["terraform", "git"], Duration::from_secs(10)).await);

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.args == vec!["--version"]));
        assert!(calls.iter().all(|c| c.timeout == Some(Duration::from_secs(10))));
    }

    #[tokio::test]
    async fn test_prerequisites_missing_tool() {
        let mock = MockProcessRunner::new();
        mock.expect_command("git").finish();

        // no expectation for terraform: the mock errors like a missing binary
        assert!(!check_prerequisites(&mock, &["terraform", "git"], Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_tool_timing_out_is_unavailable() {
        let mock = MockProcessRunner::new();
        mock.expect_command("terraform").times_out().finish();

        assert!(!is_available(&mock, "terraform", Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn test_run_checked_reports_stderr() {
        let mock = MockProcessRunner::new();
        mock.expect_command("git")
            .returns_exit_code(128)
            .returns_stderr("fatal: repository not found\n")
            .finish();

        let err = run_checked(&mock, ProcessCommand::new("git").arg("fetch"))
            .await
            .unwrap_err();

        match err {
            CollectError::CommandFailed { command, code, stderr } => {
                assert_eq!(command, "git fetch");
                assert_eq!(code, Some(128));
                assert_eq!(stderr, "fatal: repository not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
