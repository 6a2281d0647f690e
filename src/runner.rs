//! External runner invocation and exit-code classification.
//!
//! The runner is an opaque subprocess with a structured exit-code
//! contract: 0 means every test passed, 5 means there were no tests to
//! run, 255 means the configured project does not exist, and anything
//! else means at least one test failed. Its optional markdown summary is
//! read best-effort from a fixed report path.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write as _};
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::api::RunState;

/// Description reported when the run produced no failures.
pub const SUCCESS_DESCRIPTION: &str = "All tests successfully passed";
/// Description reported when at least one test failed.
pub const FAILURE_DESCRIPTION: &str = "One or more tests had failed";

/// Route under the app URL linking to a run's regression report.
const REGRESSIONS_ROUTE: &str = "regressions";

const NO_TESTS_EXIT_CODE: i32 = 5;
const PROJECT_MISSING_EXIT_CODE: i32 = 255;

const DEFAULT_RUNNER_COMMAND: &str = "snowmate_runner";
const DEFAULT_REPORT_PATH: &str = "/tmp/snowmate_result.md";

/// Errors raised while launching the runner subprocess.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// The shell hosting the runner could not be spawned.
    #[error("failed to launch runner: {message}")]
    Spawn {
        /// Error detail from the operating system.
        message: String,
    },
}

/// Builds the details URL for a run's regression report.
#[must_use]
pub fn details_url(app_url: &str, project_id: &str, run_id: u64) -> String {
    format!(
        "{}/{REGRESSIONS_ROUTE}/{project_id}/{run_id}",
        app_url.trim_end_matches('/')
    )
}

/// Everything the runner invocation needs, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerRequest {
    /// Project subdirectory the shell changes into before running.
    pub project_path: String,
    /// Snowmate project identifier.
    pub project_id: String,
    /// API client identifier forwarded to the runner.
    pub client_id: String,
    /// API secret key forwarded to the runner.
    pub secret_key: String,
    /// Workflow run identifier supplied by the CI platform.
    pub run_id: u64,
    /// Absolute path of the project inside the ephemeral clone.
    pub cloned_project_dir: Utf8PathBuf,
    /// Absolute path of the project inside the CI workspace.
    pub project_root_dir: Utf8PathBuf,
    /// Link to the run's regression report.
    pub details_url: String,
    /// Pull request number, `-1` when the event did not carry one.
    pub pull_request_number: i64,
    /// Caller-supplied flags appended verbatim.
    pub additional_flags: Option<String>,
    /// Explicit API URL override forwarded via `--api-url`.
    pub api_url_override: Option<String>,
    /// Explicit auth URL override forwarded via `--auth-url`.
    pub auth_url_override: Option<String>,
    /// Workspace root the shell starts in.
    pub workspace: Utf8PathBuf,
}

impl RunnerRequest {
    /// Renders the single shell invocation for this request.
    ///
    /// The flag order is part of the external contract and must not be
    /// reordered; URL overrides are appended only when configured.
    #[must_use]
    pub fn command_line(&self, runner_command: &str) -> String {
        let mut command = format!(
            "cd {} && {} run --project-id {} --client-id {} --secret-key {} \
             --workflow-run-id {} --cloned-repo-dir {} --project-root-path {} \
             --details-url {} --pull-request-number {} {}",
            self.project_path,
            runner_command,
            self.project_id,
            self.client_id,
            self.secret_key,
            self.run_id,
            self.cloned_project_dir,
            self.project_root_dir,
            self.details_url,
            self.pull_request_number,
            self.additional_flags.as_deref().unwrap_or_default(),
        );

        if let Some(api_url) = &self.api_url_override {
            let _infallible = write!(command, " --api-url {api_url}");
        }
        if let Some(auth_url) = &self.auth_url_override {
            let _infallible = write!(command, " --auth-url {auth_url}");
        }
        command
    }
}

/// Classification of a runner exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Exit 0: every generated test passed.
    Passed,
    /// Exit 5: the runner found no tests to execute.
    NoTests,
    /// Exit 255: the configured project does not exist.
    ProjectMissing,
    /// Any other non-zero exit, including signal termination.
    TestsFailed,
}

/// Classifies a raw exit code per the runner's contract.
#[must_use]
pub const fn classify_exit(code: Option<i32>) -> ExitClass {
    match code {
        Some(0) => ExitClass::Passed,
        Some(NO_TESTS_EXIT_CODE) => ExitClass::NoTests,
        Some(PROJECT_MISSING_EXIT_CODE) => ExitClass::ProjectMissing,
        _ => ExitClass::TestsFailed,
    }
}

/// Test outcome produced by one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Aggregate state for the commit status.
    pub state: RunState,
    /// One-line human-readable result.
    pub description: String,
    /// Markdown summary read from the report file, empty when absent.
    pub summary: String,
}

/// Outcome plus the separate project-existence signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationReport {
    /// Test outcome for status reporting.
    pub outcome: RunOutcome,
    /// False when the runner signalled that the project does not exist;
    /// no settings fetch or status report happens in that case.
    pub project_exists: bool,
}

/// Launches the external runner against a checked-out tree.
#[cfg_attr(test, mockall::automock)]
pub trait RunnerInvoker: Send + Sync {
    /// Runs the external tool and classifies its exit.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] when the hosting shell cannot be
    /// launched. A non-zero runner exit is not an error; it is encoded in
    /// the returned report.
    fn invoke(&self, request: &RunnerRequest) -> Result<InvocationReport, RunnerError>;
}

/// Real runner implementation backed by `sh -c`.
#[derive(Debug, Clone)]
pub struct SystemRunnerInvoker {
    runner_command: String,
    report_path: Utf8PathBuf,
}

impl Default for SystemRunnerInvoker {
    fn default() -> Self {
        Self {
            runner_command: DEFAULT_RUNNER_COMMAND.to_owned(),
            report_path: Utf8PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

impl SystemRunnerInvoker {
    /// Creates an invoker using the default `snowmate_runner` executable
    /// and report path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the runner command path.
    #[must_use]
    pub fn with_command_path(mut self, runner_command: impl Into<String>) -> Self {
        self.runner_command = runner_command.into();
        self
    }

    /// Overrides the well-known report file path.
    #[must_use]
    pub fn with_report_path(mut self, report_path: Utf8PathBuf) -> Self {
        self.report_path = report_path;
        self
    }
}

impl RunnerInvoker for SystemRunnerInvoker {
    fn invoke(&self, request: &RunnerRequest) -> Result<InvocationReport, RunnerError> {
        let command_line = request.command_line(&self.runner_command);
        let output = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .current_dir(request.workspace.as_std_path())
            .output()
            .map_err(|error| RunnerError::Spawn {
                message: error.to_string(),
            })?;

        let class = classify_exit(output.status.code());
        let project_exists = class != ExitClass::ProjectMissing;

        let (state, description) = match class {
            ExitClass::TestsFailed => (RunState::Failure, FAILURE_DESCRIPTION.to_owned()),
            ExitClass::Passed | ExitClass::NoTests | ExitClass::ProjectMissing => {
                (RunState::Success, SUCCESS_DESCRIPTION.to_owned())
            }
        };

        // Surface the runner's own output for diagnosis, unless the
        // project is missing and no further reporting happens.
        if project_exists {
            echo_runner_output(&output.stdout);
        }

        let summary = if project_exists {
            read_summary(&self.report_path)
        } else {
            String::new()
        };

        Ok(InvocationReport {
            outcome: RunOutcome {
                state,
                description,
                summary,
            },
            project_exists,
        })
    }
}

/// Reads the runner's report file; a missing or unreadable file yields an
/// empty summary. Best-effort enrichment, never fatal.
fn read_summary(report_path: &Utf8Path) -> String {
    fs::read_to_string(report_path).unwrap_or_default()
}

fn echo_runner_output(stdout: &[u8]) {
    if stdout.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(stdout);
    let mut handle = io::stdout().lock();
    let _ignored = write!(handle, "{text}");
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
