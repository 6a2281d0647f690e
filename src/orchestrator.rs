//! Run orchestration: stage sequencing, report gating, and guaranteed
//! cleanup.
//!
//! One run walks the stages in order — derive git data, clone the base
//! revision into an ephemeral directory, issue an access token, invoke
//! the runner, resolve project settings, report a commit status — with
//! early exits for inapplicable events, failed checkouts, and missing
//! projects. Whatever happens after the directory is created, it is
//! removed exactly once before the run returns; removal failures are
//! logged for manual remediation and never escalated.

use std::fmt;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempDir};
use thiserror::Error;

use crate::api::{AccessToken, ApiError, ProjectSettings, RunState, SnowmateApi, StatusRequest};
use crate::checkout::{CheckoutError, CheckoutSource, RepositoryCheckout};
use crate::config::{ActionConfig, ConfigError};
use crate::runner::{self, RunnerError, RunnerInvoker, RunnerRequest};
use crate::workflow::{GitData, WorkflowContext, WorkflowContextError};

const TEMP_DIR_PREFIX: &str = "snow-";

/// Operator notice printed when the event is not a pull request.
pub const NOT_APPLICABLE_NOTICE: &str =
    "Stopping Snowmate, currently our tests only run on pull requests.";

/// Fatal errors that abort a run before the reporting stage.
///
/// Everything not represented here degrades to a best-effort default
/// instead of aborting: settings failures become the empty mapping,
/// report failures are logged and swallowed, and cleanup failures are
/// logged with the leftover path.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration was missing or could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The workflow environment surface was incomplete.
    #[error(transparent)]
    Workflow(#[from] WorkflowContextError),

    /// The base revision could not be cloned or checked out.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// A platform API call that gates the run failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The runner subprocess could not be launched.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The ephemeral checkout directory could not be created.
    #[error("failed to create ephemeral checkout directory: {message}")]
    TempDir {
        /// Error detail from the filesystem.
        message: String,
    },
}

/// Terminal state of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    /// The event was not a pull request; nothing ran.
    NotApplicable,
    /// The pipeline ran to completion with the given test state.
    Completed {
        /// Aggregate state the run finished with.
        state: RunState,
    },
    /// The runner signalled that the configured project does not exist.
    /// No status was reported; the CI job must fail.
    ProjectMissing {
        /// The project identifier that was not found.
        project_id: String,
    },
}

/// Sequences one run across its collaborators.
pub struct RunOrchestrator<'a> {
    config: &'a ActionConfig,
    context: &'a WorkflowContext,
    api: &'a dyn SnowmateApi,
    checkout: &'a dyn RepositoryCheckout,
    runner: &'a dyn RunnerInvoker,
}

impl<'a> RunOrchestrator<'a> {
    /// Wires an orchestrator over its collaborators.
    #[must_use]
    pub const fn new(
        config: &'a ActionConfig,
        context: &'a WorkflowContext,
        api: &'a dyn SnowmateApi,
        checkout: &'a dyn RepositoryCheckout,
        runner: &'a dyn RunnerInvoker,
    ) -> Self {
        Self {
            config,
            context,
            api,
            checkout,
            runner,
        }
    }

    /// Runs the full pipeline for the triggering event.
    ///
    /// Once the ephemeral directory exists, it is removed exactly once
    /// before this method returns, whatever the downstream stages did.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] for the fatal classes: missing
    /// configuration, checkout failure, token issuance failure, or a
    /// runner that could not be launched.
    pub fn start_run(&self) -> Result<RunVerdict, RunError> {
        let Some(git_data) = GitData::from_event(self.context.event()) else {
            return Ok(RunVerdict::NotApplicable);
        };

        let repository_token = self.config.resolve_github_token()?;

        let temp_dir = Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(|error| RunError::TempDir {
                message: error.to_string(),
            })?;
        let temp_path = match Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()) {
            Ok(path) => path,
            Err(path) => {
                remove_temp_dir(temp_dir);
                return Err(RunError::TempDir {
                    message: format!("path is not valid UTF-8: {}", path.display()),
                });
            }
        };

        let verdict = self.execute(&temp_path, &git_data, &repository_token);
        remove_temp_dir(temp_dir);
        verdict
    }

    fn execute(
        &self,
        temp_path: &Utf8Path,
        git_data: &GitData,
        repository_token: &str,
    ) -> Result<RunVerdict, RunError> {
        let source = CheckoutSource::new(
            self.context.repository_url(),
            git_data.base_branch.clone(),
            git_data.base_commit.clone(),
            repository_token,
        );
        self.checkout.checkout(temp_path, &source)?;

        let token = self.api.issue_token()?;
        let request = self.runner_request(temp_path, git_data)?;
        let details_url = request.details_url.clone();
        let report = self.runner.invoke(&request)?;

        if !report.project_exists {
            let project_id = request.project_id;
            let _ignored = writeln!(
                io::stderr().lock(),
                "Stopping Snowmate, the Project ID: {project_id} does not exist. \
                 Please make sure to enter a valid Project ID."
            );
            return Ok(RunVerdict::ProjectMissing { project_id });
        }

        let settings = self.resolve_settings(&request.project_id, &token);
        let state = report.outcome.state;
        if settings.silent_mode() {
            return Ok(RunVerdict::Completed { state });
        }

        let status = StatusRequest {
            owner: self.context.owner().to_owned(),
            repo: self.context.repo().to_owned(),
            sha: git_data.head_commit.clone(),
            details_url,
            state,
            description: report.outcome.description,
            summary: report.outcome.summary,
            pull_request_number: request.pull_request_number,
            disable_status_creation: self.config.disable_status_creation.then_some(true),
        };
        if let Err(error) = self.api.report_status(&status, &token) {
            // Reporting is the last best-effort stage; the run outcome
            // stands even when the status POST fails.
            tracing::warn!("failed to report commit status: {error}");
        }

        Ok(RunVerdict::Completed { state })
    }

    /// Resolves project settings, visibly degrading any failure — network
    /// or decode alike — to the empty mapping.
    fn resolve_settings(&self, project_id: &str, token: &AccessToken) -> ProjectSettings {
        match self.api.fetch_settings(project_id, token) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!("project settings unavailable, continuing without: {error}");
                ProjectSettings::default()
            }
        }
    }

    fn runner_request(
        &self,
        temp_path: &Utf8Path,
        git_data: &GitData,
    ) -> Result<RunnerRequest, RunError> {
        let project_path = self.config.require_project_path()?;
        let project_id = self.config.require_project_id()?;
        let details_url = runner::details_url(
            self.config.app_url_or_default(),
            project_id,
            self.context.run_id(),
        );

        Ok(RunnerRequest {
            project_path: project_path.to_owned(),
            project_id: project_id.to_owned(),
            client_id: self.config.require_client_id()?.to_owned(),
            secret_key: self.config.require_secret_key()?.to_owned(),
            run_id: self.context.run_id(),
            cloned_project_dir: temp_path.join(project_path),
            project_root_dir: self.context.workspace().join(project_path),
            details_url,
            pull_request_number: git_data
                .pull_request_number
                .map_or(-1, |number| i64::try_from(number).unwrap_or(-1)),
            additional_flags: self.config.additional_flags.clone(),
            api_url_override: self.config.api_url.clone(),
            auth_url_override: self.config.auth_url.clone(),
            workspace: self.context.workspace().to_owned(),
        })
    }
}

impl fmt::Debug for RunOrchestrator<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RunOrchestrator")
            .field("config", &self.config)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Removes the ephemeral directory, logging (never escalating) failures.
fn remove_temp_dir(temp_dir: TempDir) {
    let path = temp_dir.path().to_path_buf();
    if let Err(error) = temp_dir.close() {
        let _ignored = writeln!(
            io::stderr().lock(),
            "An error has occurred while removing the temp folder at {}. \
             Please remove it manually. Error: {error}",
            path.display()
        );
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
