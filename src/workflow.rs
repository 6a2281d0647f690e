//! Workflow context and git data derived from the triggering event.
//!
//! GitHub Actions exposes the triggering event and repository identity
//! through well-known environment variables; this module reads that
//! surface once at run start and extracts the git window the runner
//! compares against. Only `pull_request` events carry usable data —
//! every other event kind is inapplicable, not an error.

use std::env;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading the workflow context from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowContextError {
    /// A required `GITHUB_*` environment variable was absent.
    #[error("environment variable {name} is not set")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// The event payload file could not be read or parsed.
    #[error("could not read event payload: {message}")]
    EventPayload {
        /// Details from the read or parse failure.
        message: String,
    },

    /// `GITHUB_REPOSITORY` did not match `owner/repo`.
    #[error("repository identifier must match owner/repo: {value}")]
    InvalidRepository {
        /// The malformed identifier.
        value: String,
    },

    /// `GITHUB_RUN_ID` was not a positive integer.
    #[error("workflow run ID must be an integer: {value}")]
    InvalidRunId {
        /// The unparseable value.
        value: String,
    },

    /// `GITHUB_WORKSPACE` was not valid UTF-8.
    #[error("workspace path is not valid UTF-8")]
    NonUtf8Workspace,
}

/// Base or head reference carried by a pull request payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventRef {
    /// Branch name, when the payload provides one.
    #[serde(rename = "ref", default)]
    pub ref_name: Option<String>,
    /// Commit SHA the reference points at.
    pub sha: String,
}

/// The `pull_request` portion of a pull request event payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestEvent {
    /// Target reference the pull request merges into.
    pub base: EventRef,
    /// Source reference the pull request merges from.
    pub head: EventRef,
    /// Pull request number, when the payload provides one.
    #[serde(default)]
    pub number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    pull_request: PullRequestEvent,
}

/// The event that triggered this workflow run.
///
/// Only the `pull_request` variant carries data the orchestrator can act
/// on; everything else is preserved solely for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// A pull request was opened, synchronised, or reopened.
    PullRequest(PullRequestEvent),
    /// Any other event kind, named for diagnostics.
    Other {
        /// The workflow event name (e.g. `push`, `schedule`).
        event_name: String,
    },
}

impl TriggerEvent {
    /// Parses a trigger event from the workflow event name and raw JSON
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowContextError::EventPayload`] when the event is a
    /// pull request but the payload does not carry a well-formed
    /// `pull_request` object. Non-pull-request events never fail; their
    /// payload is not inspected.
    pub fn from_payload(event_name: &str, payload: &str) -> Result<Self, WorkflowContextError> {
        if event_name != "pull_request" {
            return Ok(Self::Other {
                event_name: event_name.to_owned(),
            });
        }

        let parsed: PullRequestPayload = serde_json::from_str(payload).map_err(|error| {
            WorkflowContextError::EventPayload {
                message: error.to_string(),
            }
        })?;
        Ok(Self::PullRequest(parsed.pull_request))
    }
}

/// Git history window derived from a pull request event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitData {
    /// Branch the pull request targets.
    pub base_branch: String,
    /// Commit the base branch pointed at when the event fired.
    pub base_commit: String,
    /// Tip commit of the pull request source branch.
    pub head_commit: String,
    /// Pull request number, when the payload provided one.
    pub pull_request_number: Option<u64>,
}

impl GitData {
    /// Derives git data from the trigger event.
    ///
    /// Returns `None` for every event kind other than `pull_request`,
    /// signalling "not applicable" rather than an error. Pull request
    /// payloads without a base branch name are likewise inapplicable.
    #[must_use]
    pub fn from_event(event: &TriggerEvent) -> Option<Self> {
        match event {
            TriggerEvent::PullRequest(pull_request) => {
                let base_branch = pull_request.base.ref_name.clone()?;
                Some(Self {
                    base_branch,
                    base_commit: pull_request.base.sha.clone(),
                    head_commit: pull_request.head.sha.clone(),
                    pull_request_number: pull_request.number,
                })
            }
            TriggerEvent::Other { .. } => None,
        }
    }
}

/// Identity and event surface of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
    event: TriggerEvent,
    owner: String,
    repo: String,
    run_id: u64,
    server_url: String,
    workspace: Utf8PathBuf,
}

impl WorkflowContext {
    /// Creates a context from explicit parts.
    #[must_use]
    pub fn new(
        event: TriggerEvent,
        owner: impl Into<String>,
        repo: impl Into<String>,
        run_id: u64,
        server_url: impl Into<String>,
        workspace: Utf8PathBuf,
    ) -> Self {
        Self {
            event,
            owner: owner.into(),
            repo: repo.into(),
            run_id,
            server_url: server_url.into(),
            workspace,
        }
    }

    /// Reads the context from the standard GitHub Actions environment.
    ///
    /// Consumes `GITHUB_EVENT_NAME`, `GITHUB_EVENT_PATH`,
    /// `GITHUB_REPOSITORY`, `GITHUB_RUN_ID`, `GITHUB_SERVER_URL`, and
    /// `GITHUB_WORKSPACE`.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkflowContextError`] when a variable is missing or
    /// malformed, or when the event payload cannot be read.
    pub fn from_env() -> Result<Self, WorkflowContextError> {
        let event_name = require_var("GITHUB_EVENT_NAME")?;
        let event_path = require_var("GITHUB_EVENT_PATH")?;
        let payload =
            fs::read_to_string(&event_path).map_err(|error| WorkflowContextError::EventPayload {
                message: format!("{event_path}: {error}"),
            })?;
        let event = TriggerEvent::from_payload(&event_name, &payload)?;

        let repository = require_var("GITHUB_REPOSITORY")?;
        let (owner, repo) =
            repository
                .split_once('/')
                .ok_or_else(|| WorkflowContextError::InvalidRepository {
                    value: repository.clone(),
                })?;

        let run_id_value = require_var("GITHUB_RUN_ID")?;
        let run_id =
            run_id_value
                .parse::<u64>()
                .map_err(|_| WorkflowContextError::InvalidRunId {
                    value: run_id_value.clone(),
                })?;

        let server_url = require_var("GITHUB_SERVER_URL")?;
        let workspace = Utf8PathBuf::from(require_var("GITHUB_WORKSPACE")?);

        Ok(Self::new(event, owner, repo, run_id, server_url, workspace))
    }

    /// The event that triggered this run.
    #[must_use]
    pub const fn event(&self) -> &TriggerEvent {
        &self.event
    }

    /// Repository owner login.
    #[must_use]
    pub const fn owner(&self) -> &str {
        self.owner.as_str()
    }

    /// Repository name.
    #[must_use]
    pub const fn repo(&self) -> &str {
        self.repo.as_str()
    }

    /// Workflow run identifier assigned by the CI platform.
    #[must_use]
    pub const fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Root of the checked-out workspace on the CI host.
    #[must_use]
    pub fn workspace(&self) -> &Utf8Path {
        self.workspace.as_path()
    }

    /// Clone URL for the repository on the hosting platform.
    #[must_use]
    pub fn repository_url(&self) -> String {
        format!("{}/{}/{}", self.server_url, self.owner, self.repo)
    }
}

fn require_var(name: &str) -> Result<String, WorkflowContextError> {
    env::var(name).map_err(|_| WorkflowContextError::MissingVariable {
        name: name.to_owned(),
    })
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
