//! Snowmate CI library crate providing pull request run orchestration.
//!
//! Given a pull request event, the library reconstructs the relevant git
//! window, clones the base revision into an ephemeral directory, invokes
//! the external Snowmate runner against it, and reports a commit status
//! back to the hosting platform — guaranteeing that the ephemeral
//! directory is always cleaned up and that at most one status is posted
//! per run.

pub mod api;
pub mod checkout;
pub mod config;
pub mod orchestrator;
pub mod runner;
pub mod workflow;

pub use api::{
    AccessToken, ApiError, HttpSnowmateApi, ProjectSettings, RunState, SnowmateApi, StatusRequest,
};
pub use checkout::{CheckoutError, CheckoutSource, Git2Checkout, RepositoryCheckout};
pub use config::{ActionConfig, ConfigError};
pub use orchestrator::{NOT_APPLICABLE_NOTICE, RunError, RunOrchestrator, RunVerdict};
pub use runner::{
    InvocationReport, RunOutcome, RunnerError, RunnerInvoker, RunnerRequest, SystemRunnerInvoker,
};
pub use workflow::{GitData, TriggerEvent, WorkflowContext, WorkflowContextError};
