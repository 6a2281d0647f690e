//! Snowmate CI action entrypoint.

use std::io::{self, Write};
use std::process::ExitCode;

use ortho_config::OrthoConfig;
use snowmate_ci::{
    ActionConfig, ConfigError, Git2Checkout, HttpSnowmateApi, NOT_APPLICABLE_NOTICE, RunError,
    RunOrchestrator, RunVerdict, SystemRunnerInvoker, WorkflowContext,
};

fn main() -> ExitCode {
    match run() {
        Ok(verdict) => exit_code_for(&verdict),
        Err(error) => {
            let _ignored = writeln!(io::stderr().lock(), "{error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunVerdict, RunError> {
    let config = load_config()?;
    let context = WorkflowContext::from_env()?;

    let api = HttpSnowmateApi::new(
        config.api_url_or_default(),
        config.auth_url_or_default(),
        config.require_client_id()?,
        config.require_secret_key()?,
    )?;
    let checkout = Git2Checkout::new();
    let invoker = SystemRunnerInvoker::new();

    let orchestrator = RunOrchestrator::new(&config, &context, &api, &checkout, &invoker);
    orchestrator.start_run()
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`ConfigError::Load`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<ActionConfig, RunError> {
    ActionConfig::load().map_err(|error| {
        RunError::Config(ConfigError::Load {
            message: error.to_string(),
        })
    })
}

fn exit_code_for(verdict: &RunVerdict) -> ExitCode {
    match verdict {
        RunVerdict::NotApplicable => {
            let _ignored = writeln!(io::stderr().lock(), "{NOT_APPLICABLE_NOTICE}");
            ExitCode::SUCCESS
        }
        // Test failures are communicated through the commit status, not
        // the job signal.
        RunVerdict::Completed { .. } => ExitCode::SUCCESS,
        RunVerdict::ProjectMissing { .. } => ExitCode::FAILURE,
    }
}
