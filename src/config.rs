//! Action configuration loaded from CLI, environment, and files.
//!
//! Values merge with ortho-config's layered precedence (lowest to highest):
//! built-in defaults, `.snowmate.toml` discovery, `SNOWMATE_*` environment
//! variables, then command-line arguments. Credentials are never defaulted;
//! the three service URLs fall back to the hosted Snowmate endpoints when
//! left unset.

use std::env;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default base URL for the Snowmate REST API.
pub const DEFAULT_API_URL: &str = "https://api.snowmate.io";
/// Default base URL for the Snowmate authentication service.
pub const DEFAULT_AUTH_URL: &str = "https://auth.snowmate.io";
/// Default base URL for the Snowmate web application.
pub const DEFAULT_APP_URL: &str = "https://app.snowmate.io";

/// Errors raised while loading or validating action configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration sources could not be merged.
    #[error("configuration error: {message}")]
    Load {
        /// Details about the configuration failure.
        message: String,
    },

    /// No project path was supplied.
    #[error("project path is required (use --project-path or SNOWMATE_PROJECT_PATH)")]
    MissingProjectPath,

    /// No project identifier was supplied.
    #[error("project ID is required (use --project-id or SNOWMATE_PROJECT_ID)")]
    MissingProjectId,

    /// No client identifier was supplied.
    #[error("client ID is required (use --client-id or SNOWMATE_CLIENT_ID)")]
    MissingClientId,

    /// No secret key was supplied.
    #[error("secret key is required (use --secret-key or SNOWMATE_SECRET_KEY)")]
    MissingSecretKey,

    /// No repository token was supplied.
    #[error("repository token is required (use --github-token, SNOWMATE_GITHUB_TOKEN, or GITHUB_TOKEN)")]
    MissingRepositoryToken,
}

/// Immutable per-run configuration for the Snowmate action.
///
/// # Environment Variables
///
/// - `SNOWMATE_PROJECT_PATH` or `--project-path`: project subdirectory
/// - `SNOWMATE_PROJECT_ID` or `--project-id`: Snowmate project identifier
/// - `SNOWMATE_CLIENT_ID` or `--client-id`: API client identifier
/// - `SNOWMATE_SECRET_KEY` or `--secret-key`: API secret key
/// - `SNOWMATE_GITHUB_TOKEN`, `GITHUB_TOKEN`, or `--github-token`: repository token
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "SNOWMATE",
    discovery(
        dotfile_name = ".snowmate.toml",
        config_file_name = "snowmate.toml",
        app_name = "snowmate"
    )
)]
pub struct ActionConfig {
    /// Project subdirectory under both the checkout and the workspace.
    #[ortho_config(cli_short = 'p')]
    pub project_path: Option<String>,

    /// Snowmate project identifier.
    #[ortho_config()]
    pub project_id: Option<String>,

    /// API client identifier used for token issuance and the runner.
    #[ortho_config()]
    pub client_id: Option<String>,

    /// API secret key paired with the client identifier.
    #[ortho_config()]
    pub secret_key: Option<String>,

    /// Override for the Snowmate REST API base URL.
    ///
    /// When set, the override is also forwarded to the runner via
    /// `--api-url`; when unset, [`DEFAULT_API_URL`] applies.
    #[ortho_config()]
    pub api_url: Option<String>,

    /// Override for the Snowmate authentication base URL.
    ///
    /// When set, the override is also forwarded to the runner via
    /// `--auth-url`; when unset, [`DEFAULT_AUTH_URL`] applies.
    #[ortho_config()]
    pub auth_url: Option<String>,

    /// Override for the Snowmate web application base URL used to build
    /// the details link. Falls back to [`DEFAULT_APP_URL`].
    #[ortho_config()]
    pub app_url: Option<String>,

    /// Free-form flags appended verbatim to the runner invocation.
    #[ortho_config()]
    pub additional_flags: Option<String>,

    /// Asks the reporting API not to create a commit status object.
    #[ortho_config()]
    pub disable_status_creation: bool,

    /// Repository token used to authenticate the base-branch clone.
    #[ortho_config(cli_short = 't')]
    pub github_token: Option<String>,
}

impl ActionConfig {
    /// Resolves the repository token, falling back to the `GITHUB_TOKEN`
    /// environment variable when no configured value is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRepositoryToken`] when no source
    /// provides a value.
    pub fn resolve_github_token(&self) -> Result<String, ConfigError> {
        self.github_token
            .clone()
            .or_else(|| env::var("GITHUB_TOKEN").ok())
            .ok_or(ConfigError::MissingRepositoryToken)
    }

    /// Returns the project path or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingProjectPath`] when unset.
    pub fn require_project_path(&self) -> Result<&str, ConfigError> {
        self.project_path
            .as_deref()
            .ok_or(ConfigError::MissingProjectPath)
    }

    /// Returns the project identifier or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingProjectId`] when unset.
    pub fn require_project_id(&self) -> Result<&str, ConfigError> {
        self.project_id.as_deref().ok_or(ConfigError::MissingProjectId)
    }

    /// Returns the client identifier or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingClientId`] when unset.
    pub fn require_client_id(&self) -> Result<&str, ConfigError> {
        self.client_id.as_deref().ok_or(ConfigError::MissingClientId)
    }

    /// Returns the secret key or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecretKey`] when unset.
    pub fn require_secret_key(&self) -> Result<&str, ConfigError> {
        self.secret_key.as_deref().ok_or(ConfigError::MissingSecretKey)
    }

    /// Returns the configured API base URL or the hosted default.
    #[must_use]
    pub fn api_url_or_default(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Returns the configured auth base URL or the hosted default.
    #[must_use]
    pub fn auth_url_or_default(&self) -> &str {
        self.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL)
    }

    /// Returns the configured app base URL or the hosted default.
    #[must_use]
    pub fn app_url_or_default(&self) -> &str {
        self.app_url.as_deref().unwrap_or(DEFAULT_APP_URL)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
