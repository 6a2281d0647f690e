//! Snowmate platform API: token issuance, project settings, and commit
//! status reporting.
//!
//! All three calls share one blocking HTTP client with bearer
//! authentication. Token issuance failures are fatal to the run; the
//! caller decides how to treat settings and reporting failures.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const AUTH_TOKEN_ROUTE: &str = "/identity/resources/auth/v1/api-token";
const PROJECTS_ROUTE: &str = "/baseline/api/projects";
const STATUS_ROUTE: &str = "/github-events/api/status";

const ERROR_BODY_LIMIT: usize = 160;

/// Errors surfaced while communicating with the Snowmate platform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Token issuance was rejected or returned an unusable body.
    #[error("issuing Snowmate access token failed: {message}")]
    TokenIssuance {
        /// Response detail from the authentication service.
        message: String,
    },

    /// Networking failed while calling the platform.
    #[error("network error talking to Snowmate: {message}")]
    Network {
        /// Transport-level error detail.
        message: String,
    },

    /// The platform returned a non-success API response.
    #[error("Snowmate API error: {message}")]
    Api {
        /// Response body or status describing the failure.
        message: String,
    },

    /// The project settings blob was not valid JSON.
    #[error("project settings could not be decoded: {message}")]
    SettingsDecode {
        /// Detail from the JSON decoder.
        message: String,
    },
}

/// Short-lived bearer token scoped to one run.
///
/// The token value is intentionally excluded from `Debug` output so it
/// cannot leak into operator logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw bearer token string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the token value for an `Authorization` header.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("AccessToken(<redacted>)")
    }
}

/// Per-project settings decoded from the platform's JSON-encoded blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectSettings(BTreeMap<String, serde_json::Value>);

impl ProjectSettings {
    /// Decodes settings from the API's JSON-encoded string field.
    ///
    /// An absent field yields the empty mapping.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::SettingsDecode`] when the field is present but
    /// is not a JSON object.
    pub fn from_encoded(encoded: Option<&str>) -> Result<Self, ApiError> {
        match encoded {
            None => Ok(Self::default()),
            Some(raw) => serde_json::from_str(raw)
                .map(Self)
                .map_err(|error| ApiError::SettingsDecode {
                    message: error.to_string(),
                }),
        }
    }

    /// Whether the project requested that no commit status be posted.
    ///
    /// Follows the platform's truthiness rules: any value other than
    /// `false`, `null`, `0`, or `""` enables silent mode.
    #[must_use]
    pub fn silent_mode(&self) -> bool {
        self.0.get("githubSilentMode").is_some_and(is_truthy)
    }

    /// Whether no settings were resolved for the project.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(flag) => *flag,
        serde_json::Value::Number(number) => number.as_f64() != Some(0.0),
        serde_json::Value::String(text) => !text.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// Commit status state reported for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Every generated test passed (or none applied).
    Success,
    /// One or more generated tests failed.
    Failure,
}

impl RunState {
    /// Wire representation of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Payload posted to the commit-status API.
///
/// `sha` carries the pull request head commit — the status subject — not
/// the base commit the runner executed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    /// Repository owner login.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Head commit the status attaches to.
    pub sha: String,
    /// Link to the run's regression report in the Snowmate app.
    #[serde(rename = "detailsURL")]
    pub details_url: String,
    /// Aggregate run state.
    pub state: RunState,
    /// Human-readable one-line result.
    pub description: String,
    /// Markdown summary captured from the runner's report file.
    pub summary: String,
    /// Pull request number the run evaluated.
    pub pull_request_number: i64,
    /// Asks the API to skip creating the status object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_status_creation: Option<bool>,
}

/// Client surface for the Snowmate platform API.
#[cfg_attr(test, mockall::automock)]
pub trait SnowmateApi: Send + Sync {
    /// Exchanges the configured client credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::TokenIssuance`] on a non-success response and
    /// [`ApiError::Network`] on transport failure. Token issuance errors
    /// abort the run before any billable action.
    fn issue_token(&self) -> Result<AccessToken, ApiError>;

    /// Fetches per-project settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, API, or decode failure. Callers
    /// are expected to degrade any error to the empty mapping — settings
    /// only gate reporting and must never abort a run.
    fn fetch_settings(
        &self,
        project_id: &str,
        token: &AccessToken,
    ) -> Result<ProjectSettings, ApiError>;

    /// Posts a commit status for the run.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Api`] on a non-success response and
    /// [`ApiError::Network`] on transport failure.
    fn report_status(&self, request: &StatusRequest, token: &AccessToken) -> Result<(), ApiError>;
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "clientId")]
    client_id: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    #[serde(default)]
    settings: Option<String>,
}

/// Blocking HTTP implementation of [`SnowmateApi`].
pub struct HttpSnowmateApi {
    client: Client,
    api_url: String,
    auth_url: String,
    client_id: String,
    secret_key: String,
}

impl fmt::Debug for HttpSnowmateApi {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpSnowmateApi")
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("secret_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpSnowmateApi {
    /// Creates a client for the given base URLs and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] when the HTTP client cannot be
    /// constructed.
    pub fn new(
        api_url: impl Into<String>,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().build().map_err(|error| ApiError::Network {
            message: format!("failed to configure HTTP client: {error}"),
        })?;
        Ok(Self {
            client,
            api_url: trim_base(api_url.into()),
            auth_url: trim_base(auth_url.into()),
            client_id: client_id.into(),
            secret_key: secret_key.into(),
        })
    }
}

impl SnowmateApi for HttpSnowmateApi {
    fn issue_token(&self) -> Result<AccessToken, ApiError> {
        let endpoint = format!("{}{AUTH_TOKEN_ROUTE}", self.auth_url);
        let payload = TokenRequest {
            client_id: self.client_id.as_str(),
            secret: self.secret_key.as_str(),
        };

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .map_err(|error| ApiError::Network {
                message: format!("token request transport failed: {error}"),
            })?;

        if !response.status().is_success() {
            return Err(ApiError::TokenIssuance {
                message: describe_failure(response),
            });
        }

        let token: TokenResponse = response.json().map_err(|error| ApiError::TokenIssuance {
            message: format!("token response JSON decoding failed: {error}"),
        })?;
        Ok(AccessToken::new(token.access_token))
    }

    fn fetch_settings(
        &self,
        project_id: &str,
        token: &AccessToken,
    ) -> Result<ProjectSettings, ApiError> {
        let endpoint = format!("{}{PROJECTS_ROUTE}/{project_id}", self.api_url);

        let response = self
            .client
            .get(endpoint)
            .bearer_auth(token.value())
            .send()
            .map_err(|error| ApiError::Network {
                message: format!("settings request transport failed: {error}"),
            })?;

        if !response.status().is_success() {
            return Err(ApiError::Api {
                message: describe_failure(response),
            });
        }

        let project: ProjectResponse = response.json().map_err(|error| ApiError::Api {
            message: format!("project response JSON decoding failed: {error}"),
        })?;
        ProjectSettings::from_encoded(project.settings.as_deref())
    }

    fn report_status(&self, request: &StatusRequest, token: &AccessToken) -> Result<(), ApiError> {
        let endpoint = format!("{}{STATUS_ROUTE}", self.api_url);

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(token.value())
            .json(request)
            .send()
            .map_err(|error| ApiError::Network {
                message: format!("status request transport failed: {error}"),
            })?;

        if !response.status().is_success() {
            return Err(ApiError::Api {
                message: describe_failure(response),
            });
        }
        Ok(())
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

fn describe_failure(response: reqwest::blocking::Response) -> String {
    let status = response.status();
    let body = response.text().map_or_else(
        |_| "(failed to read error response body)".to_owned(),
        |content| truncate_for_message(content.as_str(), ERROR_BODY_LIMIT),
    );
    format!("status {}: {body}", status.as_u16())
}

fn truncate_for_message(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        content.to_owned()
    } else {
        let truncated: String = content.chars().take(limit).collect();
        format!("{truncated}…")
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
