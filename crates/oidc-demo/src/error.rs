//! Error types for the OIDC demo.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use oauth2::RequestTokenError;
use oauth2::basic::BasicErrorResponse;

/// Errors from loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Required environment variable unset or empty
    #[error("{var} missing")]
    Missing {
        /// Variable name
        var: &'static str,
    },

    /// Environment variable present but unusable
    #[error("{var} invalid: {message}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What is wrong with it
        message: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { var, message: message.into() }
    }
}

/// Errors from calls to the identity provider.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(reqwest_middleware::Error),

    /// Provider did not answer within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-2xx response from the provider
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Endpoint URL could not be parsed
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser error
        source: url::ParseError,
    },

    /// Provider answered 2xx with a payload this flow cannot use
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Token endpoint answered with an OAuth 2.0 error response
    #[error("Token request rejected: {0}")]
    TokenRejected(String),

    /// Token response carried no access token
    #[error("Token response did not contain an access token")]
    MissingAccessToken,
}

impl ClientError {
    /// Classify a reqwest error, separating timeouts from other transport failures.
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() { Self::Timeout(timeout) } else { Self::Http(err) }
    }

    /// Classify a middleware error, separating timeouts from other failures.
    #[must_use]
    pub fn from_middleware(err: reqwest_middleware::Error, timeout: Duration) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => Self::from_reqwest(e, timeout),
            other => Self::Middleware(other),
        }
    }

    /// Flatten an `oauth2` token request failure.
    ///
    /// Transport errors come back unchanged since the token request runs on
    /// this crate's HTTP client.
    #[must_use]
    pub fn from_token_request(err: RequestTokenError<Self, BasicErrorResponse>) -> Self {
        match err {
            RequestTokenError::Request(e) => e,
            RequestTokenError::ServerResponse(response) => Self::TokenRejected(response.to_string()),
            RequestTokenError::Parse(e, _) => {
                Self::InvalidResponse(format!("malformed token response: {e}"))
            }
            RequestTokenError::Other(message) => Self::InvalidResponse(message),
        }
    }

    /// Create an unexpected-status error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::UnexpectedStatus { status, message: message.into() }
    }

    /// Returns true if the provider timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Per-request errors of the login/callback flow.
#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    /// `state` absent, unknown, expired, or already used
    #[error("state did not match")]
    StateMismatch,

    /// Callback arrived without an authorization code
    #[error("missing authorization code")]
    MissingCode,

    /// Provider redirected back with an OAuth error
    #[error("provider returned error '{error}'{}", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Provider {
        /// OAuth error code
        error: String,
        /// Optional human-readable description
        description: Option<String>,
    },

    /// Code-for-token exchange failed
    #[error("Failed to exchange token: {0}")]
    Exchange(#[source] ClientError),

    /// User-info fetch failed
    #[error("Failed to get userinfo: {0}")]
    UserInfo(#[source] ClientError),
}

impl FlowError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::StateMismatch | Self::MissingCode | Self::Provider { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Exchange(_) | Self::UserInfo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Callback failed");
        } else {
            tracing::warn!(error = %self, "Callback rejected");
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
