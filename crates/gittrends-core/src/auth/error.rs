use thiserror::Error;

use crate::api::ApiError;

/// Failures of the sign-in flow and of credential persistence.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid authorization code")]
    InvalidAuthorizationCode,

    #[error("Invalid session id")]
    SessionMismatch,

    #[error("Could not retrieve GitHub client id: {0}")]
    ClientIdUnavailable(#[source] ApiError),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(#[source] ApiError),

    #[error("Token has no access token")]
    InvalidToken,

    #[error("Could not fetch GitHub user: {0}")]
    IdentityFetchFailed(#[source] ApiError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<keyring::Error> for AuthError {
    fn from(error: keyring::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}
