use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth token as issued by the token exchange backend.
///
/// Only `access_token` matters to this crate; `token_type` and `scope` are
/// carried through storage untouched. `access_token` is optional on the wire
/// so a backend response without one can be rejected at save time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct GitHubToken {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// Reasons a stored token could not be read back.
#[derive(Debug, Error)]
pub enum TokenParseError {
    #[error("stored token is empty")]
    Empty,

    #[error("stored token is null")]
    Null,

    #[error("stored token is unreadable: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl GitHubToken {
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            token_type: token_type.into(),
            scope: scope.into(),
        }
    }

    /// The unauthenticated default: every field empty.
    pub fn empty() -> Self {
        Self::new("", "", "")
    }

    /// Access token, or `""` when none was issued.
    pub fn access_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token().is_empty()
    }

    /// Parse a serialized token.
    pub fn parse(serialized: &str) -> Result<Self, TokenParseError> {
        if serialized.trim().is_empty() {
            return Err(TokenParseError::Empty);
        }
        let token: Option<GitHubToken> = serde_json::from_str(serialized)?;
        token.ok_or(TokenParseError::Null)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
