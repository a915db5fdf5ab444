//! GitTrends sign-in core.
//!
//! Drives the GitHub OAuth authorization-code flow: mints a single-use
//! session id, builds the authorize URL, validates the redirect, trades the
//! code for a token through the GitTrends backend, stores the token in the
//! OS keychain and caches the user's identity.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, TokenExchangeClient};
pub use auth::{AuthError, CredentialStore, GitHubToken, SessionAuthenticator, SessionEvents};
pub use config::Config;
pub use models::UserIdentity;
