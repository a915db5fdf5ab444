//! Authentication module for the GitHub sign-in flow.
//!
//! This module provides:
//! - `SessionAuthenticator`: OAuth authorization-code session with single-use state
//! - `CredentialStore`: token in the OS keychain, identity in a preferences file
//! - `SessionEvents`: observers for session started / completed
//!
//! A stored token that cannot be read back counts as signed out.

pub mod authenticator;
pub mod callback;
pub mod credentials;
pub mod error;
pub mod events;
pub mod preferences;
pub mod token;

pub use authenticator::SessionAuthenticator;
pub use callback::AuthorizationCallback;
pub use credentials::{token_or_empty, CredentialStore};
pub use error::AuthError;
pub use events::{SessionEvents, SubscriptionId};
pub use preferences::{
    FilePreferences, KeyringSecretStore, MemoryPreferences, MemorySecretStore, PreferencesStore,
    SecretStore,
};
pub use token::{GitHubToken, TokenParseError};
