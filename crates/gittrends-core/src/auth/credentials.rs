use std::sync::Arc;

use tracing::{debug, warn};

use super::preferences::{
    FilePreferences, KeyringSecretStore, MemoryPreferences, MemorySecretStore, PreferencesStore,
    SecretStore,
};
use super::token::{GitHubToken, TokenParseError};
use super::AuthError;
use crate::config::Config;
use crate::models::UserIdentity;

/// Keychain key holding the serialized OAuth token
const OAUTH_TOKEN_KEY: &str = "OAuthToken";

/// Preference keys for the cached identity
const ALIAS_KEY: &str = "Alias";
const NAME_KEY: &str = "Name";
const AVATAR_URL_KEY: &str = "AvatarUrl";

/// Stored token and cached identity of the signed-in user.
#[derive(Clone)]
pub struct CredentialStore {
    secrets: Arc<dyn SecretStore>,
    preferences: Arc<dyn PreferencesStore>,
}

impl CredentialStore {
    pub fn new(secrets: Arc<dyn SecretStore>, preferences: Arc<dyn PreferencesStore>) -> Self {
        Self {
            secrets,
            preferences,
        }
    }

    /// OS keychain for the token, preferences file next to the config.
    pub fn system(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(KeyringSecretStore::new(&config.keyring_service)),
            Arc::new(FilePreferences::new(Config::preferences_path()?)),
        ))
    }

    /// Nothing is persisted beyond the process.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemorySecretStore::new()),
            Arc::new(MemoryPreferences::new()),
        )
    }

    /// Read the stored token. Missing, null, or unreadable tokens come back
    /// as [`GitHubToken::empty`].
    pub fn get_token(&self) -> GitHubToken {
        let serialized = match self.secrets.get(OAUTH_TOKEN_KEY) {
            Ok(Some(serialized)) => serialized,
            Ok(None) => return GitHubToken::empty(),
            Err(e) => {
                warn!(error = %e, "Could not read token from secret store");
                return GitHubToken::empty();
            }
        };
        token_or_empty(GitHubToken::parse(&serialized))
    }

    /// Replace the stored token.
    pub fn save_token(&self, token: Option<&GitHubToken>) -> Result<(), AuthError> {
        let token = token.ok_or(AuthError::InvalidToken)?;
        if token.access_token.is_none() {
            return Err(AuthError::InvalidToken);
        }
        let serialized = token.to_json()?;
        self.secrets.set(OAUTH_TOKEN_KEY, &serialized)?;
        debug!(token_type = %token.token_type, scope = %token.scope, "Token saved");
        Ok(())
    }

    pub fn alias(&self) -> String {
        self.preferences.get_string(ALIAS_KEY, "")
    }

    pub fn display_name(&self) -> String {
        self.preferences.get_string(NAME_KEY, "")
    }

    pub fn avatar_url(&self) -> String {
        self.preferences.get_string(AVATAR_URL_KEY, "")
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            alias: self.alias(),
            display_name: self.display_name(),
            avatar_url: self.avatar_url(),
        }
    }

    /// Write all three identity fields in a single preferences write.
    pub fn save_identity(&self, identity: &UserIdentity) -> Result<(), AuthError> {
        self.preferences.set_strings(&[
            (ALIAS_KEY, &identity.alias),
            (NAME_KEY, &identity.display_name),
            (AVATAR_URL_KEY, &identity.avatar_url),
        ])
    }

    /// Erase the identity and the token. Safe to call when already empty.
    pub fn clear_all(&self) -> Result<(), AuthError> {
        // Identity first: once the name is gone the user reads as signed out
        // even if the keychain delete below fails.
        self.preferences
            .remove(&[ALIAS_KEY, NAME_KEY, AVATAR_URL_KEY])?;
        self.secrets.delete(OAUTH_TOKEN_KEY)?;
        debug!("Credentials cleared");
        Ok(())
    }
}

/// Recovery policy for stored tokens: anything unreadable counts as signed out.
pub fn token_or_empty(parsed: Result<GitHubToken, TokenParseError>) -> GitHubToken {
    match parsed {
        Ok(token) => token,
        Err(TokenParseError::Malformed(e)) => {
            warn!(error = %e, "Stored token is unreadable, treating as signed out");
            GitHubToken::empty()
        }
        Err(_) => GitHubToken::empty(),
    }
}
