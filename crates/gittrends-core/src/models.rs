//! Data types shared between the API client and the credential store.

use serde::{Deserialize, Serialize};

/// Minimal profile of the signed-in GitHub user, cached locally after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct UserIdentity {
    /// Login handle, e.g. `octocat`
    pub alias: String,
    pub display_name: String,
    pub avatar_url: String,
}

impl UserIdentity {
    pub fn new(
        alias: impl Into<String>,
        display_name: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            display_name: display_name.into(),
            avatar_url: avatar_url.into(),
        }
    }

    /// Signed in means a display name is cached. Whitespace does not count.
    pub fn is_authenticated(&self) -> bool {
        !self.display_name.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_authenticated() {
        assert!(UserIdentity::new("octocat", "The Octocat", "").is_authenticated());
        assert!(!UserIdentity::default().is_authenticated());
        assert!(!UserIdentity::new("octocat", "  ", "").is_authenticated());
        // Alias alone is not enough
        assert!(!UserIdentity::new("octocat", "", "https://x").is_authenticated());
    }
}
