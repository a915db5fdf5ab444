use async_trait::async_trait;

use super::ApiError;
use crate::auth::GitHubToken;
use crate::models::UserIdentity;

/// Remote calls the sign-in flow depends on.
///
/// Every call may fail or be slow; errors are returned unchanged to the
/// authenticator.
#[async_trait]
pub trait TokenExchangeClient: Send + Sync {
    /// Public OAuth client id used to build the authorize URL.
    async fn client_id(&self) -> Result<String, ApiError>;

    /// Trade an authorization code (and the state it came with) for a token.
    async fn exchange_code_for_token(&self, code: &str, state: &str)
        -> Result<GitHubToken, ApiError>;

    /// Look up the user the token belongs to.
    async fn current_user_identity(&self, token: &GitHubToken) -> Result<UserIdentity, ApiError>;
}
