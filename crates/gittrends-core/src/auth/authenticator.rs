//! GitHub OAuth sign-in session.
//!
//! One [`SessionAuthenticator`] owns the single in-flight session id. The
//! flow is:
//!
//! 1. [`SessionAuthenticator::begin_login`] mints a random session id and
//!    returns the GitHub authorize URL carrying it as `state`.
//! 2. The browser redirects back to the app with `code` and `state`.
//! 3. [`SessionAuthenticator::authorize_session`] consumes the session id,
//!    exchanges the code for a token, stores it, and caches the user's
//!    identity.
//!
//! The session id is taken out of its slot before any network call, so of
//! two callbacks racing with the same `state` only one can match.

use std::sync::{Mutex, PoisonError};

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use reqwest::Url;
use tracing::{debug, info, warn};

use super::callback::AuthorizationCallback;
use super::credentials::CredentialStore;
use super::events::SessionEvents;
use super::token::GitHubToken;
use super::AuthError;
use crate::api::TokenExchangeClient;
use crate::config::Config;
use crate::models::UserIdentity;

/// Length of the generated session id (alphanumeric, ~190 bits from the OS RNG)
const SESSION_ID_LEN: usize = 32;

pub struct SessionAuthenticator<C> {
    client: C,
    store: CredentialStore,
    events: SessionEvents,
    github_base_url: String,
    scopes: String,
    session_id: Mutex<Option<String>>,
}

impl<C: TokenExchangeClient> SessionAuthenticator<C> {
    pub fn new(client: C, store: CredentialStore, config: &Config) -> Self {
        Self {
            client,
            store,
            events: SessionEvents::new(),
            github_base_url: config.github_base_url.trim_end_matches('/').to_string(),
            scopes: config.scope_param(),
            session_id: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Start a sign-in attempt and return the URL to open in a browser.
    ///
    /// Any session id still waiting for its callback is replaced.
    pub async fn begin_login(&self) -> Result<String, AuthError> {
        let session_id = new_session_id();
        if self.slot().replace(session_id.clone()).is_some() {
            debug!("Superseding unfinished sign-in session");
        }

        let client_id = self
            .client
            .client_id()
            .await
            .map_err(AuthError::ClientIdUnavailable)?;

        info!("Sign-in session started");
        self.login_url(&client_id, &session_id)
    }

    fn login_url(&self, client_id: &str, session_id: &str) -> Result<String, AuthError> {
        let base = format!("{}/login/oauth/authorize", self.github_base_url);
        let url = Url::parse_with_params(
            &base,
            &[
                ("client_id", client_id),
                ("scope", self.scopes.as_str()),
                ("state", session_id),
            ],
        )
        .map_err(|e| AuthError::Configuration(format!("Invalid GitHub base URL {}: {}", base, e)))?;
        Ok(url.into())
    }

    /// Finish a sign-in attempt from the provider's redirect URI.
    ///
    /// Fires `SessionStarted` first and exactly one `SessionCompleted`
    /// before returning. Errors are returned after the failure event fires.
    pub async fn authorize_session(&self, callback_uri: &str) -> Result<(), AuthError> {
        self.events.emit_started();

        let callback = AuthorizationCallback::parse(callback_uri);
        let live_session = self.slot().take();

        match self.complete(&callback, live_session).await {
            Ok(identity) => {
                info!(login = %identity.alias, "Sign-in completed");
                self.events.emit_completed(true);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.events.emit_completed(false);
                Err(e)
            }
        }
    }

    async fn complete(
        &self,
        callback: &AuthorizationCallback,
        live_session: Option<String>,
    ) -> Result<UserIdentity, AuthError> {
        let code = callback.code().ok_or(AuthError::InvalidAuthorizationCode)?;
        let state = match (callback.state.as_deref(), live_session.as_deref()) {
            (Some(state), Some(live)) if state == live => state,
            _ => return Err(AuthError::SessionMismatch),
        };

        let token = self
            .client
            .exchange_code_for_token(code, state)
            .await
            .map_err(AuthError::TokenExchangeFailed)?;
        self.store.save_token(Some(&token))?;

        // Token is kept if this fails; the user still reads as signed out
        let identity = self
            .client
            .current_user_identity(&token)
            .await
            .map_err(AuthError::IdentityFetchFailed)?;
        self.store.save_identity(&identity)?;

        Ok(identity)
    }

    /// Forget the cached identity and the stored token.
    pub fn log_out(&self) -> Result<(), AuthError> {
        self.store.clear_all()?;
        info!("Signed out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.identity().is_authenticated()
    }

    pub fn identity(&self) -> UserIdentity {
        self.store.identity()
    }

    pub fn alias(&self) -> String {
        self.store.alias()
    }

    pub fn display_name(&self) -> String {
        self.store.display_name()
    }

    pub fn avatar_url(&self) -> String {
        self.store.avatar_url()
    }

    pub fn token(&self) -> GitHubToken {
        self.store.get_token()
    }

    /// Whether a `begin_login` is still waiting for its callback.
    pub fn has_pending_session(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.session_id.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn new_session_id() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::api::ApiError;
    use crate::auth::preferences::{MemoryPreferences, SecretStore};

    #[derive(Default)]
    struct FakeExchange {
        fail_exchange: bool,
        fail_identity: bool,
        exchanges: AtomicUsize,
    }

    #[async_trait]
    impl TokenExchangeClient for FakeExchange {
        async fn client_id(&self) -> Result<String, ApiError> {
            Ok("Iv1.test".to_string())
        }

        async fn exchange_code_for_token(&self, code: &str, _state: &str) -> Result<GitHubToken, ApiError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_exchange {
                return Err(ApiError::ServerError("boom".to_string()));
            }
            Ok(GitHubToken::new(format!("tok-{}", code), "bearer", "repo,read:user"))
        }

        async fn current_user_identity(&self, _token: &GitHubToken) -> Result<UserIdentity, ApiError> {
            if self.fail_identity {
                return Err(ApiError::Unauthorized);
            }
            Ok(UserIdentity::new("octocat", "The Octocat", "https://avatars.test/octocat"))
        }
    }

    /// Secret store whose writes always fail.
    struct ReadOnlySecrets;

    impl SecretStore for ReadOnlySecrets {
        fn get(&self, _key: &str) -> Result<Option<String>, AuthError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), AuthError> {
            Err(AuthError::Storage("keychain is locked".to_string()))
        }

        fn delete(&self, _key: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn authenticator(exchange: FakeExchange) -> SessionAuthenticator<FakeExchange> {
        SessionAuthenticator::new(exchange, CredentialStore::in_memory(), &Config::default())
    }

    fn record_completed(auth: &SessionAuthenticator<FakeExchange>) -> Arc<Mutex<Vec<bool>>> {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let c = completed.clone();
        auth.events().subscribe_completed(move |ok| c.lock().unwrap().push(ok));
        completed
    }

    fn state_of(login_url: &str) -> String {
        let url = Url::parse(login_url).expect("login url parses");
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state param")
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert_eq!(a.len(), SESSION_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_begin_login_url() {
        let auth = authenticator(FakeExchange::default());
        let login_url = auth.begin_login().await.unwrap();

        let url = Url::parse(&login_url).unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        assert_eq!(url.path(), "/login/oauth/authorize");
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("client_id".to_string(), "Iv1.test".to_string())));
        assert!(params.contains(&("scope".to_string(), "repo read:user".to_string())));
        assert_eq!(state_of(&login_url).len(), SESSION_ID_LEN);
        assert!(auth.has_pending_session());
    }

    #[tokio::test]
    async fn test_second_begin_login_supersedes_first() {
        let auth = authenticator(FakeExchange::default());
        let first = state_of(&auth.begin_login().await.unwrap());
        let second = state_of(&auth.begin_login().await.unwrap());
        assert_ne!(first, second);

        let err = auth
            .authorize_session(&format!("gittrends://?code=abc&state={}", first))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionMismatch));
    }

    #[tokio::test]
    async fn test_authorize_success() {
        let auth = authenticator(FakeExchange::default());
        let completed = Arc::new(Mutex::new(Vec::new()));
        let c = completed.clone();
        auth.events().subscribe_completed(move |ok| c.lock().unwrap().push(ok));

        let state = state_of(&auth.begin_login().await.unwrap());
        auth.authorize_session(&format!("gittrends://?code=abc&state={}", state))
            .await
            .unwrap();

        assert_eq!(auth.token().access_token(), "tok-abc");
        assert_eq!(auth.alias(), "octocat");
        assert_eq!(auth.display_name(), "The Octocat");
        assert!(auth.is_authenticated());
        assert!(!auth.has_pending_session());
        assert_eq!(*completed.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_missing_code_clears_session() {
        let auth = authenticator(FakeExchange::default());
        let started = Arc::new(AtomicUsize::new(0));
        let s = started.clone();
        auth.events().subscribe_started(move || {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let completed = record_completed(&auth);

        let state = state_of(&auth.begin_login().await.unwrap());
        let err = auth
            .authorize_session(&format!("gittrends://?state={}", state))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidAuthorizationCode));
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(*completed.lock().unwrap(), vec![false]);

        // The session was consumed by the failed attempt
        let err = auth
            .authorize_session(&format!("gittrends://?code=abc&state={}", state))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionMismatch));
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(*completed.lock().unwrap(), vec![false, false]);
    }

    #[tokio::test]
    async fn test_wrong_state_fires_failure_event() {
        let auth = authenticator(FakeExchange::default());
        let completed = record_completed(&auth);

        auth.begin_login().await.unwrap();
        let err = auth
            .authorize_session("gittrends://?code=abc&state=forged")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::SessionMismatch));
        assert_eq!(*completed.lock().unwrap(), vec![false]);
        assert_eq!(auth.client.exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(auth.identity(), UserIdentity::default());
    }

    #[tokio::test]
    async fn test_token_save_failure_leaves_identity_untouched() {
        let store = CredentialStore::new(Arc::new(ReadOnlySecrets), Arc::new(MemoryPreferences::new()));
        let auth = SessionAuthenticator::new(FakeExchange::default(), store, &Config::default());
        let completed = record_completed(&auth);

        let state = state_of(&auth.begin_login().await.unwrap());
        let err = auth
            .authorize_session(&format!("gittrends://?code=abc&state={}", state))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Storage(_)));
        assert_eq!(auth.client.exchanges.load(Ordering::SeqCst), 1);
        assert_eq!(auth.identity(), UserIdentity::default());
        assert!(!auth.is_authenticated());
        assert_eq!(*completed.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_callback_without_login() {
        let exchange = FakeExchange::default();
        let auth = authenticator(exchange);
        let err = auth
            .authorize_session("gittrends://?code=abc&state=")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionMismatch));
        assert_eq!(auth.client.exchanges.load(Ordering::SeqCst), 0);
        assert_eq!(auth.token(), GitHubToken::empty());
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_callbacks() {
        let auth = authenticator(FakeExchange::default());
        let state = state_of(&auth.begin_login().await.unwrap());
        let uri = format!("gittrends://?code=abc&state={}", state);

        let (a, b) = tokio::join!(auth.authorize_session(&uri), auth.authorize_session(&uri));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let failure = a.err().or(b.err()).expect("one callback fails");
        assert!(matches!(failure, AuthError::SessionMismatch));
        assert_eq!(auth.client.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_failure_leaves_state_untouched() {
        let auth = authenticator(FakeExchange {
            fail_exchange: true,
            ..FakeExchange::default()
        });
        let completed = Arc::new(Mutex::new(Vec::new()));
        let c = completed.clone();
        auth.events().subscribe_completed(move |ok| c.lock().unwrap().push(ok));

        let state = state_of(&auth.begin_login().await.unwrap());
        let err = auth
            .authorize_session(&format!("gittrends://?code=abc&state={}", state))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailed(ApiError::ServerError(_))));
        assert_eq!(auth.token(), GitHubToken::empty());
        assert_eq!(auth.identity(), UserIdentity::default());
        assert_eq!(*completed.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_identity_failure_keeps_token() {
        let auth = authenticator(FakeExchange {
            fail_identity: true,
            ..FakeExchange::default()
        });
        let state = state_of(&auth.begin_login().await.unwrap());
        let err = auth
            .authorize_session(&format!("gittrends://?code=abc&state={}", state))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::IdentityFetchFailed(ApiError::Unauthorized)));
        assert_eq!(auth.token().access_token(), "tok-abc");
        assert_eq!(auth.alias(), "");
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_log_out() {
        let auth = authenticator(FakeExchange::default());
        let state = state_of(&auth.begin_login().await.unwrap());
        auth.authorize_session(&format!("gittrends://?code=abc&state={}", state))
            .await
            .unwrap();
        assert!(auth.is_authenticated());

        auth.log_out().unwrap();
        assert_eq!(auth.alias(), "");
        assert_eq!(auth.display_name(), "");
        assert_eq!(auth.avatar_url(), "");
        assert_eq!(auth.token(), GitHubToken::empty());
        assert!(!auth.is_authenticated());

        auth.log_out().unwrap();
    }
}
