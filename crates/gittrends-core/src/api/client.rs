//! reqwest implementation of [`TokenExchangeClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiError, TokenExchangeClient};
use crate::auth::GitHubToken;
use crate::config::Config;
use crate::models::UserIdentity;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// GitHub rejects API requests without a User-Agent
const USER_AGENT: &str = concat!("gittrends/", env!("CARGO_PKG_VERSION"));

const VIEWER_QUERY: &str = "query { viewer { login name avatarUrl } }";

#[derive(Debug, Deserialize)]
struct ClientIdResponse {
    #[serde(rename = "clientId")]
    client_id: String,
}

#[derive(Debug, Serialize)]
struct GenerateTokenRequest<'a> {
    #[serde(rename = "loginCode")]
    login_code: &'a str,
    state: &'a str,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    login: String,
    name: Option<String>,
    #[serde(rename = "avatarUrl")]
    avatar_url: Option<String>,
}

/// Client for the GitTrends backend and GitHub GraphQL.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_base_url: String,
    graphql_url: String,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            graphql_url: config.graphql_url.clone(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff; it doubles on each retry.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let attempt = request
                .try_clone()
                .ok_or_else(|| ApiError::InvalidResponse(format!("Request to {} cannot be retried", url)))?;
            let response = attempt.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl TokenExchangeClient for ApiClient {
    async fn client_id(&self) -> Result<String, ApiError> {
        let url = format!("{}/GetGitHubClientId", self.api_base_url);
        let response: ClientIdResponse = self.send(self.client.get(&url), &url).await?;
        debug!("Fetched GitHub client id");
        Ok(response.client_id)
    }

    async fn exchange_code_for_token(&self, code: &str, state: &str) -> Result<GitHubToken, ApiError> {
        let url = format!("{}/GenerateGitTrendsOAuthToken", self.api_base_url);
        let body = GenerateTokenRequest {
            login_code: code,
            state,
        };
        let token: GitHubToken = self.send(self.client.post(&url).json(&body), &url).await?;
        debug!(token_type = %token.token_type, scope = %token.scope, "Exchanged authorization code");
        Ok(token)
    }

    async fn current_user_identity(&self, token: &GitHubToken) -> Result<UserIdentity, ApiError> {
        let request = self
            .client
            .post(&self.graphql_url)
            .bearer_auth(token.access_token())
            .json(&GraphQlRequest { query: VIEWER_QUERY });
        let response: GraphQlResponse<ViewerData> = self.send(request, &self.graphql_url).await?;

        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(ApiError::GraphQl(messages.join("; ")));
        }
        let viewer = response
            .data
            .ok_or_else(|| ApiError::InvalidResponse("GraphQL response has no data".to_string()))?
            .viewer;

        debug!(login = %viewer.login, "Fetched current GitHub user");
        Ok(UserIdentity {
            alias: viewer.login,
            display_name: viewer.name.unwrap_or_default(),
            avatar_url: viewer.avatar_url.unwrap_or_default(),
        })
    }
}
