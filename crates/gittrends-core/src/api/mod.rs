//! HTTP boundary to the GitTrends backend and the GitHub GraphQL API.
//!
//! The backend hands out the public OAuth client id and trades an
//! authorization code for an access token. GitHub's GraphQL API answers
//! who the token belongs to.

pub mod client;
pub mod error;
pub mod exchange;

pub use client::ApiClient;
pub use error::ApiError;
pub use exchange::TokenExchangeClient;
