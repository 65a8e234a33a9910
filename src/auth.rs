// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Credential supply for both channels.
//!
//! Token acquisition, storage and refresh live outside this crate. The
//! core only needs three things from its host: the current bearer token,
//! a way to force a refresh after the service rejects one, and an expiry
//! hint so the polling loop can refresh ahead of time.

use std::future::Future;

use crate::error::AuthError;

/// Supplies and refreshes the bearer credential used by both channels.
///
/// The REST client presents the token on every request; the stream
/// connection uses it as the broker password. On an authentication
/// rejection the REST client calls [`refresh`](TokenProvider::refresh)
/// and replays the failed call exactly once.
///
/// Futures are required to be `Send` so fleet timers can run provider
/// calls from spawned tasks.
pub trait TokenProvider: Send + Sync {
    /// Returns the current access token.
    fn access_token(&self) -> impl Future<Output = Result<String, AuthError>> + Send;

    /// Forces a refresh and returns the new access token.
    fn refresh(&self) -> impl Future<Output = Result<String, AuthError>> + Send;

    /// Returns `true` when the current token is past (or near) expiry.
    fn is_expired(&self) -> bool;
}

/// A provider wrapping a fixed, non-expiring credential.
///
/// Suitable for long-lived API keys and for tests. Refreshing returns
/// the same token.
///
/// # Examples
///
/// ```
/// use alarmsync::StaticToken;
///
/// let provider = StaticToken::new("api-key");
/// ```
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Creates a provider around a fixed token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        self.access_token().await
    }

    fn is_expired(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_returns_configured_value() {
        let provider = StaticToken::new("secret");
        assert_eq!(provider.access_token().await.unwrap(), "secret");
        assert_eq!(provider.refresh().await.unwrap(), "secret");
        assert!(!provider.is_expired());
    }

    #[tokio::test]
    async fn empty_token_is_missing_credentials() {
        let provider = StaticToken::new("");
        assert!(matches!(
            provider.access_token().await,
            Err(AuthError::MissingCredentials)
        ));
    }
}
