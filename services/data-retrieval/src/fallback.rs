//! Explicit token substitution policy
//!
//! Clients report unknown tokens as `AssetNotFound`. Whether to retry with a
//! different token is decided here, by the caller, and the substitution is
//! visible in the result.

use crate::types::*;
use std::future::Future;
use tracing::warn;

/// Value fetched for `token_id`
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// Token the value was actually fetched for
    pub token_id: String,
    pub value: T,
    /// True when `token_id` is the fallback, not the requested token
    pub substituted: bool,
}

/// Retry with `fallback_token` when the requested token does not exist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenFallback {
    pub fallback_token: Option<String>,
}

impl TokenFallback {
    pub fn new(fallback_token: Option<String>) -> Self {
        Self { fallback_token }
    }

    /// No substitution: not-found errors reach the caller
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Run `fetch` for `token_id`, then for the fallback token on `AssetNotFound`
    ///
    /// Any other error is returned as is.
    pub async fn resolve<T, F, Fut>(&self, token_id: &str, mut fetch: F) -> Result<Resolved<T>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match fetch(token_id.to_string()).await {
            Ok(value) => Ok(Resolved {
                token_id: token_id.to_string(),
                value,
                substituted: false,
            }),
            Err(e) if e.is_not_found() => {
                let fallback = match &self.fallback_token {
                    Some(f) if !f.eq_ignore_ascii_case(token_id) => f.clone(),
                    _ => return Err(e),
                };

                warn!("Token {} not found, using {} instead", token_id, fallback);
                let value = fetch(fallback.clone()).await?;
                Ok(Resolved {
                    token_id: fallback,
                    value,
                    substituted: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}
