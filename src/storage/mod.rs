//! Token Storage
//!
//! Backends that persist exactly one token per logical session.
//!
//! - **Memory**: in-process slot
//! - **Cookie**: JSON record in a named cookie
//! - **File**: JSON record in a file
//! - **RequestHeader**: inbound `Authorization: Bearer` header with an in-process overlay

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::OAuth2Error;
use crate::token::Token;

pub mod cookie;
pub mod file;
pub mod header;
pub mod memory;

pub use cookie::{CookieOptions, CookieTokenStorage, DEFAULT_COOKIE_NAME};
pub use file::FileTokenStorage;
pub use header::RequestHeaderTokenStorage;
pub use memory::MemoryTokenStorage;

/// Token storage interface.
///
/// `get` reports "nothing stored" as `Ok(None)`; errors are reserved for
/// backend failures and for stored values that are not valid tokens.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Retrieve the stored token.
    async fn get(&self) -> Result<Option<Token>, OAuth2Error>;

    /// Store a token, replacing any existing one.
    async fn save(&self, token: &Token) -> Result<(), OAuth2Error>;

    /// Remove the stored token. Succeeds when nothing is stored.
    async fn delete(&self) -> Result<(), OAuth2Error>;
}

#[async_trait]
impl<S: TokenStorage + ?Sized> TokenStorage for Arc<S> {
    async fn get(&self) -> Result<Option<Token>, OAuth2Error> {
        (**self).get().await
    }

    async fn save(&self, token: &Token) -> Result<(), OAuth2Error> {
        (**self).save(token).await
    }

    async fn delete(&self) -> Result<(), OAuth2Error> {
        (**self).delete().await
    }
}

#[async_trait]
impl<S: TokenStorage + ?Sized> TokenStorage for Box<S> {
    async fn get(&self) -> Result<Option<Token>, OAuth2Error> {
        (**self).get().await
    }

    async fn save(&self, token: &Token) -> Result<(), OAuth2Error> {
        (**self).save(token).await
    }

    async fn delete(&self) -> Result<(), OAuth2Error> {
        (**self).delete().await
    }
}

/// Decode a persisted JSON record.
///
/// Unreadable records are treated as absent; a readable record whose token
/// does not decode is an error.
pub(crate) fn decode_record(raw: &str, source: &str) -> Result<Option<Token>, OAuth2Error> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<crate::types::StoredTokenRecord>(raw) {
        Ok(record) => Token::from_record(record).map(Some),
        Err(e) => {
            tracing::warn!(source, error = %e, "Ignoring unreadable token record");
            Ok(None)
        }
    }
}

/// Encode a token as a persisted JSON record.
pub(crate) fn encode_record(token: &Token) -> Result<String, OAuth2Error> {
    serde_json::to_string(&token.to_record()).map_err(|e| {
        crate::error::StorageError::SerializationFailed {
            message: e.to_string(),
        }
        .into()
    })
}
