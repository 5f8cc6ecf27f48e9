//! Token Types
//!
//! Wire and storage representations of tokens.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token response from authorization server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenResponse {
    /// Create a bearer response around an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            scope: None,
            extra: HashMap::new(),
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Persisted token record, as written to files and cookies.
///
/// Only `access_token` is required on read; older records may also carry
/// `scope`, and records written without a refresh credential omit it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredTokenRecord {
    /// Compact access token.
    pub access_token: String,
    /// Opaque refresh credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry in epoch seconds, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    /// Resource owner identifier, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_owner_id: Option<String>,
    /// Space separated scopes, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}
