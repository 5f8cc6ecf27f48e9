//! Configuration Types
//!
//! Token manager configuration types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::token::{ClaimExpectations, VerificationKey};

/// Token manager configuration.
#[derive(Clone)]
pub struct TokenManagerConfig {
    /// Authorization server base URL.
    pub server: String,
    /// Registered client credentials. Absent for inbound-token-only usage.
    pub credentials: Option<ClientCredentials>,
    /// Resolve the current token when the manager is constructed.
    pub auto_load_token: bool,
    /// Refresh an expired token automatically during validity checks.
    pub auto_refresh_token: bool,
    /// Key used for signature verification. Verification is skipped when absent.
    pub verification_key: Option<VerificationKey>,
    /// Claim values a token must carry to pass signature validation.
    pub claim_expectations: ClaimExpectations,
    /// Token endpoint path relative to `server`.
    pub token_path: String,
    /// Resource owner endpoint path relative to `server`.
    pub resource_owner_path: String,
    /// HTTP timeout for authorization-server calls.
    pub timeout: Duration,
}

impl TokenManagerConfig {
    /// Full token endpoint URL.
    pub fn token_endpoint(&self) -> String {
        join_url(&self.server, &self.token_path)
    }

    /// Full resource owner endpoint URL.
    pub fn resource_owner_endpoint(&self) -> String {
        join_url(&self.server, &self.resource_owner_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            credentials: None,
            auto_load_token: true,
            auto_refresh_token: true,
            verification_key: None,
            claim_expectations: ClaimExpectations::default(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            resource_owner_path: DEFAULT_RESOURCE_OWNER_PATH.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl std::fmt::Debug for TokenManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManagerConfig")
            .field("server", &self.server)
            .field("credentials", &self.credentials)
            .field("auto_load_token", &self.auto_load_token)
            .field("auto_refresh_token", &self.auto_refresh_token)
            .field("verification_key", &self.verification_key)
            .field("claim_expectations", &self.claim_expectations)
            .field("token_path", &self.token_path)
            .field("resource_owner_path", &self.resource_owner_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Client credentials for authenticating against the token endpoint.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl ClientCredentials {
    /// Create credentials sent in the request body.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            auth_method: ClientAuthMethod::default(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in request body.
    #[default]
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
}

/// Grant type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "password")]
    Password,
    #[serde(rename = "client_credentials")]
    ClientCredentials,
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration options as accepted from a settings document.
///
/// Field names follow the recognized option keys (`server`, `clientId`, ...).
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOptions {
    /// Authorization server base URL.
    #[serde(default)]
    pub server: Option<String>,
    /// Client identifier.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Resolve the token at construction.
    #[serde(default)]
    pub auto_load_token: Option<bool>,
    /// Refresh expired tokens automatically.
    #[serde(default)]
    pub auto_refresh_token: Option<bool>,
    /// Verification key material (PEM public key or shared secret).
    #[serde(default)]
    pub token_verify_public_key: Option<String>,
}

impl std::fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("server", &self.server)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auto_load_token", &self.auto_load_token)
            .field("auto_refresh_token", &self.auto_refresh_token)
            .field(
                "token_verify_public_key",
                &self.token_verify_public_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Default configuration values.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;
pub const DEFAULT_TOKEN_PATH: &str = "/api/oauth/token";
pub const DEFAULT_RESOURCE_OWNER_PATH: &str = "/api/oauth/resource";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_type_as_str() {
        assert_eq!(GrantType::Password.as_str(), "password");
        assert_eq!(GrantType::ClientCredentials.as_str(), "client_credentials");
        assert_eq!(GrantType::RefreshToken.as_str(), "refresh_token");
        assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
    }

    #[test]
    fn test_endpoints_join_cleanly() {
        let config = TokenManagerConfig {
            server: "https://auth.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.token_endpoint(),
            "https://auth.example.com/api/oauth/token"
        );
        assert_eq!(
            config.resource_owner_endpoint(),
            "https://auth.example.com/api/oauth/resource"
        );
    }

    #[test]
    fn test_config_options_use_option_keys() {
        let json = r#"{
            "server": "https://auth.example.com",
            "clientId": "app",
            "clientSecret": "s3cret",
            "autoRefreshToken": false
        }"#;
        let options: ConfigOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.server.as_deref(), Some("https://auth.example.com"));
        assert_eq!(options.client_id.as_deref(), Some("app"));
        assert_eq!(options.auto_refresh_token, Some(false));
        assert_eq!(options.auto_load_token, None);
        assert!(!format!("{options:?}").contains("s3cret"));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = ClientCredentials::new("app", "s3cret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("app"));
        assert!(!debug.contains("s3cret"));
    }
}
