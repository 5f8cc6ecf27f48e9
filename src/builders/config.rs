//! Configuration Builder
//!
//! Fluent builder for token manager configuration.

use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, OAuth2Error};
use crate::token::{ClaimExpectations, VerificationKey};
use crate::types::{
    ClientAuthMethod, ClientCredentials, ConfigOptions, TokenManagerConfig,
    DEFAULT_RESOURCE_OWNER_PATH, DEFAULT_TIMEOUT_MS, DEFAULT_TOKEN_PATH,
};

/// Token manager configuration builder.
#[derive(Default)]
pub struct TokenManagerConfigBuilder {
    server: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_method: Option<ClientAuthMethod>,
    auto_load_token: Option<bool>,
    auto_refresh_token: Option<bool>,
    verification_key: Option<VerificationKey>,
    claim_expectations: ClaimExpectations,
    token_path: Option<String>,
    resource_owner_path: Option<String>,
    timeout: Option<Duration>,
}

impl TokenManagerConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set authorization server base URL.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    pub fn auto_load_token(mut self, enabled: bool) -> Self {
        self.auto_load_token = Some(enabled);
        self
    }

    pub fn auto_refresh_token(mut self, enabled: bool) -> Self {
        self.auto_refresh_token = Some(enabled);
        self
    }

    /// Set the signature verification key.
    pub fn verification_key(mut self, key: VerificationKey) -> Self {
        self.verification_key = Some(key);
        self
    }

    /// Set verification key material: PEM text for RSA, anything else is a
    /// shared secret.
    pub fn token_verify_public_key(mut self, material: impl Into<String>) -> Self {
        self.verification_key = Some(VerificationKey::from_material(material));
        self
    }

    /// Set expected claim values checked during signature validation.
    pub fn claim_expectations(mut self, expectations: ClaimExpectations) -> Self {
        self.claim_expectations = expectations;
        self
    }

    /// Set token endpoint path.
    pub fn token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    /// Set resource owner endpoint path.
    pub fn resource_owner_path(mut self, path: impl Into<String>) -> Self {
        self.resource_owner_path = Some(path.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Apply recognized options from a settings document. Unset options
    /// leave the builder unchanged.
    pub fn from_options(mut self, options: ConfigOptions) -> Self {
        if let Some(server) = options.server {
            self.server = Some(server);
        }
        if let Some(client_id) = options.client_id {
            self.client_id = Some(client_id);
        }
        if let Some(client_secret) = options.client_secret {
            self.client_secret = Some(client_secret);
        }
        if let Some(enabled) = options.auto_load_token {
            self.auto_load_token = Some(enabled);
        }
        if let Some(enabled) = options.auto_refresh_token {
            self.auto_refresh_token = Some(enabled);
        }
        if let Some(material) = options.token_verify_public_key {
            self = self.token_verify_public_key(material);
        }
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env(self) -> Self {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(server) = lookup("OAUTH2_SERVER") {
            self.server = Some(server);
        }
        if let Some(client_id) = lookup("OAUTH2_CLIENT_ID") {
            self.client_id = Some(client_id);
        }
        if let Some(client_secret) = lookup("OAUTH2_CLIENT_SECRET") {
            self.client_secret = Some(client_secret);
        }
        if let Some(val) = lookup("OAUTH2_AUTO_LOAD_TOKEN") {
            self.auto_load_token = Some(parse_flag(&val));
        }
        if let Some(val) = lookup("OAUTH2_AUTO_REFRESH_TOKEN") {
            self.auto_refresh_token = Some(parse_flag(&val));
        }
        if let Some(material) = lookup("OAUTH2_TOKEN_VERIFY_PUBLIC_KEY") {
            if !material.trim().is_empty() {
                self = self.token_verify_public_key(material);
            }
        }
        self
    }

    /// Build configuration.
    pub fn build(self) -> Result<TokenManagerConfig, OAuth2Error> {
        let server = self
            .server
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "server".to_string(),
            })?;

        match Url::parse(&server) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(ConfigurationError::InvalidEndpoint { url: server }.into()),
        }

        let client_id = self.client_id.filter(|s| !s.is_empty());
        let client_secret = self.client_secret.filter(|s| !s.is_empty());
        let credentials = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => {
                let mut credentials = ClientCredentials::new(client_id, client_secret);
                credentials.auth_method = self.auth_method.unwrap_or_default();
                Some(credentials)
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigurationError::MissingRequired {
                    field: "client_secret".to_string(),
                }
                .into())
            }
            (None, Some(_)) => {
                return Err(ConfigurationError::MissingRequired {
                    field: "client_id".to_string(),
                }
                .into())
            }
        };

        Ok(TokenManagerConfig {
            server,
            credentials,
            auto_load_token: self.auto_load_token.unwrap_or(true),
            auto_refresh_token: self.auto_refresh_token.unwrap_or(true),
            verification_key: self.verification_key,
            claim_expectations: self.claim_expectations,
            token_path: self
                .token_path
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
            resource_owner_path: self
                .resource_owner_path
                .unwrap_or_else(|| DEFAULT_RESOURCE_OWNER_PATH.to_string()),
            timeout: self
                .timeout
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Create a new token manager configuration builder.
pub fn token_manager_config() -> TokenManagerConfigBuilder {
    TokenManagerConfigBuilder::new()
}
