//! Token Manager
//!
//! Resolves the current token through a storage backend, decides validity,
//! drives refresh and grants against the authorization server, and caches
//! the resource owner.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{ConfigurationError, OAuth2Error, OAuth2Result, TokenError};
use crate::server::AuthorizationServer;
use crate::storage::{RequestHeaderTokenStorage, TokenStorage};
use crate::token::Token;
use crate::types::{ClientCredentials, GrantType, ResourceOwner, TokenManagerConfig};

/// Token manager.
///
/// One manager serves one request or one short-lived process. Methods take
/// `&mut self`; sharing a manager across tasks requires external
/// synchronization.
pub struct TokenManager<A: AuthorizationServer, S: TokenStorage = RequestHeaderTokenStorage> {
    config: TokenManagerConfig,
    server: Arc<A>,
    storage: Arc<S>,
    cached_token: Option<Token>,
    cached_resource_owner: Option<ResourceOwner>,
}

impl<A: AuthorizationServer, S: TokenStorage> TokenManager<A, S> {
    /// Create a manager, resolving the current token when `auto_load_token`
    /// is set.
    ///
    /// A stored value that is not a valid token fails construction.
    pub async fn new(
        config: TokenManagerConfig,
        server: Arc<A>,
        storage: Arc<S>,
    ) -> OAuth2Result<Self> {
        let auto_load = config.auto_load_token;
        let mut manager = Self::with_components(config, server, storage);
        if auto_load {
            manager.get_access_token().await?;
        }
        Ok(manager)
    }

    /// Create a manager without touching storage.
    pub fn with_components(config: TokenManagerConfig, server: Arc<A>, storage: Arc<S>) -> Self {
        Self {
            config,
            server,
            storage,
            cached_token: None,
            cached_resource_owner: None,
        }
    }

    pub fn config(&self) -> &TokenManagerConfig {
        &self.config
    }

    pub fn server(&self) -> &Arc<A> {
        &self.server
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Token seen by the most recent resolution, without re-reading storage.
    pub fn cached_access_token(&self) -> Option<&Token> {
        self.cached_token.as_ref()
    }

    /// Resolve the current token from storage.
    ///
    /// Storage is read on every call and the cache replaced with the result.
    pub async fn get_access_token(&mut self) -> OAuth2Result<Option<Token>> {
        let token = self.storage.get().await?;

        let changed = match (&token, &self.cached_token) {
            (Some(new), Some(old)) => new.compact() != old.compact(),
            (None, None) => false,
            _ => true,
        };
        if changed {
            self.cached_resource_owner = None;
        }

        self.cached_token = token.clone();
        Ok(token)
    }

    /// Persist `token` and make it current.
    pub async fn set_access_token(&mut self, token: Token) -> OAuth2Result<()> {
        self.storage.save(&token).await?;
        debug!(sub = ?token.resource_owner_id(), exp = ?token.expiry(), "Access token stored");
        self.cached_token = Some(token);
        self.cached_resource_owner = None;
        Ok(())
    }

    /// Forget the current token and resource owner, deleting the stored record.
    pub async fn clear_access_token(&mut self) -> OAuth2Result<()> {
        self.cached_token = None;
        self.cached_resource_owner = None;
        self.storage.delete().await
    }

    /// Whether the current token can be used.
    ///
    /// An expired token with a refresh credential is refreshed when
    /// `auto_refresh_token` is set; a failed refresh is returned as an error
    /// after the stored record has been deleted.
    #[instrument(skip(self))]
    pub async fn has_valid_access_token(&mut self) -> OAuth2Result<bool> {
        let token = match self.get_access_token().await? {
            Some(token) => token,
            None => return Ok(false),
        };

        let expired = token.has_expired()?;
        if expired && self.config.auto_refresh_token && token.refresh_credential().is_some() {
            return self.refresh_access_token(None).await.map(|t| t.is_some());
        }
        if expired {
            debug!("Access token expired");
            return Ok(false);
        }

        self.verify_access_token(&token)
    }

    /// Check `token` against the configured verification key.
    ///
    /// Always `true` without a key. Claim and signature failures yield
    /// `false`; an unusable key is an error.
    pub fn verify_access_token(&self, token: &Token) -> OAuth2Result<bool> {
        let key = match &self.config.verification_key {
            Some(key) => key,
            None => return Ok(true),
        };

        match token.validate_signature(key, &self.config.claim_expectations) {
            Ok(()) => Ok(true),
            Err(OAuth2Error::Token(e)) => {
                warn!(error = %e, "Access token failed verification");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace an expired token using its refresh credential, or `credential`
    /// when given.
    ///
    /// Returns `None` when no token is stored and the current token when it
    /// has not expired. Once the authorization server has been called, any
    /// failure deletes the stored record before being returned.
    #[instrument(skip(self, credential))]
    pub async fn refresh_access_token(
        &mut self,
        credential: Option<&str>,
    ) -> OAuth2Result<Option<Token>> {
        let token = match self.get_access_token().await? {
            Some(token) => token,
            None => return Ok(None),
        };
        if !token.has_expired()? {
            return Ok(Some(token));
        }

        let credential = credential
            .filter(|c| !c.is_empty())
            .or_else(|| token.refresh_credential())
            .map(str::to_string)
            .ok_or(TokenError::NoRefreshCredential)?;
        self.client_credentials()?;

        info!(sub = ?token.resource_owner_id(), "Refreshing expired access token");
        let mut params = HashMap::new();
        params.insert("refresh_token".to_string(), credential.clone());

        self.acquire(GrantType::RefreshToken, params, Some(credential))
            .await
            .map(Some)
    }

    /// Obtain a token with the resource owner password grant.
    #[instrument(skip(self, password))]
    pub async fn do_password_grant(&mut self, username: &str, password: &str) -> OAuth2Result<Token> {
        self.client_credentials()?;

        let mut params = HashMap::new();
        params.insert("username".to_string(), username.to_string());
        params.insert("password".to_string(), password.to_string());

        self.acquire(GrantType::Password, params, None).await
    }

    /// Obtain a token with the client credentials grant.
    #[instrument(skip(self, scopes))]
    pub async fn do_client_grant<T: AsRef<str>>(&mut self, scopes: &[T]) -> OAuth2Result<Token> {
        self.client_credentials()?;

        let mut params = HashMap::new();
        if !scopes.is_empty() {
            let scope = scopes
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(" ");
            params.insert("scope".to_string(), scope);
        }

        self.acquire(GrantType::ClientCredentials, params, None).await
    }

    /// Resource owner of the current token, fetched once per token.
    ///
    /// A failed lookup clears the current token.
    #[instrument(skip(self))]
    pub async fn get_resource_owner(&mut self) -> OAuth2Result<ResourceOwner> {
        if !self.has_valid_access_token().await? {
            return Err(TokenError::InvalidToken.into());
        }
        if let Some(owner) = &self.cached_resource_owner {
            return Ok(owner.clone());
        }
        let token = self
            .cached_token
            .clone()
            .ok_or(TokenError::InvalidToken)?;

        match self.server.request_resource_owner(&token).await {
            Ok(owner) => {
                debug!(id = ?owner.id(), "Resource owner fetched");
                self.cached_resource_owner = Some(owner.clone());
                Ok(owner)
            }
            Err(e) => {
                warn!(
                    code = e.error_code(),
                    error = %e,
                    "Resource owner lookup failed, clearing token"
                );
                self.clear_quietly().await;
                Err(e)
            }
        }
    }

    /// Whether the current token is valid and grants every scope in `required`.
    pub async fn check_scope<T: AsRef<str>>(&mut self, required: &[T]) -> OAuth2Result<bool> {
        if !self.has_valid_access_token().await? {
            return Ok(false);
        }
        Ok(self
            .cached_token
            .as_ref()
            .map(|token| token.has_scopes(required))
            .unwrap_or(false))
    }

    fn client_credentials(&self) -> OAuth2Result<&ClientCredentials> {
        use secrecy::ExposeSecret;

        match &self.config.credentials {
            Some(c) if !c.client_id.is_empty() && !c.client_secret.expose_secret().is_empty() => {
                Ok(c)
            }
            _ => Err(ConfigurationError::MissingClientCredentials.into()),
        }
    }

    /// Call the token endpoint and store the result, clearing state on failure.
    async fn acquire(
        &mut self,
        grant: GrantType,
        params: HashMap<String, String>,
        previous_refresh: Option<String>,
    ) -> OAuth2Result<Token> {
        match self.exchange(grant, params, previous_refresh).await {
            Ok(token) => {
                info!(grant = %grant, sub = ?token.resource_owner_id(), "Access token acquired");
                Ok(token)
            }
            Err(e) => {
                warn!(
                    grant = %grant,
                    code = e.error_code(),
                    error = %e,
                    "Token request failed, clearing stored token"
                );
                self.clear_quietly().await;
                Err(e)
            }
        }
    }

    async fn exchange(
        &mut self,
        grant: GrantType,
        params: HashMap<String, String>,
        previous_refresh: Option<String>,
    ) -> OAuth2Result<Token> {
        let response = self.server.request_token(grant, params).await?;
        let refresh = response
            .refresh_token
            .filter(|r| !r.is_empty())
            .or(previous_refresh);
        let token = Token::new(response.access_token, refresh)?;
        self.set_access_token(token.clone()).await?;
        Ok(token)
    }

    async fn clear_quietly(&mut self) {
        if let Err(e) = self.clear_access_token().await {
            warn!(code = e.error_code(), error = %e, "Failed to delete stored token");
        }
    }
}

impl<A: AuthorizationServer, S: TokenStorage> std::fmt::Debug for TokenManager<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .field("cached_token", &self.cached_token)
            .field("cached_resource_owner", &self.cached_resource_owner.is_some())
            .finish()
    }
}
