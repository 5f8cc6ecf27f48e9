//! OAuth2 Token Manager
//!
//! Client-side bearer token management against a single trusted
//! authorization server.
//!
//! # Features
//!
//! - Compact (JWT) token decoding with HS256/384/512 and RS256/384/512 signature verification
//! - Pluggable token storage: memory, cookie, file, and inbound `Authorization` header
//! - Automatic refresh of expired tokens (RFC 6749 Section 6)
//! - Resource owner password and client credentials grants
//! - Resource owner lookup and scope checks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oauth2_token_manager::{
//!     token_manager_config, HttpAuthorizationServer, RequestHeaderTokenStorage, TokenManager,
//! };
//!
//! async fn handle(authorization: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = token_manager_config()
//!         .server("https://auth.example.com")
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .build()?;
//!
//!     let server = Arc::new(HttpAuthorizationServer::from_config(&config)?);
//!     let storage = Arc::new(RequestHeaderTokenStorage::new(authorization));
//!     let mut manager = TokenManager::new(config, server, storage).await?;
//!
//!     if manager.check_scope(&["read"]).await? {
//!         let owner = manager.get_resource_owner().await?;
//!         println!("Authenticated as {:?}", owner.id());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, token response, and resource owner types
//! - `error`: error hierarchy and authorization-server error translation
//! - `core`: HTTP transport
//! - `token`: token decoding, signature algorithms, and the token manager
//! - `storage`: token storage backends
//! - `server`: authorization-server client
//! - `builders`: fluent configuration builder

pub mod builders;
pub mod core;
pub mod error;
pub mod server;
pub mod storage;
pub mod token;
pub mod types;

// Re-export builders
pub use builders::{token_manager_config, TokenManagerConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, parse_error_response, AuthServerError,
    ConfigurationError, NetworkError, OAuth2Error, OAuth2Result, ProtocolError, StorageError,
    TokenError,
};

// Re-export types
pub use types::{
    ClientAuthMethod, ClientCredentials, ConfigOptions, GrantType, ResourceOwner,
    StoredTokenRecord, TokenManagerConfig, TokenResponse,
};

// Re-export token
pub use token::{ClaimExpectations, KeyFamily, SigningAlgorithm, Token, TokenManager, VerificationKey};

// Re-export storage
pub use storage::{
    CookieOptions, CookieTokenStorage, FileTokenStorage, MemoryTokenStorage,
    RequestHeaderTokenStorage, TokenStorage,
};

// Re-export server
pub use server::{AuthorizationServer, HttpAuthorizationServer, MockAuthorizationServer};

// Re-export transport
pub use crate::core::{HttpTransport, MockHttpTransport, ReqwestHttpTransport};
