//! Authorization Server Client
//!
//! Token endpoint and resource owner endpoint calls made on behalf of the
//! token manager.

use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::{HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{
    create_error_from_response, parse_error_response, NetworkError, OAuth2Error, ProtocolError,
};
use crate::token::Token;
use crate::types::{
    ClientAuthMethod, ClientCredentials, GrantType, ResourceOwner, TokenManagerConfig,
    TokenResponse,
};

/// Authorization server interface (for dependency injection).
#[async_trait]
pub trait AuthorizationServer: Send + Sync {
    /// Exchange a grant for a token.
    async fn request_token(
        &self,
        grant: GrantType,
        params: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuth2Error>;

    /// Fetch the identity the token represents.
    async fn request_resource_owner(&self, token: &Token) -> Result<ResourceOwner, OAuth2Error>;
}

#[async_trait]
impl<A: AuthorizationServer + ?Sized> AuthorizationServer for Arc<A> {
    async fn request_token(
        &self,
        grant: GrantType,
        params: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuth2Error> {
        (**self).request_token(grant, params).await
    }

    async fn request_resource_owner(&self, token: &Token) -> Result<ResourceOwner, OAuth2Error> {
        (**self).request_resource_owner(token).await
    }
}

/// HTTP authorization server client.
pub struct HttpAuthorizationServer<T: HttpTransport> {
    token_endpoint: String,
    resource_owner_endpoint: String,
    credentials: Option<ClientCredentials>,
    timeout: Duration,
    transport: Arc<T>,
}

impl<T: HttpTransport> HttpAuthorizationServer<T> {
    /// Create a client for the server named in `config`.
    pub fn new(config: &TokenManagerConfig, transport: Arc<T>) -> Self {
        Self {
            token_endpoint: config.token_endpoint(),
            resource_owner_endpoint: config.resource_owner_endpoint(),
            credentials: config.credentials.clone(),
            timeout: config.timeout,
            transport,
        }
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    pub fn resource_owner_endpoint(&self) -> &str {
        &self.resource_owner_endpoint
    }

    fn build_token_request_body(&self, grant: GrantType, params: &HashMap<String, String>) -> String {
        let mut extra: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k.as_str() != "grant_type")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        extra.sort_unstable();

        let mut pairs = vec![("grant_type", grant.as_str())];
        pairs.extend(extra);

        if let Some(credentials) = &self.credentials {
            if credentials.auth_method == ClientAuthMethod::ClientSecretPost {
                pairs.push(("client_id", credentials.client_id.as_str()));
                pairs.push(("client_secret", credentials.client_secret.expose_secret().as_str()));
            }
        }

        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn build_token_request_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());

        if let Some(credentials) = &self.credentials {
            if credentials.auth_method == ClientAuthMethod::ClientSecretBasic {
                let pair = format!(
                    "{}:{}",
                    credentials.client_id,
                    credentials.client_secret.expose_secret()
                );
                let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
                headers.insert("authorization".to_string(), format!("Basic {}", encoded));
            }
        }

        headers
    }
}

impl HttpAuthorizationServer<ReqwestHttpTransport> {
    /// Create a client backed by reqwest, using the configured timeout.
    pub fn from_config(config: &TokenManagerConfig) -> Result<Self, OAuth2Error> {
        let transport = ReqwestHttpTransport::with_options(
            config.timeout,
            crate::core::DEFAULT_MAX_RESPONSE_SIZE,
        )?;
        Ok(Self::new(config, Arc::new(transport)))
    }
}

impl<T: HttpTransport> std::fmt::Debug for HttpAuthorizationServer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAuthorizationServer")
            .field("token_endpoint", &self.token_endpoint)
            .field("resource_owner_endpoint", &self.resource_owner_endpoint)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parse a JSON object body, translating error bodies and non-2xx statuses.
///
/// A bare 429 with a `Retry-After` header in seconds becomes
/// `NetworkError::RateLimited`; an `error` body still wins.
fn parse_object_response(
    response: &HttpResponse,
) -> Result<serde_json::Map<String, Value>, OAuth2Error> {
    let error_body = parse_error_response(&response.body).is_some();
    if response.status == 429 && !error_body {
        if let Some(retry_after) = extract_retry_after(response) {
            return Err(NetworkError::RateLimited { retry_after }.into());
        }
    }
    if !response.is_success() || error_body {
        return Err(create_error_from_response(response.status, &response.body));
    }

    match serde_json::from_str(&response.body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ProtocolError::InvalidJson {
            message: "expected a JSON object".to_string(),
        }
        .into()),
        Err(e) => Err(ProtocolError::InvalidJson {
            message: e.to_string(),
        }
        .into()),
    }
}

fn extract_retry_after(response: &HttpResponse) -> Option<u32> {
    response
        .headers
        .get("retry-after")
        .and_then(|v| v.trim().parse::<u32>().ok())
}

#[async_trait]
impl<T: HttpTransport> AuthorizationServer for HttpAuthorizationServer<T> {
    #[instrument(skip(self, params))]
    async fn request_token(
        &self,
        grant: GrantType,
        params: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuth2Error> {
        let request = HttpRequest {
            headers: self.build_token_request_headers(),
            ..HttpRequest::post(&self.token_endpoint, self.build_token_request_body(grant, &params))
        }
        .timeout(self.timeout);

        let response = self.transport.send(request).await?;
        debug!(status = response.status, "Token endpoint responded");

        let body = parse_object_response(&response)?;
        if !matches!(body.get("access_token"), Some(Value::String(s)) if !s.is_empty()) {
            return Err(ProtocolError::MissingField {
                field: "access_token".to_string(),
            }
            .into());
        }

        serde_json::from_value(Value::Object(body)).map_err(|e| {
            OAuth2Error::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })
    }

    #[instrument(skip(self, token))]
    async fn request_resource_owner(&self, token: &Token) -> Result<ResourceOwner, OAuth2Error> {
        let request = HttpRequest::get(&self.resource_owner_endpoint)
            .header("accept", "application/json")
            .header("authorization", token.authorization_header())
            .timeout(self.timeout);

        let response = self.transport.send(request).await?;
        debug!(status = response.status, "Resource owner endpoint responded");

        parse_object_response(&response).map(ResourceOwner::from_map)
    }
}

/// Mock authorization server for testing.
///
/// Queued results are returned in order; an empty queue yields a connection
/// error.
#[derive(Default)]
pub struct MockAuthorizationServer {
    token_results: Mutex<VecDeque<Result<TokenResponse, OAuth2Error>>>,
    owner_results: Mutex<VecDeque<Result<ResourceOwner, OAuth2Error>>>,
    token_history: Mutex<Vec<(GrantType, HashMap<String, String>)>>,
    owner_history: Mutex<Vec<String>>,
}

impl MockAuthorizationServer {
    /// Create new mock server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful token response.
    pub fn queue_token(&self, response: TokenResponse) -> &Self {
        self.token_results.lock().push_back(Ok(response));
        self
    }

    /// Queue a failed token request.
    pub fn queue_token_error(&self, error: OAuth2Error) -> &Self {
        self.token_results.lock().push_back(Err(error));
        self
    }

    /// Queue a resource owner lookup result.
    pub fn queue_resource_owner(&self, result: Result<ResourceOwner, OAuth2Error>) -> &Self {
        self.owner_results.lock().push_back(result);
        self
    }

    /// Token requests received so far.
    pub fn token_requests(&self) -> Vec<(GrantType, HashMap<String, String>)> {
        self.token_history.lock().clone()
    }

    /// Compact tokens presented to the resource owner endpoint so far.
    pub fn resource_owner_requests(&self) -> Vec<String> {
        self.owner_history.lock().clone()
    }

    fn exhausted() -> OAuth2Error {
        OAuth2Error::Network(NetworkError::ConnectionFailed {
            message: "No mock response available".to_string(),
        })
    }
}

#[async_trait]
impl AuthorizationServer for MockAuthorizationServer {
    async fn request_token(
        &self,
        grant: GrantType,
        params: HashMap<String, String>,
    ) -> Result<TokenResponse, OAuth2Error> {
        self.token_history.lock().push((grant, params));
        self.token_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }

    async fn request_resource_owner(&self, token: &Token) -> Result<ResourceOwner, OAuth2Error> {
        self.owner_history.lock().push(token.compact().to_string());
        self.owner_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted()))
    }
}
