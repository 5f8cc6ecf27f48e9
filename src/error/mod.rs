//! OAuth2 Error Types
//!
//! Error hierarchy for token decoding, storage and authorization-server calls.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the token manager.
#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Authorization server error: {0}")]
    AuthServer(#[from] AuthServerError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl OAuth2Error {
    /// Stable error code for structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "OAUTH2_CONFIG",
            Self::Token(_) => "OAUTH2_TOKEN",
            Self::AuthServer(_) => "OAUTH2_AUTH_SERVER",
            Self::Network(_) => "OAUTH2_NETWORK",
            Self::Storage(_) => "OAUTH2_STORAGE",
            Self::Protocol(_) => "OAUTH2_PROTOCOL",
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::AuthServer(e) => e.is_server_side(),
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network(NetworkError::RateLimited { retry_after }) => {
                Some(Duration::from_secs(*retry_after as u64))
            }
            _ => None,
        }
    }

    /// Check if error requires the caller to authenticate again.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Token(TokenError::NoRefreshCredential) => true,
            Self::Token(TokenError::InvalidToken) => true,
            Self::Token(TokenError::SignatureInvalid { .. }) => true,
            Self::Token(TokenError::ClaimValidationFailed { .. }) => true,
            Self::AuthServer(e) => e.error == "invalid_grant" || e.error == "invalid_token",
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid server URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Client identifier and secret are required for this operation")]
    MissingClientCredentials,
}

/// Token decoding and validation error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token: {message}")]
    Malformed { message: String },

    #[error("Token algorithm {alg} not supported. Supported algs: HS256 HS384 HS512 RS256 RS384 RS512")]
    UnsupportedAlgorithm { alg: String },

    #[error("\"exp\" is not set on the token")]
    MissingExpiry,

    #[error("Claim {claim} failed validation: expected {expected}, got {actual}")]
    ClaimValidationFailed {
        claim: String,
        expected: String,
        actual: String,
    },

    #[error("Token signature invalid: {message}")]
    SignatureInvalid { message: String },

    #[error("No refresh credential available")]
    NoRefreshCredential,

    #[error("No valid access token")]
    InvalidToken,
}

/// Error reported by the authorization server.
#[derive(Error, Debug, Clone)]
#[error("{error}{}", .description.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct AuthServerError {
    /// Error identifier (e.g. `invalid_grant`).
    pub error: String,
    /// Numeric code reported alongside the error, 0 when absent.
    pub code: i64,
    /// Human readable description.
    pub description: Option<String>,
    /// HTTP status of the response, when one was received.
    pub status: Option<u16>,
    /// Raw response body.
    pub body: Option<String>,
}

impl AuthServerError {
    /// Create an error with just an identifier.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: 0,
            description: None,
            status: None,
            body: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a numeric code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    fn is_server_side(&self) -> bool {
        matches!(self.status, Some(500..=599))
            || self.error == "server_error"
            || self.error == "temporarily_unavailable"
    }
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u32 },
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },
}

/// Result type for OAuth2 operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Error body returned by the authorization server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AuthServerErrorResponse {
    pub error: serde_json::Value,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthServerErrorResponse {
    /// Error identifier as a string, `None` when the field is empty.
    fn error_name(&self) -> Option<String> {
        match &self.error {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Bool(false) => None,
            other => Some(other.to_string()),
        }
    }

    fn numeric_code(&self) -> i64 {
        match &self.code {
            Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<AuthServerErrorResponse> {
    let response: AuthServerErrorResponse = serde_json::from_str(body).ok()?;
    response.error_name().map(|_| response)
}

/// Create error from HTTP response.
///
/// A body carrying a non-empty `error` field always wins over the status code.
pub fn create_error_from_response(status: u16, body: &str) -> OAuth2Error {
    if let Some(response) = parse_error_response(body) {
        return OAuth2Error::AuthServer(AuthServerError {
            error: response.error_name().unwrap_or_default(),
            code: response.numeric_code(),
            description: response
                .error_description
                .clone()
                .or_else(|| response.message.clone()),
            status: Some(status),
            body: Some(body.to_string()),
        });
    }

    let (error, description) = match status {
        400 => ("invalid_request", "Bad request"),
        401 => ("invalid_client", "Unauthorized"),
        403 => ("unauthorized_client", "Forbidden"),
        429 => ("temporarily_unavailable", "Too many requests"),
        500..=599 => ("server_error", "Server error"),
        _ => ("unexpected_status", "Unexpected response status"),
    };

    OAuth2Error::AuthServer(AuthServerError {
        error: error.to_string(),
        code: status as i64,
        description: Some(format!("{} (HTTP {})", description, status)),
        status: Some(status),
        body: if body.is_empty() {
            None
        } else {
            Some(body.to_string())
        },
    })
}

/// Get user-friendly error message.
pub fn get_user_message(error: &OAuth2Error) -> String {
    match error {
        OAuth2Error::Token(TokenError::NoRefreshCredential) => {
            "Your session cannot be renewed. Please sign in again.".to_string()
        }
        OAuth2Error::Token(TokenError::InvalidToken)
        | OAuth2Error::Token(TokenError::MissingExpiry)
        | OAuth2Error::Token(TokenError::Malformed { .. }) => {
            "You are not signed in. Please sign in again.".to_string()
        }
        OAuth2Error::AuthServer(e) if e.error == "invalid_grant" => {
            "Your session has expired. Please sign in again.".to_string()
        }
        OAuth2Error::AuthServer(e) if e.is_server_side() => {
            "The authentication service is temporarily unavailable. Please try again later."
                .to_string()
        }
        OAuth2Error::Network(NetworkError::RateLimited { retry_after }) => {
            format!("Too many requests. Please wait {} seconds and try again.", retry_after)
        }
        OAuth2Error::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(OAuth2Error::Network(NetworkError::Timeout {
            timeout: Duration::from_secs(30)
        })
        .is_retryable());
        assert!(create_error_from_response(503, "").is_retryable());
        assert!(!create_error_from_response(400, "").is_retryable());
        assert!(!OAuth2Error::Token(TokenError::MissingExpiry).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(create_error_from_response(400, "").error_code(), "OAUTH2_AUTH_SERVER");
        assert_eq!(
            OAuth2Error::Token(TokenError::InvalidToken).error_code(),
            "OAUTH2_TOKEN"
        );
        assert_eq!(
            OAuth2Error::from(ConfigurationError::MissingClientCredentials).error_code(),
            "OAUTH2_CONFIG"
        );
        assert_eq!(
            OAuth2Error::from(NetworkError::RateLimited { retry_after: 3 }).error_code(),
            "OAUTH2_NETWORK"
        );
    }

    #[test]
    fn test_rate_limited() {
        let error = OAuth2Error::from(NetworkError::RateLimited { retry_after: 12 });
        assert!(error.is_retryable());
        assert_eq!(error.retry_after(), Some(Duration::from_secs(12)));
        assert!(get_user_message(&error).contains("12 seconds"));
        assert_eq!(create_error_from_response(429, "").retry_after(), None);
    }

    #[test]
    fn test_needs_reauth() {
        assert!(OAuth2Error::Token(TokenError::NoRefreshCredential).needs_reauth());
        assert!(OAuth2Error::AuthServer(AuthServerError::new("invalid_grant")).needs_reauth());
        assert!(!OAuth2Error::Storage(StorageError::WriteFailed {
            message: "disk".to_string()
        })
        .needs_reauth());
    }

    #[test]
    fn test_error_body_wins_over_status() {
        let body = r#"{"error":"invalid_grant","code":401,"message":"Refresh token revoked"}"#;
        match create_error_from_response(400, body) {
            OAuth2Error::AuthServer(e) => {
                assert_eq!(e.error, "invalid_grant");
                assert_eq!(e.code, 401);
                assert_eq!(e.description.as_deref(), Some("Refresh token revoked"));
                assert_eq!(e.status, Some(400));
                assert_eq!(e.body.as_deref(), Some(body));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_error_field_is_not_an_error_body() {
        assert!(parse_error_response(r#"{"error":"","access_token":"x"}"#).is_none());
        assert!(parse_error_response("not json").is_none());

        match create_error_from_response(401, r#"{"error":""}"#) {
            OAuth2Error::AuthServer(e) => {
                assert_eq!(e.error, "invalid_client");
                assert_eq!(e.code, 401);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_string_error_is_stringified() {
        let response = parse_error_response(r#"{"error":{"reason":"locked"},"code":"7"}"#).unwrap();
        assert_eq!(response.error_name().as_deref(), Some(r#"{"reason":"locked"}"#));
        assert_eq!(response.numeric_code(), 7);
    }

    #[test]
    fn test_auth_server_error_display() {
        let error = AuthServerError::new("invalid_client").with_description("bad secret");
        assert_eq!(error.to_string(), "invalid_client: bad secret");
        assert_eq!(AuthServerError::new("server_error").to_string(), "server_error");
    }
}
