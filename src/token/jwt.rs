//! Access Token
//!
//! Decoded compact (JWT) access token with its refresh credential.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::error::{OAuth2Error, TokenError};
use crate::token::{ClaimExpectations, SigningAlgorithm, VerificationKey};
use crate::types::StoredTokenRecord;

fn compact_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Literal pattern, covered by the tests below; it cannot fail at runtime.
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_=-]+)\.([A-Za-z0-9_=-]+)\.([A-Za-z0-9_.+=-]+)$")
            .expect("compact token pattern is valid")
    })
}

/// Decoded bearer token.
///
/// A `Token` always holds a compact value whose header and claims decoded
/// successfully and whose `alg` is supported. Tokens are never mutated;
/// refreshing produces a new instance.
#[derive(Clone, PartialEq)]
pub struct Token {
    compact: String,
    algorithm: SigningAlgorithm,
    header: Map<String, Value>,
    claims: Map<String, Value>,
    refresh_credential: Option<String>,
}

impl Token {
    /// Decode a compact token without a refresh credential.
    pub fn parse(compact: impl Into<String>) -> Result<Self, OAuth2Error> {
        Self::new(compact, None)
    }

    /// Decode a compact token, attaching an optional refresh credential.
    ///
    /// Fails with `Malformed` when the value is not a decodable
    /// `header.payload.signature` string and with `UnsupportedAlgorithm` when
    /// the header names an algorithm outside the supported set.
    pub fn new(
        compact: impl Into<String>,
        refresh_credential: Option<String>,
    ) -> Result<Self, OAuth2Error> {
        let compact = compact.into();
        let (header_segment, payload_segment, _) = split_compact(&compact)?;

        let header = decode_segment(header_segment, "header")?;
        let algorithm = match header.get("alg") {
            Some(Value::String(alg)) => SigningAlgorithm::from_name(alg)
                .ok_or_else(|| TokenError::UnsupportedAlgorithm { alg: alg.clone() })?,
            Some(other) => {
                return Err(TokenError::UnsupportedAlgorithm {
                    alg: other.to_string(),
                }
                .into())
            }
            None => {
                return Err(TokenError::Malformed {
                    message: "header has no alg".to_string(),
                }
                .into())
            }
        };
        let claims = decode_segment(payload_segment, "payload")?;

        Ok(Self {
            compact,
            algorithm,
            header,
            claims,
            refresh_credential: refresh_credential.filter(|r| !r.is_empty()),
        })
    }

    /// Rebuild a token from a persisted record.
    pub fn from_record(record: StoredTokenRecord) -> Result<Self, OAuth2Error> {
        Self::new(record.access_token, record.refresh_token)
    }

    /// The original compact token string.
    pub fn compact(&self) -> &str {
        &self.compact
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// `exp` claim in epoch seconds. A non-numeric `exp` counts as absent.
    pub fn expiry(&self) -> Option<i64> {
        match self.claims.get("exp")? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry()
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Whether `exp` lies in the past.
    pub fn has_expired(&self) -> Result<bool, OAuth2Error> {
        self.has_expired_at(Utc::now().timestamp())
    }

    fn has_expired_at(&self, now: i64) -> Result<bool, OAuth2Error> {
        let expiry = self.expiry().ok_or(TokenError::MissingExpiry)?;
        Ok(expiry < now)
    }

    /// `sub` claim.
    pub fn resource_owner_id(&self) -> Option<String> {
        claim_as_string(self.claims.get("sub")?)
    }

    pub fn issuer(&self) -> Option<String> {
        claim_as_string(self.claims.get("iss")?)
    }

    pub fn audience(&self) -> Option<&Value> {
        self.claims.get("aud")
    }

    /// Raw `scope` claim when it is a string.
    pub fn scope(&self) -> Option<&str> {
        self.claims.get("scope")?.as_str()
    }

    /// Granted scopes. Accepts a space separated string or an array of strings.
    pub fn scopes(&self) -> HashSet<String> {
        match self.claims.get("scope") {
            Some(Value::String(scope)) => scope.split_whitespace().map(String::from).collect(),
            Some(Value::Array(scopes)) => scopes
                .iter()
                .filter_map(|s| s.as_str())
                .map(String::from)
                .collect(),
            _ => HashSet::new(),
        }
    }

    /// Whether every scope in `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        let granted = self.scopes();
        required.iter().all(|s| granted.contains(s.as_ref()))
    }

    pub fn refresh_credential(&self) -> Option<&str> {
        self.refresh_credential.as_deref()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.compact)
    }

    /// Check the claim set against `expectations`, then verify the signature
    /// with `key` using the algorithm named in the header.
    pub fn validate_signature(
        &self,
        key: &VerificationKey,
        expectations: &ClaimExpectations,
    ) -> Result<(), OAuth2Error> {
        let (header_segment, payload_segment, signature) = split_compact(&self.compact)?;
        let claims = decode_segment(payload_segment, "payload")?;
        expectations.check(&claims)?;

        let message = format!("{}.{}", header_segment, payload_segment);
        self.algorithm.verify(&message, signature, key)
    }

    /// Persistable record for file and cookie storage.
    pub fn to_record(&self) -> StoredTokenRecord {
        StoredTokenRecord {
            access_token: self.compact.clone(),
            refresh_token: self.refresh_credential.clone(),
            expires: self.expiry(),
            resource_owner_id: self.resource_owner_id(),
            scope: None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.compact)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("sub", &self.resource_owner_id())
            .field("exp", &self.expiry())
            .field(
                "refresh_credential",
                &self.refresh_credential.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn split_compact(compact: &str) -> Result<(&str, &str, &str), TokenError> {
    let captures = compact_token_pattern()
        .captures(compact)
        .ok_or_else(|| TokenError::Malformed {
            message: "expected header.payload.signature".to_string(),
        })?;
    match (captures.get(1), captures.get(2), captures.get(3)) {
        (Some(header), Some(payload), Some(signature)) => {
            Ok((header.as_str(), payload.as_str(), signature.as_str()))
        }
        _ => Err(TokenError::Malformed {
            message: "expected header.payload.signature".to_string(),
        }),
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Map<String, Value>, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| TokenError::Malformed {
            message: format!("{} is not base64url: {}", name, e),
        })?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(TokenError::Malformed {
            message: format!("{} is not a JSON object", name),
        }),
        Err(e) => Err(TokenError::Malformed {
            message: format!("{} is not JSON: {}", name, e),
        }),
    }
}

fn claim_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
