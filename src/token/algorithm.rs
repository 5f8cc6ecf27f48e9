//! Signing Algorithms
//!
//! Supported signature algorithms, verification key material and the claim
//! checks applied before cryptographic verification.

use jsonwebtoken::{Algorithm, DecodingKey};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::error::{ConfigurationError, OAuth2Error, TokenError};

/// Signature algorithm named in a token header.
///
/// Only these six are accepted; anything else is rejected when the token is parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    Rs256,
    Rs384,
    Rs512,
}

/// Key family required by an algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
}

impl SigningAlgorithm {
    /// All supported algorithms.
    pub const ALL: [SigningAlgorithm; 6] = [
        Self::Hs256,
        Self::Hs384,
        Self::Hs512,
        Self::Rs256,
        Self::Rs384,
        Self::Rs512,
    ];

    /// Look up an algorithm by its header name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.name() == name)
    }

    /// Header name (`alg` value).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Hs256 | Self::Hs384 | Self::Hs512 => KeyFamily::Hmac,
            Self::Rs256 | Self::Rs384 | Self::Rs512 => KeyFamily::Rsa,
        }
    }

    fn jwt_algorithm(&self) -> Algorithm {
        match self {
            Self::Hs256 => Algorithm::HS256,
            Self::Hs384 => Algorithm::HS384,
            Self::Hs512 => Algorithm::HS512,
            Self::Rs256 => Algorithm::RS256,
            Self::Rs384 => Algorithm::RS384,
            Self::Rs512 => Algorithm::RS512,
        }
    }

    /// Verify `signature` over `message` with `key`.
    ///
    /// Returns `SignatureInvalid` when the key family does not match the
    /// algorithm or the signature does not verify.
    pub fn verify(
        &self,
        message: &str,
        signature: &str,
        key: &VerificationKey,
    ) -> Result<(), OAuth2Error> {
        if key.family() != self.family() {
            return Err(TokenError::SignatureInvalid {
                message: format!("{} requires a {:?} key", self.name(), self.family()),
            }
            .into());
        }

        let decoding_key = key.decoding_key()?;
        let verified = jsonwebtoken::crypto::verify(
            signature,
            message.as_bytes(),
            &decoding_key,
            self.jwt_algorithm(),
        )
        .map_err(|e| TokenError::SignatureInvalid {
            message: e.to_string(),
        })?;

        if verified {
            Ok(())
        } else {
            Err(TokenError::SignatureInvalid {
                message: "signature does not match".to_string(),
            }
            .into())
        }
    }
}

impl std::fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Key material for signature verification.
#[derive(Clone)]
pub enum VerificationKey {
    /// Shared secret for the HMAC algorithms.
    Shared(SecretString),
    /// PEM encoded RSA public key.
    RsaPublicPem(String),
}

impl VerificationKey {
    /// Shared HMAC secret.
    pub fn shared(secret: impl Into<String>) -> Self {
        Self::Shared(SecretString::new(secret.into()))
    }

    /// PEM encoded RSA public key.
    pub fn rsa_pem(pem: impl Into<String>) -> Self {
        Self::RsaPublicPem(pem.into())
    }

    /// Interpret configured key material: PEM text is an RSA key, anything else a shared secret.
    pub fn from_material(material: impl Into<String>) -> Self {
        let material = material.into();
        if material.trim_start().starts_with("-----BEGIN") {
            Self::RsaPublicPem(material)
        } else {
            Self::shared(material)
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Shared(_) => KeyFamily::Hmac,
            Self::RsaPublicPem(_) => KeyFamily::Rsa,
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, OAuth2Error> {
        match self {
            Self::Shared(secret) => Ok(DecodingKey::from_secret(
                secret.expose_secret().as_bytes(),
            )),
            Self::RsaPublicPem(pem) => DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                ConfigurationError::InvalidConfig {
                    message: format!("invalid RSA public key: {}", e),
                }
                .into()
            }),
        }
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shared(_) => f.write_str("Shared([REDACTED])"),
            Self::RsaPublicPem(_) => f.write_str("RsaPublicPem(..)"),
        }
    }
}

/// Expected claim values checked during signature validation.
///
/// Unset fields are not checked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClaimExpectations {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub subject: Option<String>,
    pub id: Option<String>,
}

impl ClaimExpectations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Check the claim set against these expectations.
    pub fn check(&self, claims: &Map<String, Value>) -> Result<(), TokenError> {
        if let Some(issuer) = &self.issuer {
            expect_string(claims.get("iss"), "iss", issuer)?;
        }
        if let Some(subject) = &self.subject {
            expect_string(claims.get("sub"), "sub", subject)?;
        }
        if let Some(id) = &self.id {
            let value = claims.get("jti").or_else(|| claims.get("id"));
            expect_string(value, "jti", id)?;
        }
        if let Some(audience) = &self.audience {
            let matches = match claims.get("aud") {
                Some(Value::String(aud)) => aud == audience,
                Some(Value::Array(auds)) => auds
                    .iter()
                    .any(|aud| aud.as_str() == Some(audience.as_str())),
                _ => false,
            };
            if !matches {
                return Err(mismatch("aud", audience, claims.get("aud")));
            }
        }
        Ok(())
    }
}

fn expect_string(value: Option<&Value>, claim: &str, expected: &str) -> Result<(), TokenError> {
    let matches = match value {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(mismatch(claim, expected, value))
    }
}

fn mismatch(claim: &str, expected: &str, actual: Option<&Value>) -> TokenError {
    TokenError::ClaimValidationFailed {
        claim: claim.to_string(),
        expected: expected.to_string(),
        actual: actual
            .map(|v| v.to_string())
            .unwrap_or_else(|| "nothing".to_string()),
    }
}
