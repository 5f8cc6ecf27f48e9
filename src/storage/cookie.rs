//! Cookie token storage.
//!
//! The token record travels as a percent-encoded JSON cookie value. Inbound
//! cookies are read from the request's `Cookie` header; writes are queued as
//! `Set-Cookie` header values for the embedding server to send back.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, COOKIE};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::OAuth2Error;
use crate::storage::{decode_record, encode_record, TokenStorage};
use crate::token::Token;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "oauth2token";

/// Default cookie lifetime (one week).
pub const DEFAULT_COOKIE_MAX_AGE_SECS: i64 = 604_800;

/// Attributes written with the token cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub name: String,
    pub max_age_secs: i64,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            max_age_secs: DEFAULT_COOKIE_MAX_AGE_SECS,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }
}

impl CookieOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn max_age_secs(mut self, secs: i64) -> Self {
        self.max_age_secs = secs;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    fn set_cookie(&self, value: &str, max_age_secs: i64) -> String {
        let expires = if max_age_secs > 0 {
            (Utc::now() + Duration::seconds(max_age_secs))
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string()
        } else {
            "Thu, 01 Jan 1970 00:00:00 GMT".to_string()
        };

        let mut header = format!(
            "{}={}; Max-Age={}; Expires={}; Path={}",
            self.name,
            value,
            max_age_secs.max(0),
            expires,
            self.path
        );
        if let Some(domain) = &self.domain {
            header.push_str(&format!("; Domain={}", domain));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

/// Stores the token in a named cookie.
pub struct CookieTokenStorage {
    options: CookieOptions,
    jar: Mutex<HashMap<String, String>>,
    outgoing: Mutex<Vec<String>>,
}

impl CookieTokenStorage {
    /// Create storage with no inbound cookies.
    pub fn new(options: CookieOptions) -> Self {
        Self::with_cookies(HashMap::new(), options)
    }

    /// Create storage from already parsed inbound cookies.
    pub fn with_cookies(cookies: HashMap<String, String>, options: CookieOptions) -> Self {
        Self {
            options,
            jar: Mutex::new(cookies),
            outgoing: Mutex::new(Vec::new()),
        }
    }

    /// Create storage from a raw `Cookie` request header value.
    pub fn from_cookie_header(header: &str, options: CookieOptions) -> Self {
        Self::with_cookies(parse_cookie_header(header), options)
    }

    /// Create storage from request headers.
    pub fn from_headers(headers: &HeaderMap, options: CookieOptions) -> Self {
        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| parse_cookie_header(v).into_iter())
            .collect();
        Self::with_cookies(cookies, options)
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// `Set-Cookie` values queued so far.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.outgoing.lock().clone()
    }

    /// Drain queued `Set-Cookie` values.
    pub fn take_set_cookie_headers(&self) -> Vec<String> {
        std::mem::take(&mut *self.outgoing.lock())
    }
}

impl std::fmt::Debug for CookieTokenStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieTokenStorage")
            .field("options", &self.options)
            .field("has_cookie", &self.jar.lock().contains_key(&self.options.name))
            .field("queued", &self.outgoing.lock().len())
            .finish()
    }
}

#[async_trait]
impl TokenStorage for CookieTokenStorage {
    async fn get(&self) -> Result<Option<Token>, OAuth2Error> {
        let raw = match self.jar.lock().get(&self.options.name) {
            Some(raw) if !raw.is_empty() => raw.clone(),
            _ => return Ok(None),
        };
        match urlencoding::decode(&raw) {
            Ok(decoded) => decode_record(&decoded, "cookie"),
            Err(e) => {
                warn!(cookie = %self.options.name, error = %e, "Ignoring undecodable token cookie");
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &Token) -> Result<(), OAuth2Error> {
        let value = urlencoding::encode(&encode_record(token)?).into_owned();
        let header = self.options.set_cookie(&value, self.options.max_age_secs);

        self.jar.lock().insert(self.options.name.clone(), value);
        self.outgoing.lock().push(header);
        debug!(cookie = %self.options.name, "Token cookie queued");
        Ok(())
    }

    async fn delete(&self) -> Result<(), OAuth2Error> {
        self.jar.lock().remove(&self.options.name);
        self.outgoing.lock().push(self.options.set_cookie("", 0));
        Ok(())
    }
}

/// Parse a `Cookie` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let name = parts.next()?.trim();
            let value = parts.next()?.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.to_string()))
            }
        })
        .collect()
}
