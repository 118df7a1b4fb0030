//! Credential extraction from request headers
//!
//! Browser clients send tokens as cookies, API clients as an `Authorization`
//! header. Both may carry the `Bearer ` prefix; it is stripped here so the rest
//! of the crate only sees raw tokens.

use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE};

/// Cookie holding the primary token
pub const AUTHORIZATION_COOKIE: &str = "authorization";
/// Cookie holding the user-info token
pub const USER_INFO_COOKIE: &str = "user-info";
/// Header holding the service API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Credentials presented with one request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Primary (user or accreditation) token
    pub token: Option<String>,
    /// User-info token
    pub user_info: Option<String>,
    /// Service API key
    pub api_key: Option<String>,
}

impl Credentials {
    /// Collect credentials from request headers
    ///
    /// The `Authorization` header wins over the `authorization` cookie. Headers
    /// that are not valid UTF-8 are treated as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(strip_bearer)
            .or_else(|| cookie(headers, AUTHORIZATION_COOKIE).and_then(|v| strip_bearer(&v)));

        let user_info = cookie(headers, USER_INFO_COOKIE).filter(|value| !value.is_empty());

        let api_key = headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Self {
            token,
            user_info,
            api_key,
        }
    }

    /// Primary token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// User-info token
    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    /// Service API key
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

// Tokens and keys stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_info", &self.user_info.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Strip an optional `Bearer ` prefix (scheme is case-insensitive)
fn strip_bearer(value: &str) -> Option<String> {
    let value = value.trim();
    let token = match (value.get(..6), value.get(6..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case("bearer")
                && (rest.is_empty() || rest.starts_with(' ')) =>
        {
            rest.trim()
        }
        _ => value,
    };
    (!token.is_empty()).then(|| token.to_string())
}

/// Value of the first cookie named `name` across all `Cookie` headers
fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}
