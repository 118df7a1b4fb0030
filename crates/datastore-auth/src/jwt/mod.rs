//! Token infrastructure for the datastore API
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────┐
//! │  SigningKeyResolver  │────▶│   TokenDecoder   │
//! │  (JWKS fetch/cache)  │     │ (policy + verify)│
//! └──────────────────────┘     └────────┬─────────┘
//!                                       │ Claims
//!                              ┌────────▼─────────┐
//!                              │  ClaimValidators │
//!                              └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - `policy` - declarative decode policies (required claims, audience on/off)
//! - `jwks` - signing-key resolution with a per-kid TTL cache
//! - `decoder` - signature, expiry, audience and required-claim verification

pub mod decoder;
pub mod jwks;
pub mod policy;

pub use decoder::TokenDecoder;
pub use jwks::{SigningKey, SigningKeyResolver};
pub use policy::TokenPolicy;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Standard subject claim
pub const SUBJECT_CLAIM: &str = "sub";
/// Audience claim (single string or list)
pub const AUDIENCE_CLAIM: &str = "aud";
/// Expiration claim
pub const EXPIRATION_CLAIM: &str = "exp";
/// User id claim carried by accreditation and user-info tokens
pub const USER_ID_CLAIM: &str = "user/uuid";
/// First name claim carried by user-info tokens
pub const FIRST_NAME_CLAIM: &str = "user/firstName";
/// Last name claim carried by user-info tokens
pub const LAST_NAME_CLAIM: &str = "user/lastName";
/// Role claim carried by accreditation tokens
pub const ROLE_CLAIM: &str = "accreditation/role";
/// Role required for data administration
pub const DATA_ADMINISTRATOR_ROLE: &str = "role/dataadministrator";

/// Claim set of a decoded token
///
/// Only [`TokenDecoder`] produces these; the rest of the crate reads them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub(crate) fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Raw claim value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Claim value if it is a string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// A claim counts as present when it exists and is not `null`
    pub fn contains(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|value| !value.is_null())
    }

    /// Audience normalized to a list
    ///
    /// A single string becomes a one-element list; non-string entries are dropped.
    pub fn audiences(&self) -> Vec<&str> {
        match self.0.get(AUDIENCE_CLAIM) {
            Some(Value::String(aud)) => vec![aud.as_str()],
            Some(Value::Array(entries)) => entries.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Expiration as a Unix timestamp, if present and numeric
    pub fn expires_at(&self) -> Option<u64> {
        self.0.get(EXPIRATION_CLAIM).and_then(|exp| {
            exp.as_u64()
                .or_else(|| exp.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
        })
    }
}

/// Externally visible authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User id (`user/uuid`)
    pub user_id: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
}

impl Identity {
    /// Fixed, clearly fake identity returned when authorization is disabled
    pub fn development() -> Self {
        Self {
            user_id: "1234-1234-1234-1234".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        }
    }
}

/// Result of a successful primary-token authorization
///
/// Lives for one request. Carries the already-resolved signing key so a related
/// user-info token can be verified without a second key lookup.
#[derive(Debug, Clone)]
pub struct AuthContext {
    user_id: String,
    claims: Claims,
    signing_key: Option<Arc<SigningKey>>,
}

impl AuthContext {
    pub(crate) fn new(
        user_id: String,
        claims: Claims,
        signing_key: Option<Arc<SigningKey>>,
    ) -> Self {
        Self {
            user_id,
            claims,
            signing_key,
        }
    }

    /// Context for the development identity (no claims, no key)
    pub fn development() -> Self {
        Self::new(Identity::development().user_id, Claims::default(), None)
    }

    /// Authenticated user id
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Claims of the primary token
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Signing key the primary token was verified with
    pub fn signing_key(&self) -> Option<&Arc<SigningKey>> {
        self.signing_key.as_ref()
    }
}
