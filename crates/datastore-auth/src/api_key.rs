//! Service API key check
//!
//! Service-to-service calls authenticate with a shared key sent in the
//! `x-api-key` header. Both keys are hashed with BLAKE3 and the digests are
//! compared with `subtle`, so comparison time does not depend on where the
//! candidate first differs from the configured key.
//!
//! ```rust
//! use datastore_auth::api_key::ApiKeyValidator;
//!
//! let validator = ApiKeyValidator::new("service-key");
//! assert!(validator.validate(Some("service-key")).is_ok());
//! assert!(validator.validate(Some("guess")).is_err());
//! assert!(validator.validate(None).is_err());
//! ```

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

#[inline]
fn hash_api_key(key: &str) -> [u8; 32] {
    blake3::hash(key.as_bytes()).into()
}

/// Validates candidate keys against the configured service key
pub struct ApiKeyValidator {
    expected_hash: [u8; 32],
}

impl ApiKeyValidator {
    /// Validator for a plain key
    pub fn new(expected: impl AsRef<str>) -> Self {
        Self {
            expected_hash: hash_api_key(expected.as_ref()),
        }
    }

    /// Validator for a key held as a secret
    pub fn from_secret(expected: &SecretString) -> Self {
        Self::new(expected.expose_secret())
    }

    /// Check a candidate key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] if the key is missing or differs.
    pub fn validate(&self, candidate: Option<&str>) -> AuthResult<()> {
        let Some(candidate) = candidate else {
            debug!("Request carries no API key");
            return Err(AuthError::Unauthenticated("Missing API key".to_string()));
        };

        if hash_api_key(candidate).ct_eq(&self.expected_hash).into() {
            Ok(())
        } else {
            debug!("API key rejected");
            Err(AuthError::Unauthenticated("Invalid API key".to_string()))
        }
    }
}

impl std::fmt::Debug for ApiKeyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyValidator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_KEY: &str = "test_key_1234567890abcdef1234567890abc";

    #[test]
    fn test_matching_key_accepted() {
        let validator = ApiKeyValidator::new(SERVICE_KEY);
        assert!(validator.validate(Some(SERVICE_KEY)).is_ok());
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let validator = ApiKeyValidator::new(SERVICE_KEY);
        for candidate in [
            "test_key_1234567890abcdef1234567890abd",
            "test_key",
            "",
            "TEST_KEY_1234567890ABCDEF1234567890ABC",
        ] {
            assert!(matches!(
                validator.validate(Some(candidate)),
                Err(AuthError::Unauthenticated(_))
            ));
        }
    }

    #[test]
    fn test_missing_key_rejected() {
        let validator = ApiKeyValidator::new(SERVICE_KEY);
        assert!(matches!(
            validator.validate(None),
            Err(AuthError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_from_secret() {
        let validator = ApiKeyValidator::from_secret(&SecretString::new(SERVICE_KEY.to_string()));
        assert!(validator.validate(Some(SERVICE_KEY)).is_ok());
    }

    #[test]
    fn test_debug_hides_key() {
        let validator = ApiKeyValidator::new(SERVICE_KEY);
        assert!(!format!("{validator:?}").contains("test_key"));
    }
}
