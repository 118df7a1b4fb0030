//! Authorization error taxonomy
//!
//! Every operation in this crate fails with one [`AuthError`]. The variants fall
//! into four observable kinds (see [`ErrorKind`]):
//!
//! - **Unauthenticated** - no credential was supplied, or an API key did not match
//! - **InvalidToken** - the token failed decoding (signature, expiry, audience,
//!   required claims). The individual cause is logged server-side and never
//!   carried by the error, so a caller cannot tell one failed check from another.
//! - **Forbidden** - the credential was valid but does not grant the operation
//! - **Operational** - key resolution, configuration or internal failures
//!
//! The HTTP route layer maps the kinds to status codes with
//! [`AuthError::status_code`] and should only ever show [`AuthError::public_message`]
//! to the caller.

use http::StatusCode;
use thiserror::Error;

/// Result type for authorization operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authorization failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was supplied, or the supplied API key is wrong
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The token did not pass verification
    #[error("Unauthorized: Invalid token")]
    InvalidToken,

    /// The credential is valid but lacks the role, resource coverage or allowlist entry
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The user-info token belongs to a different user than the accreditation token
    #[error("Forbidden: Token mismatch")]
    TokenMismatch,

    /// The signing key could not be resolved from the key-set endpoint
    #[error("Signing key resolution failed: {0}")]
    KeyResolution(String),

    /// The engine was wired or configured incorrectly
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected failure unrelated to the caller's credential
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Observable failure class of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No credential
    Unauthenticated,
    /// Credential failed verification
    InvalidToken,
    /// Credential valid but insufficient
    Forbidden,
    /// Server-side failure
    Operational,
}

impl AuthError {
    /// Failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            AuthError::InvalidToken => ErrorKind::InvalidToken,
            AuthError::Forbidden(_) | AuthError::TokenMismatch => ErrorKind::Forbidden,
            AuthError::KeyResolution(_)
            | AuthError::Configuration(_)
            | AuthError::Internal(_) => ErrorKind::Operational,
        }
    }

    /// HTTP status for the route layer
    ///
    /// Forbidden-class failures are surfaced as 401 in this system, same as
    /// authentication failures.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthenticated | ErrorKind::InvalidToken | ErrorKind::Forbidden => {
                StatusCode::UNAUTHORIZED
            }
            ErrorKind::Operational => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message that is safe to return to the caller
    ///
    /// Operational details stay in the server logs.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Unauthenticated => "Unauthorized. No valid credentials were provided",
            ErrorKind::InvalidToken => "Unauthorized: Invalid token",
            ErrorKind::Forbidden => "Unauthorized: Insufficient permissions",
            ErrorKind::Operational => "Internal Server Error",
        }
    }

    /// Whether this failure should page someone rather than be blamed on the caller
    pub fn is_operational(&self) -> bool {
        self.kind() == ErrorKind::Operational
    }

    /// Error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated(_) => "unauthenticated",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::TokenMismatch => "token_mismatch",
            AuthError::KeyResolution(_) => "key_resolution",
            AuthError::Configuration(_) => "configuration",
            AuthError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::Unauthenticated("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenMismatch.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::KeyResolution("endpoint down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::Configuration("missing key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_mismatch_is_forbidden() {
        assert_eq!(AuthError::TokenMismatch.kind(), ErrorKind::Forbidden);
        assert_eq!(AuthError::TokenMismatch.category(), "token_mismatch");
    }

    #[test]
    fn test_public_message_hides_operational_detail() {
        let error = AuthError::Internal("database password is hunter2".into());
        assert!(error.is_operational());
        assert!(!error.public_message().contains("hunter2"));
    }
}
