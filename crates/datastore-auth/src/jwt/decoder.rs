//! Token verification against a [`TokenPolicy`]
//!
//! One call performs every check a token has to pass:
//! - Signature (RS256/RS512), unless signature verification is turned off
//! - Expiration (`exp`, whenever present)
//! - Audience, unless the policy disables it
//! - Presence of every claim the policy requires
//!
//! All of these failures surface as the single [`AuthError::InvalidToken`]. The
//! specific cause is only written to the server log at debug level, so a caller
//! cannot use responses to tell a bad signature from an expired token or a wrong
//! audience.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use jsonwebtoken::{Algorithm, Validation, decode};
use serde_json::{Map, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

use super::{AUDIENCE_CLAIM, Claims, SigningKey, TokenPolicy};
use crate::error::{AuthError, AuthResult};

/// Signature algorithms accepted for verified tokens
pub const ACCEPTED_ALGORITHMS: [Algorithm; 2] = [Algorithm::RS256, Algorithm::RS512];

/// Verifies tokens and returns their claims
#[derive(Debug, Clone, Default)]
pub struct TokenDecoder {
    leeway: Duration,
}

impl TokenDecoder {
    /// Decoder with no clock leeway
    pub fn new() -> Self {
        Self::default()
    }

    /// Set clock skew tolerance for the expiration check
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Clock skew tolerance
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Verify `token` and return its claims
    ///
    /// `audience` is the expected audience; it is ignored when the policy does
    /// not verify audiences. `verify_signature = false` is only used by the
    /// skip-signature strategy.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`] for any signature, expiry, audience or
    ///   required-claim failure
    /// - [`AuthError::Configuration`] if a signature check is requested without a key
    /// - [`AuthError::Internal`] for failures unrelated to the token's validity
    pub fn decode(
        &self,
        token: &str,
        policy: &TokenPolicy,
        key: Option<&SigningKey>,
        audience: Option<&str>,
        verify_signature: bool,
    ) -> AuthResult<Claims> {
        let claims = if verify_signature {
            let key = key.ok_or_else(|| {
                error!("Signature verification requested without a signing key");
                AuthError::Configuration(
                    "Signing key required when signature verification is enabled".to_string(),
                )
            })?;
            self.decode_verified(token, key)?
        } else {
            self.decode_unverified(token)?
        };

        if policy.verify_audience() {
            check_audience(&claims, audience)?;
        }
        check_required_claims(&claims, policy)?;

        Ok(claims)
    }

    fn decode_verified(&self, token: &str, key: &SigningKey) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        validation.leeway = self.leeway.as_secs();
        validation.validate_exp = true;
        // Audience and required claims are checked by this module for both modes
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
            .map(|data| Claims::from_map(data.claims))
            .map_err(|e| {
                debug!(kid = %key.key_id(), "Token verification failed");
                classify(e)
            })
    }

    fn decode_unverified(&self, token: &str) -> AuthResult<Claims> {
        let data = jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token)
            .map_err(classify)?;
        let claims = Claims::from_map(data.claims);
        check_expiry(&claims, self.leeway)?;
        Ok(claims)
    }
}

/// Collapse token-validity failures into `InvalidToken`; anything else is internal
fn classify(e: JwtError) -> AuthError {
    match e.kind() {
        JwtErrorKind::InvalidToken
        | JwtErrorKind::InvalidSignature
        | JwtErrorKind::ExpiredSignature
        | JwtErrorKind::ImmatureSignature
        | JwtErrorKind::InvalidAudience
        | JwtErrorKind::InvalidIssuer
        | JwtErrorKind::InvalidSubject
        | JwtErrorKind::InvalidAlgorithm
        | JwtErrorKind::MissingRequiredClaim(_)
        | JwtErrorKind::Base64(_)
        | JwtErrorKind::Json(_)
        | JwtErrorKind::Utf8(_) => {
            debug!(reason = %e, "Invalid token");
            AuthError::InvalidToken
        }
        _ => {
            error!(error = %e, "Unexpected failure while decoding token");
            AuthError::Internal(format!("Token decoding failed: {e}"))
        }
    }
}

fn check_expiry(claims: &Claims, leeway: Duration) -> AuthResult<()> {
    if !claims.contains(super::EXPIRATION_CLAIM) {
        return Ok(());
    }
    let exp = claims.expires_at().ok_or_else(|| {
        debug!("Token exp claim is not a timestamp");
        AuthError::InvalidToken
    })?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AuthError::Internal(format!("System clock before Unix epoch: {e}")))?
        .as_secs();

    if exp < now.saturating_sub(leeway.as_secs()) {
        debug!(exp, now, "Token expired");
        return Err(AuthError::InvalidToken);
    }
    Ok(())
}

fn check_audience(claims: &Claims, expected: Option<&str>) -> AuthResult<()> {
    let audiences = claims.audiences();
    let accepted = match expected {
        Some(expected) => audiences.contains(&expected),
        // Nothing expected, so a token scoped to an audience is not for us
        None => !claims.contains(AUDIENCE_CLAIM),
    };

    if accepted {
        Ok(())
    } else {
        debug!(expected = ?expected, actual = ?audiences, "Token audience rejected");
        Err(AuthError::InvalidToken)
    }
}

fn check_required_claims(claims: &Claims, policy: &TokenPolicy) -> AuthResult<()> {
    let Some(required) = policy.required_claims() else {
        return Ok(());
    };
    match required.iter().find(|claim| !claims.contains(claim)) {
        Some(missing) => {
            debug!(claim = %missing, "Token missing required claim");
            Err(AuthError::InvalidToken)
        }
        None => Ok(()),
    }
}
