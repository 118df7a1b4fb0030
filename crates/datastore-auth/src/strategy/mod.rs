//! Authorization strategies
//!
//! The deployment mode picks exactly one strategy at start-up:
//!
//! | Mode | Strategy | Signature | Other checks |
//! |---|---|---|---|
//! | `FULL` | [`FullVerification`] | verified via JWKS | all |
//! | `SKIP_SIGNATURE` | [`SkipSignature`] | not checked | all |
//! | `OFF` | [`Disabled`] | none | none |
//!
//! Only [`FullVerification`] may guard real data. The other two log loudly on
//! every call so that an accidental deployment shows up in logs and alerts.

mod disabled;
mod full;
mod skip_signature;

pub use disabled::Disabled;
pub use full::FullVerification;
pub use skip_signature::SkipSignature;

use async_trait::async_trait;
use std::sync::Arc;

use crate::api_key::ApiKeyValidator;
use crate::config::{AuthConfig, AuthMode, ConfigError};
use crate::error::{AuthError, AuthResult};
use crate::jwt::{AuthContext, Identity, SigningKey, SigningKeyResolver, TokenDecoder, TokenPolicy};
use crate::validators::{require_audience_covers_rdn, require_non_empty_subject, require_role};

/// What a token must satisfy for one operation
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    /// Token as presented, without the `Bearer ` prefix
    pub token: Option<&'a str>,
    /// Expected audience
    pub audience: &'a str,
    /// Decode policy
    pub policy: &'a TokenPolicy,
    /// Role the token must carry, if any
    pub required_role: Option<&'a str>,
    /// Datastore the token audience must cover, if any
    pub rdn: Option<&'a str>,
}

impl<'a> TokenRequest<'a> {
    /// Request with no role or datastore requirement
    pub fn new(token: Option<&'a str>, audience: &'a str, policy: &'a TokenPolicy) -> Self {
        Self {
            token,
            audience,
            policy,
            required_role: None,
            rdn: None,
        }
    }

    /// Require a role
    pub fn with_role(mut self, role: &'a str) -> Self {
        self.required_role = Some(role);
        self
    }

    /// Require the token audience to cover a datastore
    pub fn with_rdn(mut self, rdn: &'a str) -> Self {
        self.rdn = Some(rdn);
        self
    }
}

/// Authorization behaviour of one deployment mode
#[async_trait]
pub trait AuthorizationStrategy: Send + Sync + std::fmt::Debug {
    /// Mode this strategy implements
    fn mode(&self) -> AuthMode;

    /// Authorize a primary token
    async fn authorize_jwt(&self, request: TokenRequest<'_>) -> AuthResult<AuthContext>;

    /// Correlate a user-info token with an authorized primary token
    async fn resolve_identity(
        &self,
        context: &AuthContext,
        user_info_token: Option<&str>,
    ) -> AuthResult<Identity>;

    /// Check a service API key
    fn authorize_api_key(&self, candidate: Option<&str>) -> AuthResult<()>;
}

/// Build the strategy for the configured mode
///
/// # Errors
///
/// Returns [`AuthError::Configuration`] if FULL mode has no JWKS URL or the
/// resolver cannot be created.
pub fn build_strategy(config: &AuthConfig) -> AuthResult<Arc<dyn AuthorizationStrategy>> {
    let decoder = TokenDecoder::new().with_leeway(config.leeway);
    let api_key = ApiKeyValidator::from_secret(&config.api_service_key);

    let strategy: Arc<dyn AuthorizationStrategy> = match config.mode {
        AuthMode::Full => {
            let jwks_url = config
                .jwks_url
                .as_deref()
                .ok_or(ConfigError::MissingValue("jwks_url"))?;
            let resolver = SigningKeyResolver::with_settings(
                jwks_url,
                config.jwks_cache_ttl,
                config.jwks_timeout,
            )?;
            Arc::new(FullVerification::new(Arc::new(resolver), decoder, api_key))
        }
        AuthMode::SkipSignature => Arc::new(SkipSignature::new(decoder, api_key)),
        AuthMode::Off => Arc::new(Disabled::new()),
    };

    tracing::info!(mode = %config.mode, "Authorization strategy selected");
    Ok(strategy)
}

fn require_token(token: Option<&str>) -> AuthResult<&str> {
    match token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::Unauthenticated("Missing token".to_string())),
    }
}

/// Checks shared by the verifying strategies once a token has been decoded
fn authorize_decoded(
    decoder: &TokenDecoder,
    request: &TokenRequest<'_>,
    token: &str,
    key: Option<Arc<SigningKey>>,
    verify_signature: bool,
) -> AuthResult<AuthContext> {
    let claims = decoder.decode(
        token,
        request.policy,
        key.as_deref(),
        Some(request.audience),
        verify_signature,
    )?;

    if let Some(role) = request.required_role {
        require_role(&claims, role)?;
    }
    if let Some(rdn) = request.rdn {
        require_audience_covers_rdn(&claims, rdn)?;
    }
    let user_id = require_non_empty_subject(&claims, request.policy.subject_claim())?.to_string();

    Ok(AuthContext::new(user_id, claims, key))
}
