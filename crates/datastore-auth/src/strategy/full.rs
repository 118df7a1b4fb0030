use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{AuthorizationStrategy, TokenRequest, authorize_decoded, require_token};
use crate::api_key::ApiKeyValidator;
use crate::config::AuthMode;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{AuthContext, Identity, SigningKeyResolver, TokenDecoder};
use crate::validators::correlate;

/// Verifies every token signature against the identity provider's JWKS
#[derive(Debug)]
pub struct FullVerification {
    resolver: Arc<SigningKeyResolver>,
    decoder: TokenDecoder,
    api_key: ApiKeyValidator,
}

impl FullVerification {
    /// Create the strategy
    pub fn new(
        resolver: Arc<SigningKeyResolver>,
        decoder: TokenDecoder,
        api_key: ApiKeyValidator,
    ) -> Self {
        Self {
            resolver,
            decoder,
            api_key,
        }
    }

    /// Signing-key resolver shared by all requests
    pub fn resolver(&self) -> &Arc<SigningKeyResolver> {
        &self.resolver
    }
}

#[async_trait]
impl AuthorizationStrategy for FullVerification {
    fn mode(&self) -> AuthMode {
        AuthMode::Full
    }

    async fn authorize_jwt(&self, request: TokenRequest<'_>) -> AuthResult<AuthContext> {
        let token = require_token(request.token)?;
        let key = self.resolver.resolve(token).await?;
        let context = authorize_decoded(&self.decoder, &request, token, Some(key), true)?;
        debug!(user_id = %context.user_id(), audience = %request.audience, "Token authorized");
        Ok(context)
    }

    async fn resolve_identity(
        &self,
        context: &AuthContext,
        user_info_token: Option<&str>,
    ) -> AuthResult<Identity> {
        let user_info_token = user_info_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::Unauthenticated("Missing user-info token".to_string()))?;

        correlate(
            &self.decoder,
            context.claims(),
            user_info_token,
            context.signing_key().map(|key| &**key),
            true,
        )
    }

    fn authorize_api_key(&self, candidate: Option<&str>) -> AuthResult<()> {
        self.api_key.validate(candidate)
    }
}
