use async_trait::async_trait;
use tracing::warn;

use super::{AuthorizationStrategy, TokenRequest, authorize_decoded, require_token};
use crate::api_key::ApiKeyValidator;
use crate::config::AuthMode;
use crate::error::{AuthError, AuthResult};
use crate::jwt::{AuthContext, Identity, TokenDecoder};
use crate::validators::correlate;

/// Runs every check except the signature
///
/// For development and test environments whose tokens are not signed by the
/// production identity provider. Never deploy this against real data.
#[derive(Debug)]
pub struct SkipSignature {
    decoder: TokenDecoder,
    api_key: ApiKeyValidator,
}

impl SkipSignature {
    /// Create the strategy
    pub fn new(decoder: TokenDecoder, api_key: ApiKeyValidator) -> Self {
        Self { decoder, api_key }
    }
}

#[async_trait]
impl AuthorizationStrategy for SkipSignature {
    fn mode(&self) -> AuthMode {
        AuthMode::SkipSignature
    }

    async fn authorize_jwt(&self, request: TokenRequest<'_>) -> AuthResult<AuthContext> {
        warn!(
            audience = %request.audience,
            "Token signature NOT verified: authorization mode is SKIP_SIGNATURE"
        );
        let token = require_token(request.token)?;
        authorize_decoded(&self.decoder, &request, token, None, false)
    }

    async fn resolve_identity(
        &self,
        context: &AuthContext,
        user_info_token: Option<&str>,
    ) -> AuthResult<Identity> {
        warn!("User-info token signature NOT verified: authorization mode is SKIP_SIGNATURE");
        let user_info_token = user_info_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::Unauthenticated("Missing user-info token".to_string()))?;

        correlate(&self.decoder, context.claims(), user_info_token, None, false)
    }

    fn authorize_api_key(&self, candidate: Option<&str>) -> AuthResult<()> {
        self.api_key.validate(candidate)
    }
}
