use async_trait::async_trait;
use tracing::error;

use super::{AuthorizationStrategy, TokenRequest};
use crate::config::AuthMode;
use crate::error::AuthResult;
use crate::jwt::{AuthContext, Identity};

/// Accepts everything and returns the development identity
///
/// Local development only. Every call logs at error level.
#[derive(Debug, Default)]
pub struct Disabled;

impl Disabled {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthorizationStrategy for Disabled {
    fn mode(&self) -> AuthMode {
        AuthMode::Off
    }

    async fn authorize_jwt(&self, request: TokenRequest<'_>) -> AuthResult<AuthContext> {
        error!(
            audience = %request.audience,
            "Authorization is DISABLED: accepting request as development user"
        );
        Ok(AuthContext::development())
    }

    async fn resolve_identity(
        &self,
        _context: &AuthContext,
        _user_info_token: Option<&str>,
    ) -> AuthResult<Identity> {
        error!("Authorization is DISABLED: returning development identity");
        Ok(Identity::development())
    }

    fn authorize_api_key(&self, _candidate: Option<&str>) -> AuthResult<()> {
        error!("Authorization is DISABLED: API key not checked");
        Ok(())
    }
}
