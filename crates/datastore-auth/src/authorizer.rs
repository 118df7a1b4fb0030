//! The operations datastore routes depend on
//!
//! [`Authorizer`] binds the configured strategy to the audiences, role and
//! provisioner allowlist of this deployment. Route handlers call one method per
//! endpoint and map failures with [`AuthError::status_code`].
//!
//! ```rust,no_run
//! use datastore_auth::{AuthConfig, Authorizer, Credentials};
//!
//! # async fn handle(headers: &http::HeaderMap, rdn: &str) -> datastore_auth::AuthResult<()> {
//! let authorizer = Authorizer::from_config(&AuthConfig::from_env()?)?;
//! let credentials = Credentials::from_headers(headers);
//!
//! let context = authorizer
//!     .authorize_data_administrator(rdn, credentials.token())
//!     .await?;
//! let identity = authorizer
//!     .resolve_identity(&context, credentials.user_info())
//!     .await?;
//! println!("{} {} may administer {rdn}", identity.first_name, identity.last_name);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{debug, error};

use crate::config::{Audiences, AuthConfig, AuthMode};
use crate::error::{AuthError, AuthResult};
use crate::jwt::{AuthContext, DATA_ADMINISTRATOR_ROLE, Identity, TokenPolicy};
use crate::provisioner::ProvisionerGate;
use crate::strategy::{AuthorizationStrategy, TokenRequest, build_strategy};

/// Authorization facade for the datastore API
#[derive(Debug, Clone)]
pub struct Authorizer {
    strategy: Arc<dyn AuthorizationStrategy>,
    audiences: Audiences,
    provisioner_role: String,
    provisioners: Arc<ProvisionerGate>,
    user_policy: TokenPolicy,
    accreditation_policy: TokenPolicy,
}

impl Authorizer {
    /// Assemble a facade from its parts
    pub fn new(
        strategy: Arc<dyn AuthorizationStrategy>,
        audiences: Audiences,
        provisioner_role: impl Into<String>,
        provisioners: ProvisionerGate,
    ) -> Self {
        Self {
            strategy,
            audiences,
            provisioner_role: provisioner_role.into(),
            provisioners: Arc::new(provisioners),
            user_policy: TokenPolicy::user(),
            accreditation_policy: TokenPolicy::accreditation(),
        }
    }

    /// Build the facade from validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the strategy cannot be built.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let strategy = build_strategy(config)?;
        Ok(Self::new(
            strategy,
            config.audiences.clone(),
            config.provisioner_role.clone(),
            ProvisionerGate::new(config.provisioner_allowlist.iter().cloned()),
        ))
    }

    /// Active deployment mode
    pub fn mode(&self) -> AuthMode {
        self.strategy.mode()
    }

    /// Authorize a plain user token against the data audience
    ///
    /// Returns the token subject.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] if no token is given
    /// - [`AuthError::InvalidToken`] if the token fails verification or has no subject
    pub async fn authorize_user(&self, token: Option<&str>) -> AuthResult<String> {
        let request = TokenRequest::new(token, &self.audiences.data, &self.user_policy);
        let context = self.strategy.authorize_jwt(request).await.inspect_err(log_failure)?;
        Ok(context.user_id().to_string())
    }

    /// Authorize a data administrator for one datastore
    ///
    /// The accreditation token must target the jobs audience, carry the data
    /// administrator role and have an audience entry covering `rdn`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] if no token is given
    /// - [`AuthError::InvalidToken`] if the token fails verification
    /// - [`AuthError::Forbidden`] on a wrong role or uncovered datastore
    pub async fn authorize_data_administrator(
        &self,
        rdn: &str,
        token: Option<&str>,
    ) -> AuthResult<AuthContext> {
        let request = TokenRequest::new(token, &self.audiences.jobs, &self.accreditation_policy)
            .with_role(DATA_ADMINISTRATOR_ROLE)
            .with_rdn(rdn);
        self.strategy.authorize_jwt(request).await.inspect_err(log_failure)
    }

    /// Authorize a datastore provisioner
    ///
    /// On top of a valid accreditation token for the provisioning audience and
    /// role, the user must be on the provisioner allowlist. The allowlist is not
    /// consulted when authorization is disabled.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] if no token is given
    /// - [`AuthError::InvalidToken`] if the token fails verification
    /// - [`AuthError::Forbidden`] on a wrong role or a user not on the allowlist
    pub async fn authorize_datastore_provisioner(
        &self,
        token: Option<&str>,
    ) -> AuthResult<AuthContext> {
        let request = TokenRequest::new(
            token,
            &self.audiences.provisioning,
            &self.accreditation_policy,
        )
        .with_role(&self.provisioner_role);
        let context = self.strategy.authorize_jwt(request).await.inspect_err(log_failure)?;

        if self.mode() != AuthMode::Off {
            self.provisioners
                .check(context.user_id())
                .inspect_err(log_failure)?;
        }
        Ok(context)
    }

    /// Resolve the caller's identity from a user-info token
    ///
    /// The user-info token is verified with the key already resolved for the
    /// accreditation token and must belong to the same user.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Unauthenticated`] if no user-info token is given
    /// - [`AuthError::InvalidToken`] if the user-info token fails verification
    /// - [`AuthError::TokenMismatch`] if it belongs to another user
    pub async fn resolve_identity(
        &self,
        context: &AuthContext,
        user_info_token: Option<&str>,
    ) -> AuthResult<Identity> {
        self.strategy
            .resolve_identity(context, user_info_token)
            .await
            .inspect_err(log_failure)
    }

    /// Check a service API key
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthenticated`] if the key is missing or wrong.
    pub fn authorize_api_key(&self, candidate: Option<&str>) -> AuthResult<()> {
        self.strategy
            .authorize_api_key(candidate)
            .inspect_err(log_failure)
    }

    /// Provisioner allowlist in use
    pub fn provisioners(&self) -> &ProvisionerGate {
        &self.provisioners
    }
}

fn log_failure(error: &AuthError) {
    if error.is_operational() {
        error!(error = %error, category = error.category(), "Authorization failed");
    } else {
        debug!(error = %error, category = error.category(), "Authorization denied");
    }
}
