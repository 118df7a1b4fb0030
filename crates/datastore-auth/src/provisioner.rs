//! Datastore provisioner allowlist
//!
//! A valid accreditation token proves who the caller is, not that they may
//! create datastores. Provisioning is limited to an explicit list of user ids.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{ConfigError, read_access_control_file};
use crate::error::{AuthError, AuthResult};

/// Allowlist of user ids permitted to provision datastores
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionerGate {
    allowed_users: HashSet<String>,
}

impl ProvisionerGate {
    /// Gate admitting exactly the given user ids
    pub fn new<I, S>(allowed_users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_users: allowed_users.into_iter().map(Into::into).collect(),
        }
    }

    /// Load the gate from an access-control file (`{"allowed_users": [...]}`)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let gate = Self::new(read_access_control_file(path)?);
        info!(
            path = %path.display(),
            allowed_users = gate.len(),
            "Loaded provisioner allowlist"
        );
        Ok(gate)
    }

    /// Check that `user_id` may provision datastores
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] if the user is not on the allowlist.
    pub fn check(&self, user_id: &str) -> AuthResult<()> {
        if self.allowed_users.contains(user_id) {
            Ok(())
        } else {
            debug!(user_id = %user_id, "User not on provisioner allowlist");
            Err(AuthError::Forbidden(format!(
                "User {user_id} is not allowed to provision datastores"
            )))
        }
    }

    /// Whether `user_id` is on the allowlist
    pub fn contains(&self, user_id: &str) -> bool {
        self.allowed_users.contains(user_id)
    }

    /// Number of allowed users
    pub fn len(&self) -> usize {
        self.allowed_users.len()
    }

    /// Whether nobody is allowed
    pub fn is_empty(&self) -> bool {
        self.allowed_users.is_empty()
    }
}
