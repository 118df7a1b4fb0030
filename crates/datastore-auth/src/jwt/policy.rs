//! Declarative decode policies
//!
//! A [`TokenPolicy`] says which claim identifies the user, which claims must be
//! present and whether the audience is checked. Policies are immutable and
//! built per call-site; the three used by the datastore API are provided as
//! constructors.

use std::collections::BTreeSet;

use super::{
    AUDIENCE_CLAIM, FIRST_NAME_CLAIM, LAST_NAME_CLAIM, ROLE_CLAIM, SUBJECT_CLAIM, USER_ID_CLAIM,
};

/// Decode policy for one kind of token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    subject_claim: String,
    required_claims: Option<BTreeSet<String>>,
    verify_audience: bool,
}

impl TokenPolicy {
    /// Create a policy
    ///
    /// When `required_claims` is given, the subject claim is always part of it.
    pub fn new<I, S>(
        subject_claim: &str,
        required_claims: Option<I>,
        verify_audience: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required_claims = required_claims.map(|claims| {
            let mut set: BTreeSet<String> = claims.into_iter().map(Into::into).collect();
            set.insert(subject_claim.to_string());
            set
        });

        Self {
            subject_claim: subject_claim.to_string(),
            required_claims,
            verify_audience,
        }
    }

    /// Plain user token keyed on `sub`
    ///
    /// `exp` is checked when present but not required.
    pub fn user() -> Self {
        Self::new(SUBJECT_CLAIM, Some([SUBJECT_CLAIM]), true)
    }

    /// Accreditation token keyed on `user/uuid`, carrying role and audience
    pub fn accreditation() -> Self {
        Self::new(
            USER_ID_CLAIM,
            Some([AUDIENCE_CLAIM, SUBJECT_CLAIM, ROLE_CLAIM]),
            true,
        )
    }

    /// User-info token carrying display names; audience is not checked
    pub fn user_info() -> Self {
        Self::new(
            USER_ID_CLAIM,
            Some([FIRST_NAME_CLAIM, LAST_NAME_CLAIM]),
            false,
        )
    }

    /// Claim naming the user
    pub fn subject_claim(&self) -> &str {
        &self.subject_claim
    }

    /// Claims that must be present, if any
    pub fn required_claims(&self) -> Option<&BTreeSet<String>> {
        self.required_claims.as_ref()
    }

    /// Whether the audience is verified
    pub fn verify_audience(&self) -> bool {
        self.verify_audience
    }
}
