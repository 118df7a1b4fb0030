//! Claim checks run after a token has been decoded
//!
//! Each check is small and independent so the strategies can compose them per
//! operation.

use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{
    Claims, FIRST_NAME_CLAIM, Identity, LAST_NAME_CLAIM, ROLE_CLAIM, SigningKey, TokenDecoder,
    TokenPolicy, USER_ID_CLAIM,
};

/// The role claim must equal `expected_role` exactly
pub fn require_role(claims: &Claims, expected_role: &str) -> AuthResult<()> {
    match claims.get_str(ROLE_CLAIM) {
        Some(role) if role == expected_role => Ok(()),
        role => {
            debug!(expected = %expected_role, actual = ?role, "Token role rejected");
            Err(AuthError::Forbidden(format!(
                "Unauthorized with role: {}",
                role.unwrap_or("<none>")
            )))
        }
    }
}

/// At least one audience entry must be a prefix of `rdn`
///
/// Datastores are named hierarchically (`no.ssb.fdb`), so an audience of
/// `no.ssb` covers every datastore below it. A token without audience covers
/// nothing; empty entries are ignored.
pub fn require_audience_covers_rdn(claims: &Claims, rdn: &str) -> AuthResult<()> {
    let audiences: Vec<&str> = claims
        .audiences()
        .into_iter()
        .filter(|aud| !aud.is_empty())
        .collect();
    if audiences.is_empty() {
        debug!(rdn = %rdn, "Token has no audience to cover datastore");
        return Err(AuthError::Forbidden("Missing audience".to_string()));
    }

    if audiences.iter().any(|aud| rdn.starts_with(aud)) {
        Ok(())
    } else {
        debug!(rdn = %rdn, audiences = ?audiences, "Datastore not covered by token audience");
        Err(AuthError::Forbidden(format!(
            "Not authorized to access datastore: {rdn}"
        )))
    }
}

/// The subject claim must be a non-empty string; returns it
pub fn require_non_empty_subject<'a>(
    claims: &'a Claims,
    subject_claim: &str,
) -> AuthResult<&'a str> {
    match claims.get_str(subject_claim) {
        Some(subject) if !subject.is_empty() => Ok(subject),
        _ => {
            debug!(claim = %subject_claim, "Token has no valid subject");
            Err(AuthError::InvalidToken)
        }
    }
}

/// Decode a user-info token and check it belongs to the same user as `primary`
///
/// The user-info token is decoded with [`TokenPolicy::user_info`] and the key the
/// primary token was verified with.
///
/// # Errors
///
/// - [`AuthError::InvalidToken`] if the user-info token does not decode
/// - [`AuthError::TokenMismatch`] if the user ids differ
pub fn correlate(
    decoder: &TokenDecoder,
    primary: &Claims,
    user_info_token: &str,
    key: Option<&SigningKey>,
    verify_signature: bool,
) -> AuthResult<Identity> {
    let user_info = decoder.decode(
        user_info_token,
        &TokenPolicy::user_info(),
        key,
        None,
        verify_signature,
    )?;

    let user_id = user_info.get_str(USER_ID_CLAIM);
    if user_id.is_none() || primary.get_str(USER_ID_CLAIM) != user_id {
        debug!(
            primary = ?primary.get_str(USER_ID_CLAIM),
            user_info = ?user_id,
            "User-info token does not match accreditation token"
        );
        return Err(AuthError::TokenMismatch);
    }

    Ok(Identity {
        user_id: claim_text(&user_info, USER_ID_CLAIM),
        first_name: claim_text(&user_info, FIRST_NAME_CLAIM),
        last_name: claim_text(&user_info, LAST_NAME_CLAIM),
    })
}

fn claim_text(claims: &Claims, name: &str) -> String {
    match claims.get(name) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
