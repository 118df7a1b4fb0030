//! Authorization with every check except the signature

mod common;

use common::*;
use datastore_auth::{AuthError, AuthMode};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_unpublished_key_is_accepted() {
    let authorizer = skip_signature_authorizer();
    assert_eq!(authorizer.mode(), AuthMode::SkipSignature);

    let token = sign_rogue(&user_claims(USER_ID, DATA_AUDIENCE));
    let user_id = authorizer.authorize_user(Some(&token)).await.unwrap();

    assert_eq!(user_id, USER_ID);
}

#[tokio::test]
async fn test_expired_token_still_rejected() {
    let authorizer = skip_signature_authorizer();

    let token = sign_rogue(&json!({ "sub": USER_ID, "aud": DATA_AUDIENCE, "exp": now() - 60 }));
    let result = authorizer.authorize_user(Some(&token)).await;

    assert_eq!(result.unwrap_err(), AuthError::InvalidToken);
}

#[tokio::test]
async fn test_wrong_audience_still_rejected() {
    let authorizer = skip_signature_authorizer();

    let token = sign_rogue(&user_claims(USER_ID, PROVISIONING_AUDIENCE));
    let result = authorizer.authorize_user(Some(&token)).await;

    assert_eq!(result.unwrap_err(), AuthError::InvalidToken);
}

#[tokio::test]
async fn test_missing_required_claim_still_rejected() {
    let authorizer = skip_signature_authorizer();

    // Accreditation token without a role claim
    let token = sign_rogue(&json!({
        "sub": USER_ID,
        "user/uuid": USER_ID,
        "aud": [JOBS_AUDIENCE, "no.ssb"],
        "exp": now() + 600,
    }));
    let result = authorizer
        .authorize_data_administrator("no.ssb.test", Some(&token))
        .await;

    assert_eq!(result.unwrap_err(), AuthError::InvalidToken);
}

#[tokio::test]
async fn test_role_and_coverage_still_enforced() {
    let authorizer = skip_signature_authorizer();

    let reader = sign_rogue(&accreditation_claims(
        USER_ID,
        json!([JOBS_AUDIENCE, "no.ssb"]),
        "role/reader",
    ));
    let result = authorizer
        .authorize_data_administrator("no.ssb.test", Some(&reader))
        .await;
    assert!(matches!(result, Err(AuthError::Forbidden(_))));

    let admin = sign_rogue(&accreditation_claims(
        USER_ID,
        json!([JOBS_AUDIENCE, "no.ssb"]),
        DATA_ADMINISTRATOR,
    ));
    let context = authorizer
        .authorize_data_administrator("no.ssb.test", Some(&admin))
        .await
        .unwrap();
    assert_eq!(context.user_id(), USER_ID);
    assert!(context.signing_key().is_none());

    let result = authorizer
        .authorize_data_administrator("no.other.test", Some(&admin))
        .await;
    assert!(matches!(result, Err(AuthError::Forbidden(_))));
}

#[tokio::test]
async fn test_correlation_still_enforced() {
    let authorizer = skip_signature_authorizer();

    let token = sign_rogue(&accreditation_claims(
        USER_ID,
        json!([JOBS_AUDIENCE, "no.ssb"]),
        DATA_ADMINISTRATOR,
    ));
    let context = authorizer
        .authorize_data_administrator("no.ssb.test", Some(&token))
        .await
        .unwrap();

    let identity = authorizer
        .resolve_identity(&context, Some(&sign_rogue(&user_info_claims(USER_ID))))
        .await
        .unwrap();
    assert_eq!(identity.user_id, USER_ID);

    let result = authorizer
        .resolve_identity(&context, Some(&sign_rogue(&user_info_claims(OTHER_USER_ID))))
        .await;
    assert_eq!(result.unwrap_err(), AuthError::TokenMismatch);
}

#[tokio::test]
async fn test_allowlist_still_enforced() {
    let authorizer = skip_signature_authorizer();

    let token = sign_rogue(&accreditation_claims(
        OTHER_USER_ID,
        json!(PROVISIONING_AUDIENCE),
        DATA_ADMINISTRATOR,
    ));
    let result = authorizer.authorize_datastore_provisioner(Some(&token)).await;

    assert!(matches!(result, Err(AuthError::Forbidden(_))));
}

#[tokio::test]
async fn test_api_key_still_checked() {
    let authorizer = skip_signature_authorizer();

    assert!(authorizer.authorize_api_key(Some(API_SERVICE_KEY)).is_ok());
    assert!(authorizer.authorize_api_key(Some("guess")).is_err());
}

#[tokio::test]
async fn test_credentials_from_request_headers() {
    use datastore_auth::Credentials;
    use http::{HeaderMap, HeaderValue};

    let authorizer = skip_signature_authorizer();
    let token = sign_rogue(&accreditation_claims(
        USER_ID,
        json!([JOBS_AUDIENCE, "no.ssb"]),
        DATA_ADMINISTRATOR,
    ));
    let user_info = sign_rogue(&user_info_claims(USER_ID));

    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::COOKIE,
        HeaderValue::from_str(&format!("authorization=Bearer {token}; user-info={user_info}"))
            .unwrap(),
    );
    headers.insert("x-api-key", HeaderValue::from_static(API_SERVICE_KEY));
    let credentials = Credentials::from_headers(&headers);

    let context = authorizer
        .authorize_data_administrator("no.ssb.fdb", credentials.token())
        .await
        .unwrap();
    let identity = authorizer
        .resolve_identity(&context, credentials.user_info())
        .await
        .unwrap();

    assert_eq!(identity.first_name, "Ada");
    assert!(authorizer.authorize_api_key(credentials.api_key()).is_ok());
}
