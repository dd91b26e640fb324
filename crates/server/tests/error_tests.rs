use axum::http::StatusCode;
use axum::response::IntoResponse;
use token_server::error::{
    CredentialError, ErrorKind, GrantError, SigningError, StoreError, VerifyError,
};

#[test]
fn test_error_kind_codes_and_status() {
    let cases = [
        (ErrorKind::InvalidRequest, "invalid_request", StatusCode::BAD_REQUEST),
        (ErrorKind::InvalidGrant, "invalid_grant", StatusCode::BAD_REQUEST),
        (
            ErrorKind::UnsupportedGrantType,
            "unsupported_grant_type",
            StatusCode::BAD_REQUEST,
        ),
        (
            ErrorKind::ServerError,
            "server_error",
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (kind, code, status) in cases {
        assert_eq!(kind.as_str(), code);
        assert_eq!(kind.to_string(), code);
        assert_eq!(kind.status(), status);
    }
}

#[test]
fn test_credential_errors_collapse_to_invalid_grant() {
    let err: GrantError = CredentialError::InvalidCredentials.into();
    assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    assert_eq!(
        err.description().as_deref(),
        Some("The username or password is incorrect.")
    );
}

#[test]
fn test_store_failures_are_internal() {
    let err: GrantError =
        CredentialError::Store(StoreError::PasswordHash("worker panicked".into())).into();
    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert!(err.description().is_none());
    assert!(!err.needs_alert());
}

#[test]
fn test_signing_errors_need_alerting() {
    let err: GrantError = SigningError::KeyUnavailable.into();
    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert!(err.needs_alert());
    assert!(err.description().is_none());

    let err: GrantError = VerifyError::Signing(SigningError::KeyUnavailable).into();
    assert!(err.needs_alert());
}

#[test]
fn test_rejected_token_is_invalid_grant() {
    let jwt_err = jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
    let err: GrantError = VerifyError::Rejected(jwt_err).into();
    assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    assert_eq!(
        err.description().as_deref(),
        Some("The refresh token is no longer valid.")
    );
}

#[test]
fn test_unsupported_grant_type_description_is_generic() {
    let err = GrantError::UnsupportedGrantType("urn:custom".into());
    assert_eq!(
        err.description().as_deref(),
        Some("The specified grant type is not supported.")
    );
}

#[tokio::test]
async fn test_error_response_body_and_headers() {
    let response = GrantError::InvalidRequest("The grant_type parameter is missing.".into())
        .into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(response.headers()["pragma"], "no-cache");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(
        body["error_description"],
        "The grant_type parameter is missing."
    );
}

#[tokio::test]
async fn test_server_error_response_has_no_description() {
    let response = GrantError::Signing(SigningError::KeyUnavailable).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["error"], "server_error");
    assert!(body.get("error_description").is_none());
}
