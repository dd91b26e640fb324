//! Token endpoint (`POST /connect/token`).

use crate::api::AppState;
use crate::error::GrantError;
use crate::grant::{GrantRequest, IssuedTokens, TokenRequestForm};
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tag for OpenAPI documentation.
pub const TOKEN_TAG: &str = "Token";

const NO_STORE_HEADERS: [(header::HeaderName, &str); 2] = [
    (header::CACHE_CONTROL, "no-store"),
    (header::PRAGMA, "no-cache"),
];

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: String,
    /// Granted scopes, space-separated
    pub scope: String,
    /// Present when the `openid` scope was granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            expires_in: tokens.expires_in(),
            scope: tokens.scopes.to_string(),
            access_token: tokens.access_token.value().to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: tokens.refresh_token.value().to_string(),
            id_token: tokens.identity_token.map(|t| t.value().to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// `invalid_request`, `invalid_grant`, `unsupported_grant_type` or `server_error`
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for GrantError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let body = ErrorResponse {
            error: kind.as_str().to_string(),
            error_description: self.description(),
        };
        (kind.status(), NO_STORE_HEADERS, Json(body)).into_response()
    }
}

/// OAuth2 token endpoint.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/connect/token",
    tag = TOKEN_TAG,
    operation_id = "Token",
    summary = "Exchange credentials or a refresh token for tokens",
    description = "Issues an access token and a refresh token.\n\n\
                   **Supported grant types:**\n\
                   - `password`: requires `username` and `password`\n\
                   - `refresh_token`: requires `refresh_token`; the presented refresh token is replaced\n\n\
                   `scope` is optional and space-separated. Requested scopes outside the registered \
                   set are dropped. An `id_token` is included when `openid` is granted.",
    request_body(
        content = TokenRequestForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Malformed request, rejected grant or unsupported grant type", body = ErrorResponse),
        (status = 500, description = "Tokens could not be issued", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<AppState>,
    form: Result<Form<TokenRequestForm>, FormRejection>,
) -> Result<Response, GrantError> {
    let Form(form) = form.map_err(|e| {
        tracing::debug!(error = %e, "Unreadable token request body");
        GrantError::InvalidRequest("The request body is not a valid form.".into())
    })?;

    let request = GrantRequest::try_from(form)?;
    let tokens = state.dispatcher.dispatch(request).await?;

    Ok((NO_STORE_HEADERS, Json(TokenResponse::from(tokens))).into_response())
}
