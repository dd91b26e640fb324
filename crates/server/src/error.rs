use axum::http::StatusCode;
use thiserror::Error;

/// Description returned for every failed password grant, whatever the cause.
pub const INVALID_CREDENTIALS_DESCRIPTION: &str = "The username or password is incorrect.";
/// Description returned for every rejected refresh token, whatever the cause.
pub const INVALID_REFRESH_TOKEN_DESCRIPTION: &str = "The refresh token is no longer valid.";
pub const UNSUPPORTED_GRANT_TYPE_DESCRIPTION: &str = "The specified grant type is not supported.";

/// Failures reported by the identity and token-metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("No signing key is available")]
    KeyUnavailable,
    #[error("Failed to sign token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Outcome of checking a presented token's signature.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("Token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Protocol-level failure of a grant request.
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("Token lifetime of {0} puts the expiry out of range")]
    LifetimeOutOfRange(time::Duration),
}

/// Wire-level error code of a [`GrantError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    InvalidGrant,
    UnsupportedGrantType,
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::UnsupportedGrantType => "unsupported_grant_type",
            ErrorKind::ServerError => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GrantError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GrantError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GrantError::InvalidGrant(_) => ErrorKind::InvalidGrant,
            GrantError::UnsupportedGrantType(_) => ErrorKind::UnsupportedGrantType,
            GrantError::Signing(_)
            | GrantError::Storage(_)
            | GrantError::LifetimeOutOfRange(_) => ErrorKind::ServerError,
        }
    }

    /// Text safe to show to the client. Internal failures carry none.
    pub fn description(&self) -> Option<String> {
        match self {
            GrantError::InvalidRequest(msg) | GrantError::InvalidGrant(msg) => Some(msg.clone()),
            GrantError::UnsupportedGrantType(_) => {
                Some(UNSUPPORTED_GRANT_TYPE_DESCRIPTION.to_string())
            }
            GrantError::Signing(_)
            | GrantError::Storage(_)
            | GrantError::LifetimeOutOfRange(_) => None,
        }
    }

    /// Signing and lifetime failures point at a misconfigured deployment rather than a bad client.
    pub fn needs_alert(&self) -> bool {
        matches!(
            self,
            GrantError::Signing(_) | GrantError::LifetimeOutOfRange(_)
        )
    }

    pub(crate) fn invalid_credentials() -> Self {
        GrantError::InvalidGrant(INVALID_CREDENTIALS_DESCRIPTION.to_string())
    }

    pub(crate) fn invalid_refresh_token() -> Self {
        GrantError::InvalidGrant(INVALID_REFRESH_TOKEN_DESCRIPTION.to_string())
    }
}

impl From<CredentialError> for GrantError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::InvalidCredentials => GrantError::invalid_credentials(),
            CredentialError::Store(e) => GrantError::Storage(e),
        }
    }
}

impl From<VerifyError> for GrantError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Signing(e) => GrantError::Signing(e),
            VerifyError::Rejected(_) => GrantError::invalid_refresh_token(),
        }
    }
}
