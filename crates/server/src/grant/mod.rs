//! Grant requests, results and the dispatcher that turns one into the other.

mod dispatcher;

pub use dispatcher::{GrantDispatcher, NoRotation, RevokeOnRotation, RotationHook};

use crate::error::GrantError;
use crate::scope::ScopeSet;
use crate::token::Token;
use serde::Deserialize;
use std::fmt;
use time::OffsetDateTime;
use utoipa::ToSchema;

pub const PASSWORD_GRANT: &str = "password";
pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";

/// Form body of `POST /connect/token`, before any field checks.
#[derive(Default, Deserialize, ToSchema)]
pub struct TokenRequestForm {
    /// `password` or `refresh_token`
    pub grant_type: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    /// Space-separated list of requested scopes
    pub scope: Option<String>,
}

/// A syntactically complete grant request.
pub enum GrantRequest {
    Password {
        username: String,
        password: String,
        scope: Option<String>,
    },
    RefreshToken {
        refresh_token: String,
        scope: Option<String>,
    },
    Unsupported {
        grant_type: String,
    },
}

impl GrantRequest {
    pub fn grant_type(&self) -> &str {
        match self {
            GrantRequest::Password { .. } => PASSWORD_GRANT,
            GrantRequest::RefreshToken { .. } => REFRESH_TOKEN_GRANT,
            GrantRequest::Unsupported { grant_type } => grant_type,
        }
    }
}

impl fmt::Debug for GrantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantRequest::Password {
                username, scope, ..
            } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("scope", scope)
                .finish(),
            GrantRequest::RefreshToken { scope, .. } => f
                .debug_struct("RefreshToken")
                .field("refresh_token", &"<redacted>")
                .field("scope", scope)
                .finish(),
            GrantRequest::Unsupported { grant_type } => f
                .debug_struct("Unsupported")
                .field("grant_type", grant_type)
                .finish(),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String, GrantError> {
    present(value).ok_or_else(|| GrantError::InvalidRequest(format!("The {field} parameter is missing.")))
}

impl TryFrom<TokenRequestForm> for GrantRequest {
    type Error = GrantError;

    fn try_from(form: TokenRequestForm) -> Result<Self, Self::Error> {
        let grant_type = required(form.grant_type, "grant_type")?;
        let scope = present(form.scope);

        match grant_type.as_str() {
            PASSWORD_GRANT => Ok(GrantRequest::Password {
                username: required(form.username, "username")?,
                // Passwords are taken verbatim; only absence is rejected.
                password: form
                    .password
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        GrantError::InvalidRequest("The password parameter is missing.".into())
                    })?,
                scope,
            }),
            REFRESH_TOKEN_GRANT => Ok(GrantRequest::RefreshToken {
                refresh_token: required(form.refresh_token, "refresh_token")?,
                scope,
            }),
            _ => Ok(GrantRequest::Unsupported { grant_type }),
        }
    }
}

/// Tokens minted by a successful grant.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: Token,
    pub refresh_token: Token,
    /// Present when `openid` was granted.
    pub identity_token: Option<Token>,
    pub scopes: ScopeSet,
}

impl IssuedTokens {
    /// Seconds until the access token expires, measured from its issue time.
    pub fn expires_in(&self) -> i64 {
        self.access_token.lifetime_seconds()
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.access_token.expires_at()
    }
}

pub type GrantResult = Result<IssuedTokens, GrantError>;

/// Where a dispatch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantPhase {
    Received,
    Validating,
    Issuing,
    Completed,
    Rejected,
}

impl GrantPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantPhase::Received => "received",
            GrantPhase::Validating => "validating",
            GrantPhase::Issuing => "issuing",
            GrantPhase::Completed => "completed",
            GrantPhase::Rejected => "rejected",
        }
    }
}

impl fmt::Display for GrantPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn form(pairs: &[(&str, &str)]) -> TokenRequestForm {
        let mut form = TokenRequestForm::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "grant_type" => form.grant_type = value,
                "username" => form.username = value,
                "password" => form.password = value,
                "refresh_token" => form.refresh_token = value,
                "scope" => form.scope = value,
                other => panic!("unexpected field {other}"),
            }
        }
        form
    }

    #[test]
    fn missing_grant_type_is_invalid_request() {
        let err = GrantRequest::try_from(form(&[("username", "admin")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn password_grant_requires_both_fields() {
        let err = GrantRequest::try_from(form(&[
            ("grant_type", "password"),
            ("username", "admin"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.description().unwrap().contains("password"));
    }

    #[test]
    fn refresh_grant_requires_token() {
        let err = GrantRequest::try_from(form(&[("grant_type", "refresh_token")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn blank_scope_counts_as_absent() {
        let request = GrantRequest::try_from(form(&[
            ("grant_type", "password"),
            ("username", "admin"),
            ("password", "Admin@123"),
            ("scope", "   "),
        ]))
        .unwrap();
        assert!(matches!(request, GrantRequest::Password { scope: None, .. }));
    }

    #[test]
    fn other_grant_types_are_kept_for_dispatch() {
        let request =
            GrantRequest::try_from(form(&[("grant_type", "client_credentials")])).unwrap();
        assert_eq!(request.grant_type(), "client_credentials");
        assert!(matches!(request, GrantRequest::Unsupported { .. }));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let request = GrantRequest::Password {
            username: "admin".into(),
            password: "Admin@123".into(),
            scope: None,
        };
        let rendered = format!("{request:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("Admin@123"));
    }
}
