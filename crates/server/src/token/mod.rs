//! Token model shared by the issuer and the validator.

pub mod issuer;
pub mod signing;
pub mod validator;

pub use issuer::{TokenIssuer, TokenLifetimes};
pub use signing::{KeyProvider, SigningKey, StaticKeyProvider, TokenSigner};
pub use validator::{TokenValidator, ValidatedRefresh};

use crate::principal::SubjectId;
use crate::scope::ScopeSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Identity,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Identity => "identity",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            "identity" => Ok(TokenKind::Identity),
            other => Err(format!("Unknown token kind: {other}")),
        }
    }
}

/// A signed token as handed back to the caller. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    id: String,
    kind: TokenKind,
    subject: SubjectId,
    issued_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    scopes: ScopeSet,
    value: String,
}

impl Token {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn issued_at(&self) -> OffsetDateTime {
        self.issued_at
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// The signed, opaque representation sent over the wire.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn lifetime_seconds(&self) -> i64 {
        (self.expires_at - self.issued_at).whole_seconds()
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// Minimal metadata persisted per issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: String,
    pub subject: String,
    pub kind: TokenKind,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub revoked: bool,
}

impl TokenRecord {
    pub fn is_usable_at(&self, now: OffsetDateTime) -> bool {
        !self.revoked && now <= self.expires_at
    }
}

/// Payload of every signed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub token_use: TokenKind,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    /// Identity claims routed to this token, minus `sub`.
    #[serde(flatten)]
    pub identity: BTreeMap<String, String>,
}
