//! Token minting.

use crate::claims::{Claim, Destination, claim_types, project};
use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::error::GrantError;
use crate::principal::Principal;
use crate::scope::ScopeSet;
use crate::store::TokenStore;
use crate::token::{Token, TokenClaims, TokenKind, TokenRecord, TokenSigner};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::Duration;

/// Configured lifetimes. Identity tokens share the access-token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn for_kind(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access | TokenKind::Identity => self.access,
            TokenKind::Refresh => self.refresh,
        }
    }
}

impl From<&TokenConfig> for TokenLifetimes {
    fn from(config: &TokenConfig) -> Self {
        Self {
            access: Duration::seconds(config.access_token_lifetime),
            refresh: Duration::seconds(config.refresh_token_lifetime),
        }
    }
}

pub struct TokenIssuer {
    signer: TokenSigner,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    pub fn new(
        signer: TokenSigner,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            signer,
            store,
            clock,
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Sign a token of `kind` for `principal` and record its metadata.
    ///
    /// Access tokens embed the claims routed to the access token, identity
    /// tokens those routed to the identity token. Refresh tokens embed no
    /// identity claims; they are re-read from the identity store on redemption.
    #[tracing::instrument(skip_all, fields(subject = %principal.subject(), kind = %kind))]
    pub async fn issue(
        &self,
        principal: &Principal,
        claims: &[Claim],
        scopes: &ScopeSet,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<Token, GrantError> {
        // Whole seconds, so the record agrees with the `iat`/`exp` in the payload.
        let now = self.clock.now();
        let issued_at = now - Duration::nanoseconds(i64::from(now.nanosecond()));
        let expires_at = issued_at
            .checked_add(ttl)
            .ok_or(GrantError::LifetimeOutOfRange(ttl))
            .inspect_err(|e| tracing::error!(error = %e, "Cannot compute token expiry"))?;
        let id = uuid::Uuid::new_v4().to_string();

        let identity = match kind {
            TokenKind::Access => embedded(claims, Destination::AccessToken),
            TokenKind::Identity => embedded(claims, Destination::IdentityToken),
            TokenKind::Refresh => BTreeMap::new(),
        };

        let payload = TokenClaims {
            iss: self.signer.issuer().to_string(),
            sub: principal.subject().to_string(),
            jti: id.clone(),
            token_use: kind,
            scope: scopes.to_string(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            identity,
        };

        let value = self.signer.sign(&payload).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to sign token");
        })?;

        let record = TokenRecord {
            id: id.clone(),
            subject: principal.subject().to_string(),
            kind,
            issued_at,
            expires_at,
            revoked: false,
        };
        self.store.put(&record).await.inspect_err(|e| {
            tracing::error!(error = %e, token_id = %id, "Failed to store token metadata");
        })?;

        tracing::debug!(token_id = %id, expires_at = %expires_at, "Issued token");

        Ok(Token {
            id,
            kind,
            subject: principal.subject().clone(),
            issued_at,
            expires_at,
            scopes: scopes.clone(),
            value,
        })
    }
}

fn embedded(claims: &[Claim], destination: Destination) -> BTreeMap<String, String> {
    let mut routed = project(claims, destination);
    routed.remove(claim_types::SUBJECT);
    routed
}
