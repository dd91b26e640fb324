//! Refresh-token redemption checks.

use crate::clock::Clock;
use crate::error::GrantError;
use crate::principal::{Principal, SubjectId};
use crate::scope::ScopeSet;
use crate::store::{IdentityStore, TokenStore};
use crate::token::{TokenKind, TokenSigner};
use std::sync::Arc;
use time::OffsetDateTime;

/// A refresh token that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedRefresh {
    /// Freshly loaded from the identity store, not taken from the token.
    pub principal: Principal,
    pub scopes: ScopeSet,
    pub token_id: String,
}

pub struct TokenValidator {
    signer: TokenSigner,
    tokens: Arc<dyn TokenStore>,
    identities: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(
        signer: TokenSigner,
        tokens: Arc<dyn TokenStore>,
        identities: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signer,
            tokens,
            identities,
            clock,
        }
    }

    /// Every rejection collapses to the same `invalid_grant`; the reason is only logged.
    #[tracing::instrument(skip_all)]
    pub async fn validate(&self, presented: &str) -> Result<ValidatedRefresh, GrantError> {
        let claims = self.signer.verify(presented).inspect_err(|e| {
            tracing::debug!(error = %e, "Refresh token failed signature check");
        })?;

        if claims.token_use != TokenKind::Refresh {
            return Err(reject("not a refresh token"));
        }
        let subject = SubjectId::new(claims.sub).map_err(|_| reject("missing subject"))?;

        let now = self.clock.now();
        let expires_at =
            OffsetDateTime::from_unix_timestamp(claims.exp).map_err(|_| reject("bad exp"))?;
        if now > expires_at {
            return Err(reject("expired"));
        }

        let record = self
            .tokens
            .get(&claims.jti)
            .await?
            .ok_or_else(|| reject("unknown token id"))?;
        if record.kind != TokenKind::Refresh || record.subject != subject.as_str() {
            return Err(reject("record does not match token"));
        }
        if !record.is_usable_at(now) {
            return Err(reject("revoked or expired record"));
        }

        let principal = self
            .identities
            .find_by_id(&subject)
            .await?
            .ok_or_else(|| reject("subject no longer exists"))?;

        Ok(ValidatedRefresh {
            principal,
            scopes: ScopeSet::parse_lossy(&claims.scope),
            token_id: record.id,
        })
    }
}

fn reject(reason: &'static str) -> GrantError {
    tracing::debug!(reason, "Refresh token rejected");
    GrantError::invalid_refresh_token()
}
