//! Routes grant requests and rotates refresh tokens.

use crate::claims::{Claim, ClaimsBuilder};
use crate::credentials::CredentialValidator;
use crate::error::{ErrorKind, GrantError, StoreError};
use crate::grant::{GrantPhase, GrantRequest, GrantResult, IssuedTokens};
use crate::principal::Principal;
use crate::scope::{Scope, ScopePolicy, ScopeSet};
use crate::store::TokenStore;
use crate::token::{TokenIssuer, TokenKind, TokenValidator};
use async_trait::async_trait;
use std::sync::Arc;

/// Claims a validated refresh token before its replacement is minted.
#[async_trait]
pub trait RotationHook: Send + Sync {
    /// Returns `false` when another redemption already claimed `token_id`.
    async fn claim(&self, token_id: &str) -> Result<bool, StoreError>;
}

/// Leaves replaced refresh tokens usable until they expire.
pub struct NoRotation;

#[async_trait]
impl RotationHook for NoRotation {
    async fn claim(&self, _token_id: &str) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// Revokes the presented refresh token; only the redemption that flips it wins.
pub struct RevokeOnRotation(pub Arc<dyn TokenStore>);

#[async_trait]
impl RotationHook for RevokeOnRotation {
    async fn claim(&self, token_id: &str) -> Result<bool, StoreError> {
        self.0.revoke(token_id).await
    }
}

/// Routes a grant request to the matching validation path and mints the
/// resulting tokens. Holds no per-request state.
pub struct GrantDispatcher {
    credentials: CredentialValidator,
    claims: ClaimsBuilder,
    issuer: TokenIssuer,
    validator: TokenValidator,
    scopes: ScopePolicy,
    rotation: Arc<dyn RotationHook>,
}

fn enter(phase: GrantPhase) {
    tracing::Span::current().record("phase", phase.as_str());
}

impl GrantDispatcher {
    pub fn new(
        credentials: CredentialValidator,
        issuer: TokenIssuer,
        validator: TokenValidator,
        scopes: ScopePolicy,
        rotation: Arc<dyn RotationHook>,
    ) -> Self {
        Self {
            credentials,
            claims: ClaimsBuilder,
            issuer,
            validator,
            scopes,
            rotation,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[tracing::instrument(
        skip_all,
        fields(grant_type = %request.grant_type(), phase = GrantPhase::Received.as_str())
    )]
    pub async fn dispatch(&self, request: GrantRequest) -> GrantResult {
        let result = match request {
            GrantRequest::Password {
                username,
                password,
                scope,
            } => {
                self.password_grant(&username, &password, scope.as_deref())
                    .await
            }
            GrantRequest::RefreshToken {
                refresh_token,
                scope,
            } => self.refresh_grant(&refresh_token, scope.as_deref()).await,
            GrantRequest::Unsupported { grant_type } => {
                Err(GrantError::UnsupportedGrantType(grant_type))
            }
        };

        match &result {
            Ok(tokens) => {
                enter(GrantPhase::Completed);
                tracing::info!(
                    subject = %tokens.access_token.subject(),
                    scope = %tokens.scopes,
                    "Grant completed"
                );
            }
            Err(e) => {
                enter(GrantPhase::Rejected);
                if e.kind() == ErrorKind::ServerError {
                    tracing::error!(error = %e, alert = e.needs_alert(), "Grant failed");
                } else {
                    tracing::info!(error = %e.kind(), "Grant rejected");
                }
            }
        }
        result
    }

    async fn password_grant(
        &self,
        username: &str,
        password: &str,
        scope: Option<&str>,
    ) -> GrantResult {
        enter(GrantPhase::Validating);
        let principal = self.credentials.validate(username, password).await?;

        enter(GrantPhase::Issuing);
        let scopes = self.scopes.grant(scope);
        let claims = self.claims.build(&principal);
        self.issue_pair(&principal, &claims, scopes).await
    }

    async fn refresh_grant(&self, presented: &str, scope: Option<&str>) -> GrantResult {
        enter(GrantPhase::Validating);
        let validated = self.validator.validate(presented).await?;

        match self.rotation.claim(&validated.token_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(token_id = %validated.token_id, "Refresh token already redeemed");
                return Err(GrantError::invalid_refresh_token());
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    token_id = %validated.token_id,
                    "Failed to revoke rotated refresh token"
                );
            }
        }

        enter(GrantPhase::Issuing);
        let scopes = self.scopes.narrow(scope, &validated.scopes);
        let claims = self.claims.build(&validated.principal);
        self.issue_pair(&validated.principal, &claims, scopes).await
    }

    async fn issue_pair(
        &self,
        principal: &Principal,
        claims: &[Claim],
        scopes: ScopeSet,
    ) -> GrantResult {
        let lifetimes = self.issuer.lifetimes();
        let access_token = self
            .issuer
            .issue(principal, claims, &scopes, TokenKind::Access, lifetimes.access)
            .await?;
        let refresh_token = self
            .issuer
            .issue(principal, claims, &scopes, TokenKind::Refresh, lifetimes.refresh)
            .await?;
        let identity_token = if scopes.contains(Scope::OpenId) {
            Some(
                self.issuer
                    .issue(
                        principal,
                        claims,
                        &scopes,
                        TokenKind::Identity,
                        lifetimes.for_kind(TokenKind::Identity),
                    )
                    .await?,
            )
        } else {
            None
        };

        Ok(IssuedTokens {
            access_token,
            refresh_token,
            identity_token,
            scopes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::TokenConfig;
    use crate::principal::SubjectId;
    use crate::store::IdentityStore;
    use crate::store::memory::{MemoryIdentityStore, MemoryTokenStore};
    use crate::token::{SigningKey, StaticKeyProvider, TokenLifetimes, TokenSigner};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct BrokenRotation {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RotationHook for BrokenRotation {
        async fn claim(&self, _token_id: &str) -> Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Corrupt {
                id: "x".into(),
                reason: "store offline".into(),
            })
        }
    }

    fn dispatcher(rotation: Arc<dyn RotationHook>) -> GrantDispatcher {
        let signer = TokenSigner::new(
            Arc::new(StaticKeyProvider::new(SigningKey::from_secret(
                b"0123456789abcdef0123456789abcdef",
            ))),
            "https://auth.example.test",
        );
        let admin = Principal::new(SubjectId::new("u-1").unwrap(), Some("admin".into()));
        let identities: Arc<dyn IdentityStore> =
            Arc::new(MemoryIdentityStore::default().with_user(admin, "Admin@123"));
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::default());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());

        GrantDispatcher::new(
            CredentialValidator::new(identities.clone()),
            TokenIssuer::new(
                signer.clone(),
                tokens.clone(),
                clock.clone(),
                TokenLifetimes::from(&TokenConfig::default()),
            ),
            TokenValidator::new(signer, tokens, identities, clock),
            ScopePolicy::default(),
            rotation,
        )
    }

    fn password() -> GrantRequest {
        GrantRequest::Password {
            username: "admin".into(),
            password: "Admin@123".into(),
            scope: None,
        }
    }

    #[tokio::test]
    async fn failing_rotation_hook_does_not_fail_the_grant() {
        let hook = Arc::new(BrokenRotation::default());
        let dispatcher = dispatcher(hook.clone());
        let first = dispatcher.dispatch(password()).await.unwrap();

        let second = dispatcher
            .dispatch(GrantRequest::RefreshToken {
                refresh_token: first.refresh_token.value().to_string(),
                scope: None,
            })
            .await
            .unwrap();

        assert_ne!(second.refresh_token.value(), first.refresh_token.value());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    /// Behaves as if a concurrent redemption got there first.
    struct LostRace;

    #[async_trait]
    impl RotationHook for LostRace {
        async fn claim(&self, _token_id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn lost_claim_rejects_the_refresh() {
        let dispatcher = dispatcher(Arc::new(LostRace));
        let first = dispatcher.dispatch(password()).await.unwrap();

        let err = dispatcher
            .dispatch(GrantRequest::RefreshToken {
                refresh_token: first.refresh_token.value().to_string(),
                scope: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert_eq!(err.description(), GrantError::invalid_refresh_token().description());
    }

    #[tokio::test]
    async fn password_grant_never_calls_rotation_hook() {
        let hook = Arc::new(BrokenRotation::default());
        let dispatcher = dispatcher(hook.clone());

        dispatcher.dispatch(password()).await.unwrap();

        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identity_token_follows_openid_scope() {
        let dispatcher = dispatcher(Arc::new(NoRotation));

        let with_openid = dispatcher.dispatch(password()).await.unwrap();
        let identity = with_openid.identity_token.as_ref().unwrap();
        assert_eq!(identity.kind(), TokenKind::Identity);
        assert_eq!(identity.expires_at(), with_openid.expires_at());

        let without = dispatcher
            .dispatch(GrantRequest::Password {
                username: "admin".into(),
                password: "Admin@123".into(),
                scope: Some("profile".into()),
            })
            .await
            .unwrap();
        assert!(without.identity_token.is_none());
    }

    #[test]
    fn phases_render_lowercase() {
        assert_eq!(GrantPhase::Validating.to_string(), "validating");
        assert_eq!(GrantPhase::Rejected.as_str(), "rejected");
    }
}
