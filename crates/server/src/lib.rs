//! OAuth2/OpenID Connect token issuance.
//!
//! Accepts `password` and `refresh_token` grants, validates them against an
//! identity store and mints signed access, refresh and identity tokens whose
//! metadata is persisted for later redemption and revocation.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::clock::Clock;
use crate::config::{AppConfig, ConfigError};
use crate::credentials::CredentialValidator;
use crate::grant::{GrantDispatcher, NoRotation, RevokeOnRotation, RotationHook};
use crate::store::{DbIdentityStore, DbTokenStore, IdentityStore, TokenStore};
use crate::token::{StaticKeyProvider, TokenIssuer, TokenSigner, TokenValidator};

pub mod api;
pub mod claims;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod entity;
pub mod error;
pub mod grant;
pub mod password;
pub mod principal;
pub mod scope;
pub mod store;
pub mod token;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}

/// Wire the database-backed collaborators into a dispatcher.
pub fn assemble_dispatcher(
    resources: &AppResources,
    clock: Arc<dyn Clock>,
) -> Result<GrantDispatcher, ConfigError> {
    let config = &resources.config;
    let scopes = config.scopes.policy()?;

    let identities: Arc<dyn IdentityStore> = Arc::new(DbIdentityStore::new(resources.db.clone()));
    let tokens: Arc<dyn TokenStore> = Arc::new(DbTokenStore::new(resources.db.clone()));
    let key = config.signing_key()?;
    tracing::debug!(algorithm = ?key.algorithm(), "Loaded token signing key");
    let signer = TokenSigner::new(
        Arc::new(StaticKeyProvider::new(key)),
        config.issuer.clone(),
    );

    let rotation: Arc<dyn RotationHook> = if config.tokens.rotate_refresh_tokens {
        Arc::new(RevokeOnRotation(tokens.clone()))
    } else {
        Arc::new(NoRotation)
    };

    Ok(GrantDispatcher::new(
        CredentialValidator::new(identities.clone()),
        TokenIssuer::new(
            signer.clone(),
            tokens.clone(),
            clock.clone(),
            (&config.tokens).into(),
        ),
        TokenValidator::new(signer, tokens, identities, clock),
        scopes,
        rotation,
    ))
}
