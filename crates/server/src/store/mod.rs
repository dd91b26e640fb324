//! Collaborator interfaces consumed by the grant engine, plus their
//! database-backed implementations.
//!
//! Implementations must provide atomic per-row reads and writes; the engine
//! touches each store at most once per validate or issue step and holds no
//! locks across calls. Stores that can load a user and its password hash in
//! one read override [`IdentityStore::authenticate`].

pub mod identity;
pub mod tokens;

pub use identity::DbIdentityStore;
pub use tokens::DbTokenStore;

use crate::error::StoreError;
use crate::principal::{Principal, SubjectId};
use crate::token::TokenRecord;
use async_trait::async_trait;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exact-match lookup; case rules are up to the store.
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError>;

    /// Current state of a principal, used when redeeming refresh tokens.
    async fn find_by_id(&self, subject: &SubjectId) -> Result<Option<Principal>, StoreError>;

    async fn check_password(&self, principal: &Principal, password: &str)
    -> Result<bool, StoreError>;

    /// Spend the same effort as [`IdentityStore::check_password`] for a
    /// username that does not exist, so both failures take similar time.
    async fn check_password_for_unknown(&self, _password: &str) {}

    /// Resolve `username` and check `password`. `None` covers both an
    /// unknown username and a wrong password; an unknown username still pays
    /// for one verification.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let Some(principal) = self.find_by_username(username).await? else {
            self.check_password_for_unknown(password).await;
            return Ok(None);
        };
        Ok(self
            .check_password(&principal, password)
            .await?
            .then_some(principal))
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(&self, record: &TokenRecord) -> Result<(), StoreError>;

    async fn get(&self, token_id: &str) -> Result<Option<TokenRecord>, StoreError>;

    /// Mark a token revoked, atomically. Returns `true` only for the call that
    /// flipped the flag; unknown or already revoked tokens yield `false`.
    async fn revoke(&self, token_id: &str) -> Result<bool, StoreError>;
}
