//! Database-backed identity store.

use crate::claims::claim_types;
use crate::entity::app_user;
use crate::error::StoreError;
use crate::password::{hash_password, verify_against_unknown_account, verify_password};
use crate::principal::{Principal, SubjectId};
use crate::store::IdentityStore;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Parameters for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: Option<&'a str>,
    pub roles: &'a [String],
}

#[derive(Clone)]
pub struct DbIdentityStore {
    db: Arc<DatabaseConnection>,
}

impl DbIdentityStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find_model_by_username(
        &self,
        username: &str,
    ) -> Result<Option<app_user::Model>, StoreError> {
        Ok(app_user::Entity::find()
            .filter(app_user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?)
    }

    /// Create an account with an Argon2id password hash.
    #[tracing::instrument(skip(self, user), fields(username = user.username))]
    pub async fn create_user(&self, user: NewUser<'_>) -> Result<Principal, StoreError> {
        let password = user.password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?
            .map_err(|e| StoreError::PasswordHash(e.to_string()))?;

        let model = app_user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            username: Set(user.username.to_string()),
            password_hash: Set(hash),
            email: Set(user.email.map(String::from)),
            roles: Set(user.roles.join(" ")),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::info!(user_id = %model.id, "Created user");
        to_principal(model)
    }

    /// Create the account unless the username is already taken.
    /// Returns whether an account was created.
    pub async fn ensure_user(&self, user: NewUser<'_>) -> Result<bool, StoreError> {
        if self.find_model_by_username(user.username).await?.is_some() {
            return Ok(false);
        }
        self.create_user(user).await?;
        Ok(true)
    }
}

fn to_principal(model: app_user::Model) -> Result<Principal, StoreError> {
    let subject = SubjectId::new(model.id.clone()).map_err(|e| StoreError::Corrupt {
        id: model.id.clone(),
        reason: e.to_string(),
    })?;
    let roles = model.roles_list().join(" ");

    let mut principal = Principal::new(subject, Some(model.username));
    if let Some(email) = model.email {
        principal = principal.with_claim(claim_types::EMAIL, email);
    }
    Ok(principal.with_claim(claim_types::ROLE, roles))
}

async fn verify_hash(password: &str, hash: String) -> Result<bool, StoreError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| StoreError::PasswordHash(e.to_string()))
}

#[async_trait]
impl IdentityStore for DbIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        self.find_model_by_username(username)
            .await?
            .map(to_principal)
            .transpose()
    }

    async fn find_by_id(&self, subject: &SubjectId) -> Result<Option<Principal>, StoreError> {
        app_user::Entity::find_by_id(subject.as_str())
            .one(self.db.as_ref())
            .await?
            .map(to_principal)
            .transpose()
    }

    async fn check_password(
        &self,
        principal: &Principal,
        password: &str,
    ) -> Result<bool, StoreError> {
        let Some(user) = app_user::Entity::find_by_id(principal.subject().as_str())
            .one(self.db.as_ref())
            .await?
        else {
            self.check_password_for_unknown(password).await;
            return Ok(false);
        };

        verify_hash(password, user.password_hash).await
    }

    /// One row read: the hash is checked against the model just loaded.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let Some(user) = self.find_model_by_username(username).await? else {
            self.check_password_for_unknown(password).await;
            return Ok(None);
        };
        if !verify_hash(password, user.password_hash.clone()).await? {
            return Ok(None);
        }
        to_principal(user).map(Some)
    }

    async fn check_password_for_unknown(&self, password: &str) {
        let password = password.to_owned();
        let _ = tokio::task::spawn_blocking(move || verify_against_unknown_account(&password)).await;
    }
}
