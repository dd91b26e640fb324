//! Database-backed token metadata store.

use crate::entity::issued_token;
use crate::error::StoreError;
use crate::store::TokenStore;
use crate::token::{TokenKind, TokenRecord};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct DbTokenStore {
    db: Arc<DatabaseConnection>,
}

impl DbTokenStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Delete records that expired before `cutoff`. Returns the number removed.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let result = issued_token::Entity::delete_many()
            .filter(issued_token::Column::ExpiresAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected > 0 {
            tracing::info!(count = result.rows_affected, "Purged expired token records");
        }
        Ok(result.rows_affected)
    }
}

fn to_record(model: issued_token::Model) -> Result<TokenRecord, StoreError> {
    let kind = model.kind.parse::<TokenKind>().map_err(|reason| StoreError::Corrupt {
        id: model.id.clone(),
        reason,
    })?;
    Ok(TokenRecord {
        revoked: model.is_revoked(),
        id: model.id,
        subject: model.subject,
        kind,
        issued_at: model.issued_at,
        expires_at: model.expires_at,
    })
}

#[async_trait]
impl TokenStore for DbTokenStore {
    async fn put(&self, record: &TokenRecord) -> Result<(), StoreError> {
        issued_token::ActiveModel {
            id: Set(record.id.clone()),
            subject: Set(record.subject.clone()),
            kind: Set(record.kind.as_str().to_string()),
            issued_at: Set(record.issued_at),
            expires_at: Set(record.expires_at),
            revoked_at: Set(record.revoked.then(OffsetDateTime::now_utc)),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(())
    }

    async fn get(&self, token_id: &str) -> Result<Option<TokenRecord>, StoreError> {
        issued_token::Entity::find_by_id(token_id)
            .one(self.db.as_ref())
            .await?
            .map(to_record)
            .transpose()
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, StoreError> {
        let result = issued_token::Entity::update_many()
            .col_expr(
                issued_token::Column::RevokedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(issued_token::Column::Id.eq(token_id))
            .filter(issued_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }
}
