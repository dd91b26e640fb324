//! Metadata of every issued token, keyed by its `jti`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IssuedToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssuedToken::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IssuedToken::Subject).string().not_null())
                    .col(ColumnDef::new(IssuedToken::Kind).string().not_null())
                    .col(
                        ColumnDef::new(IssuedToken::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IssuedToken::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IssuedToken::RevokedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issued_token_subject")
                    .table(IssuedToken::Table)
                    .col(IssuedToken::Subject)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_issued_token_expires_at")
                    .table(IssuedToken::Table)
                    .col(IssuedToken::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(IssuedToken::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum IssuedToken {
    Table,
    Id,
    Subject,
    Kind,
    IssuedAt,
    ExpiresAt,
    RevokedAt,
}
