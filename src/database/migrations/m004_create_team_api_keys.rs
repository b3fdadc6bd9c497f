use sea_orm_migration::prelude::*;

use super::m001_create_accounts::Users;
use super::m002_create_teams::{Memberships, Teams};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TeamApiKeys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TeamApiKeys::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(TeamApiKeys::KeyId).uuid().not_null().unique_key())
                    .col(ColumnDef::new(TeamApiKeys::Prefix).string_len(8).not_null().unique_key())
                    .col(ColumnDef::new(TeamApiKeys::HashedKey).string_len(64).not_null())
                    .col(ColumnDef::new(TeamApiKeys::Name).string().not_null())
                    .col(ColumnDef::new(TeamApiKeys::Revoked).boolean().not_null().default(false))
                    .col(ColumnDef::new(TeamApiKeys::ExpiryDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(TeamApiKeys::Status).string_len(16).not_null().default("active"))
                    .col(ColumnDef::new(TeamApiKeys::LastUsed).timestamp_with_time_zone())
                    .col(ColumnDef::new(TeamApiKeys::UserId).uuid().not_null())
                    .col(ColumnDef::new(TeamApiKeys::TeamId).uuid().not_null())
                    .col(ColumnDef::new(TeamApiKeys::MembershipId).integer().not_null())
                    .col(ColumnDef::new(TeamApiKeys::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_api_keys_user_id")
                            .from(TeamApiKeys::Table, TeamApiKeys::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_api_keys_team_id")
                            .from(TeamApiKeys::Table, TeamApiKeys::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_api_keys_membership_id")
                            .from(TeamApiKeys::Table, TeamApiKeys::MembershipId)
                            .to(Memberships::Table, Memberships::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_team_api_keys_team_id")
                    .table(TeamApiKeys::Table)
                    .col(TeamApiKeys::TeamId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TeamApiKeys::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum TeamApiKeys {
    Table,
    Id,
    KeyId,
    Prefix,
    HashedKey,
    Name,
    Revoked,
    ExpiryDate,
    Status,
    LastUsed,
    UserId,
    TeamId,
    MembershipId,
    CreatedAt,
}
