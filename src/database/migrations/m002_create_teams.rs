use sea_orm_migration::prelude::*;

use super::m001_create_accounts::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // subscription_id points at stripe_subscriptions, which is created in
        // m003; the column stays a plain reference here.
        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Teams::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Teams::Name).string().not_null())
                    .col(ColumnDef::new(Teams::Slug).string().unique_key())
                    .col(ColumnDef::new(Teams::Description).text())
                    .col(ColumnDef::new(Teams::OwnerId).uuid())
                    .col(ColumnDef::new(Teams::IsPrivate).boolean().not_null().default(false))
                    .col(ColumnDef::new(Teams::CustomerId).string())
                    .col(ColumnDef::new(Teams::SubscriptionId).string())
                    .col(ColumnDef::new(Teams::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Teams::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_teams_owner_id")
                            .from(Teams::Table, Teams::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Memberships::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Memberships::Id).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Memberships::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Memberships::UserId).uuid().not_null())
                    .col(ColumnDef::new(Memberships::Role).string_len(32).not_null().default("member"))
                    .col(ColumnDef::new(Memberships::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Memberships::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memberships_team_id")
                            .from(Memberships::Table, Memberships::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_memberships_user_id")
                            .from(Memberships::Table, Memberships::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_memberships_team_user")
                    .table(Memberships::Table)
                    .col(Memberships::TeamId)
                    .col(Memberships::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invitations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invitations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Invitations::TeamId).uuid().not_null())
                    .col(ColumnDef::new(Invitations::Email).string().not_null())
                    .col(ColumnDef::new(Invitations::Role).string_len(32).not_null().default("member"))
                    .col(ColumnDef::new(Invitations::InvitedBy).uuid().not_null())
                    .col(ColumnDef::new(Invitations::IsAccepted).boolean().not_null().default(false))
                    .col(ColumnDef::new(Invitations::IsCancelled).boolean().not_null().default(false))
                    .col(ColumnDef::new(Invitations::AcceptedBy).uuid())
                    .col(ColumnDef::new(Invitations::LastEmailDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Invitations::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Invitations::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invitations_team_id")
                            .from(Invitations::Table, Invitations::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invitations_invited_by")
                            .from(Invitations::Table, Invitations::InvitedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_invitations_accepted_by")
                            .from(Invitations::Table, Invitations::AcceptedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_invitations_email")
                    .table(Invitations::Table)
                    .col(Invitations::Email)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invitations::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Memberships::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Teams {
    Table,
    Id,
    Name,
    Slug,
    Description,
    OwnerId,
    IsPrivate,
    CustomerId,
    SubscriptionId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Memberships {
    Table,
    Id,
    TeamId,
    UserId,
    Role,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Invitations {
    Table,
    Id,
    TeamId,
    Email,
    Role,
    InvitedBy,
    IsAccepted,
    IsCancelled,
    AcceptedBy,
    LastEmailDate,
    CreatedAt,
    UpdatedAt,
}
