use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StripeProducts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StripeProducts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(StripeProducts::Name).string().not_null())
                    .col(ColumnDef::new(StripeProducts::Description).text())
                    .col(ColumnDef::new(StripeProducts::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(StripeProducts::Metadata).json().not_null())
                    .col(ColumnDef::new(StripeProducts::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StripePrices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StripePrices::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(StripePrices::ProductId).string().not_null())
                    .col(ColumnDef::new(StripePrices::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(StripePrices::UnitAmount).big_integer())
                    .col(ColumnDef::new(StripePrices::Nickname).string())
                    .col(ColumnDef::new(StripePrices::RecurringInterval).string())
                    .col(ColumnDef::new(StripePrices::UsageType).string())
                    .col(ColumnDef::new(StripePrices::Active).boolean().not_null().default(true))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stripe_prices_product_id")
                            .from(StripePrices::Table, StripePrices::ProductId)
                            .to(StripeProducts::Table, StripeProducts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StripeSubscriptions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(StripeSubscriptions::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(StripeSubscriptions::CustomerId).string().not_null())
                    .col(ColumnDef::new(StripeSubscriptions::Status).string().not_null())
                    .col(ColumnDef::new(StripeSubscriptions::ItemId).string())
                    .col(ColumnDef::new(StripeSubscriptions::PriceId).string())
                    .col(ColumnDef::new(StripeSubscriptions::ProductId).string())
                    .col(ColumnDef::new(StripeSubscriptions::Quantity).big_integer())
                    .col(ColumnDef::new(StripeSubscriptions::StartDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(StripeSubscriptions::CurrentPeriodStart).timestamp_with_time_zone())
                    .col(ColumnDef::new(StripeSubscriptions::CurrentPeriodEnd).timestamp_with_time_zone())
                    .col(ColumnDef::new(StripeSubscriptions::TrialEnd).timestamp_with_time_zone())
                    .col(ColumnDef::new(StripeSubscriptions::CancelAtPeriodEnd).boolean().not_null().default(false))
                    .col(ColumnDef::new(StripeSubscriptions::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stripe_subscriptions_customer_id")
                    .table(StripeSubscriptions::Table)
                    .col(StripeSubscriptions::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubscriptionConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SubscriptionConfig::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(SubscriptionConfig::Value).string().not_null())
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(SubscriptionConfig::Table)
            .columns([SubscriptionConfig::Key, SubscriptionConfig::Value])
            .values_panic(["subscription_trial_duration_days".into(), "0".into()])
            .values_panic(["subscription_trial_duration_hours".into(), "0".into()])
            .values_panic(["subscription_trial_duration_minutes".into(), "10".into()])
            .to_owned();
        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SubscriptionConfig::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StripeSubscriptions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StripePrices::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StripeProducts::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum StripeProducts {
    Table,
    Id,
    Name,
    Description,
    Active,
    Metadata,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StripePrices {
    Table,
    Id,
    ProductId,
    Currency,
    UnitAmount,
    Nickname,
    RecurringInterval,
    UsageType,
    Active,
}

#[derive(DeriveIden)]
enum StripeSubscriptions {
    Table,
    Id,
    CustomerId,
    Status,
    ItemId,
    PriceId,
    ProductId,
    Quantity,
    StartDate,
    CurrentPeriodStart,
    CurrentPeriodEnd,
    TrialEnd,
    CancelAtPeriodEnd,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SubscriptionConfig {
    Table,
    Key,
    Value,
}
