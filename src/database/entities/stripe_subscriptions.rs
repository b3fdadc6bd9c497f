use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local mirror of a Stripe subscription, kept current by webhooks and by
/// explicit provisioning.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stripe_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub item_id: Option<String>,
    pub price_id: Option<String>,
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub start_date: Option<ChronoDateTimeUtc>,
    pub current_period_start: Option<ChronoDateTimeUtc>,
    pub current_period_end: Option<ChronoDateTimeUtc>,
    pub trial_end: Option<ChronoDateTimeUtc>,
    pub cancel_at_period_end: bool,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::teams::Entity")]
    Teams,
    #[sea_orm(
        belongs_to = "super::stripe_products::Entity",
        from = "Column::ProductId",
        to = "super::stripe_products::Column::Id"
    )]
    StripeProducts,
}

impl Related<super::teams::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teams.def()
    }
}

impl Related<super::stripe_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StripeProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
