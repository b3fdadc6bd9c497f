use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A tenant. Owns at most one Stripe customer and one subscription.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<Uuid>,
    pub is_private: bool,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::memberships::Entity")]
    Memberships,
    #[sea_orm(has_many = "super::invitations::Entity")]
    Invitations,
    #[sea_orm(has_many = "super::team_api_keys::Entity")]
    TeamApiKeys,
    #[sea_orm(
        belongs_to = "super::stripe_subscriptions::Entity",
        from = "Column::SubscriptionId",
        to = "super::stripe_subscriptions::Column::Id",
        on_delete = "SetNull"
    )]
    StripeSubscriptions,
}

impl Related<super::memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::invitations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitations.def()
    }
}

impl Related<super::team_api_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeamApiKeys.def()
    }
}

impl Related<super::stripe_subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StripeSubscriptions.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        super::memberships::Relation::Users.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::memberships::Relation::Teams.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
