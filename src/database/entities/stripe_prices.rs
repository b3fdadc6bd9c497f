use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stripe_prices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub product_id: String,
    pub currency: String,
    /// Minor units (cents).
    pub unit_amount: Option<i64>,
    pub nickname: Option<String>,
    pub recurring_interval: Option<String>,
    pub usage_type: Option<String>,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stripe_products::Entity",
        from = "Column::ProductId",
        to = "super::stripe_products::Column::Id",
        on_delete = "Cascade"
    )]
    StripeProducts,
}

impl Related<super::stripe_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StripeProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_metered(&self) -> bool {
        self.usage_type.as_deref() == Some("metered")
    }
}
