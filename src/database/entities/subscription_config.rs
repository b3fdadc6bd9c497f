use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const KEY_DEFAULT_PRICE_ID: &str = "default_price_id";
pub const KEY_TRIAL_DAYS: &str = "subscription_trial_duration_days";
pub const KEY_TRIAL_HOURS: &str = "subscription_trial_duration_hours";
pub const KEY_TRIAL_MINUTES: &str = "subscription_trial_duration_minutes";

/// Admin-editable billing settings, one row per key.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
