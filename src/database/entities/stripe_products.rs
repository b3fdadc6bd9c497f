use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const METADATA_ALLOWED_API_ACCESS: &str = "allowed_api_access";
pub const METADATA_ALLOWED_USER_COUNT: &str = "allowed_user_count";

/// Local mirror of a Stripe product, kept current by webhooks.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stripe_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub metadata: Json,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stripe_prices::Entity")]
    StripePrices,
}

impl Related<super::stripe_prices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StripePrices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn metadata_value(&self, key: &str) -> Option<String> {
        metadata_value(&self.metadata, key)
    }

    pub fn allowed_api_access(&self) -> Option<String> {
        self.metadata_value(METADATA_ALLOWED_API_ACCESS)
    }

    pub fn allowed_user_count(&self) -> i64 {
        self.metadata_value(METADATA_ALLOWED_USER_COUNT)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Stripe metadata values are strings; anything else is stringified.
pub fn metadata_value(metadata: &Json, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Json::Null => None,
        Json::String(value) => Some(value.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(metadata: Json) -> Model {
        Model {
            id: "prod_123".to_string(),
            name: "Team".to_string(),
            description: None,
            active: true,
            metadata,
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_metadata_lookup() {
        let product = product(json!({"allowed_api_access": "true", "allowed_user_count": "5"}));
        assert_eq!(product.allowed_api_access().as_deref(), Some("true"));
        assert_eq!(product.allowed_user_count(), 5);
    }

    #[test]
    fn test_missing_or_invalid_user_count_is_zero() {
        assert_eq!(product(json!({})).allowed_user_count(), 0);
        assert_eq!(product(json!({"allowed_user_count": "many"})).allowed_user_count(), 0);
        assert_eq!(product(json!({})).allowed_api_access(), None);
    }
}
