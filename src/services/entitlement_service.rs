//! Subscription entitlements and the rules that block team API keys when an
//! entitlement lapses. Blocked keys are never re-activated here.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::info;

use crate::database::entities::{stripe_products, stripe_subscriptions, teams};
use crate::errors::CoreResult;

use super::ApiKeyService;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_TRIALING: &str = "trialing";

pub fn subscription_is_active(status: &str) -> bool {
    status == STATUS_ACTIVE || status == STATUS_TRIALING
}

/// Decides whether saving a subscription blocks its teams' keys.
///
/// `old_allowed` is `None` when no row existed before; otherwise it holds the
/// `allowed_api_access` metadata of the previously stored product.
pub fn subscription_save_blocks_keys(
    new_status: &str,
    old_allowed: Option<Option<&str>>,
    new_allowed: Option<&str>,
) -> bool {
    if !subscription_is_active(new_status) {
        return true;
    }
    let Some(old_allowed) = old_allowed else {
        return false;
    };
    if new_allowed == Some("true") {
        return false;
    }
    old_allowed != new_allowed
}

/// Decides whether saving a product blocks keys of teams subscribed to it.
pub fn product_save_blocks_keys(old_value: Option<&str>, new_allowed: Option<&str>) -> bool {
    if new_allowed == Some("true") {
        return false;
    }
    match old_value {
        None | Some("") => false,
        Some(old) => Some(old) != new_allowed,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Entitlements {
    pub subscription: Option<stripe_subscriptions::Model>,
    pub product: Option<stripe_products::Model>,
    pub has_active_subscription: bool,
    pub allowed_api_access: bool,
    pub user_limit: i64,
}

impl Entitlements {
    pub fn from_rows(
        subscription: Option<stripe_subscriptions::Model>,
        product: Option<stripe_products::Model>,
    ) -> Self {
        let has_active_subscription = subscription
            .as_ref()
            .map(|sub| subscription_is_active(&sub.status))
            .unwrap_or(false);

        let (allowed_api_access, user_limit) = if has_active_subscription {
            let allowed = product
                .as_ref()
                .and_then(|p| p.allowed_api_access())
                .map(|value| value == "true")
                .unwrap_or(false);
            let limit = product.as_ref().map(|p| p.allowed_user_count()).unwrap_or(0);
            (allowed, limit)
        } else {
            (false, 1)
        };

        Self {
            subscription,
            product,
            has_active_subscription,
            allowed_api_access,
            user_limit,
        }
    }
}

#[derive(Clone)]
pub struct EntitlementService {
    db: DatabaseConnection,
}

impl EntitlementService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn for_team(&self, team: &teams::Model) -> CoreResult<Entitlements> {
        let Some(subscription_id) = &team.subscription_id else {
            return Ok(Entitlements::from_rows(None, None));
        };

        let subscription = stripe_subscriptions::Entity::find_by_id(subscription_id.clone())
            .one(&self.db)
            .await?;
        let product = match subscription.as_ref().and_then(|s| s.product_id.clone()) {
            Some(product_id) => stripe_products::Entity::find_by_id(product_id)
                .one(&self.db)
                .await?,
            None => None,
        };

        Ok(Entitlements::from_rows(subscription, product))
    }

    async fn product_allowed_value(&self, product_id: Option<&String>) -> CoreResult<Option<String>> {
        let Some(product_id) = product_id else {
            return Ok(None);
        };
        Ok(stripe_products::Entity::find_by_id(product_id.clone())
            .one(&self.db)
            .await?
            .and_then(|product| product.allowed_api_access()))
    }

    /// Runs before `new` replaces `old` in the database.
    pub async fn on_subscription_saved(
        &self,
        old: Option<&stripe_subscriptions::Model>,
        new: &stripe_subscriptions::Model,
    ) -> CoreResult<u64> {
        let new_allowed = self.product_allowed_value(new.product_id.as_ref()).await?;
        let old_allowed = match old {
            Some(old) => Some(self.product_allowed_value(old.product_id.as_ref()).await?),
            None => None,
        };

        let blocks = subscription_save_blocks_keys(
            &new.status,
            old_allowed.as_ref().map(|value| value.as_deref()),
            new_allowed.as_deref(),
        );
        if !blocks {
            return Ok(0);
        }

        let blocked = ApiKeyService::new(self.db.clone())
            .block_for_subscription(&new.id)
            .await?;
        info!(
            "Blocked {} API keys for subscription {} (status {})",
            blocked, new.id, new.status
        );
        Ok(blocked)
    }

    /// `old_value` is the product's `allowed_api_access` before the save.
    pub async fn on_product_saved(
        &self,
        old_value: Option<&str>,
        new: &stripe_products::Model,
    ) -> CoreResult<u64> {
        let new_allowed = new.allowed_api_access();
        if !product_save_blocks_keys(old_value, new_allowed.as_deref()) {
            return Ok(0);
        }

        let subscription_ids: Vec<String> = stripe_subscriptions::Entity::find()
            .filter(stripe_subscriptions::Column::Status.eq(STATUS_ACTIVE))
            .filter(stripe_subscriptions::Column::ProductId.eq(new.id.as_str()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|subscription| subscription.id)
            .collect();

        let blocked = ApiKeyService::new(self.db.clone())
            .block_for_subscriptions(&subscription_ids)
            .await?;
        info!(
            "Blocked {} API keys after product {} lost API access",
            blocked, new.id
        );
        Ok(blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_subscription_is_active() {
        assert!(subscription_is_active("active"));
        assert!(subscription_is_active("trialing"));
        assert!(!subscription_is_active("past_due"));
        assert!(!subscription_is_active("canceled"));
    }

    #[test]
    fn test_inactive_subscription_always_blocks() {
        assert!(subscription_save_blocks_keys("canceled", None, Some("true")));
        assert!(subscription_save_blocks_keys("unpaid", Some(Some("true")), Some("true")));
    }

    #[test]
    fn test_subscription_rules_for_active_status() {
        // first sighting
        assert!(!subscription_save_blocks_keys("active", None, None));
        // still allowed
        assert!(!subscription_save_blocks_keys("active", Some(Some("true")), Some("true")));
        // unchanged non-true value
        assert!(!subscription_save_blocks_keys("active", Some(None), None));
        // downgrade
        assert!(subscription_save_blocks_keys("active", Some(Some("true")), Some("false")));
        assert!(subscription_save_blocks_keys("trialing", Some(Some("true")), None));
    }

    #[test]
    fn test_product_rules() {
        assert!(!product_save_blocks_keys(Some("true"), Some("true")));
        assert!(!product_save_blocks_keys(None, Some("false")));
        assert!(!product_save_blocks_keys(Some(""), Some("false")));
        assert!(!product_save_blocks_keys(Some("false"), Some("false")));
        assert!(product_save_blocks_keys(Some("true"), Some("false")));
        assert!(product_save_blocks_keys(Some("true"), None));
    }

    fn subscription(status: &str) -> stripe_subscriptions::Model {
        stripe_subscriptions::Model {
            id: "sub_1".to_string(),
            customer_id: "cus_1".to_string(),
            status: status.to_string(),
            item_id: Some("si_1".to_string()),
            price_id: Some("price_1".to_string()),
            product_id: Some("prod_1".to_string()),
            quantity: Some(1),
            start_date: None,
            current_period_start: None,
            current_period_end: None,
            trial_end: None,
            cancel_at_period_end: false,
            updated_at: Utc::now(),
        }
    }

    fn product(metadata: serde_json::Value) -> stripe_products::Model {
        stripe_products::Model {
            id: "prod_1".to_string(),
            name: "Team".to_string(),
            description: None,
            active: true,
            metadata,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entitlements_without_subscription() {
        let entitlements = Entitlements::from_rows(None, None);
        assert!(!entitlements.has_active_subscription);
        assert!(!entitlements.allowed_api_access);
        assert_eq!(entitlements.user_limit, 1);
    }

    #[test]
    fn test_entitlements_from_product_metadata() {
        let entitlements = Entitlements::from_rows(
            Some(subscription("trialing")),
            Some(product(json!({"allowed_api_access": "true", "allowed_user_count": "10"}))),
        );
        assert!(entitlements.has_active_subscription);
        assert!(entitlements.allowed_api_access);
        assert_eq!(entitlements.user_limit, 10);

        let lapsed = Entitlements::from_rows(
            Some(subscription("canceled")),
            Some(product(json!({"allowed_api_access": "true", "allowed_user_count": "10"}))),
        );
        assert!(!lapsed.allowed_api_access);
        assert_eq!(lapsed.user_limit, 1);
    }
}
