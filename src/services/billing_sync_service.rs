//! Keeps the local Stripe mirror (products, prices, subscriptions) current and
//! applies the entitlement rules whenever a row changes.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Set};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::clients::stripe::{self, timestamp_to_datetime};
use crate::clients::StripeClient;
use crate::database::entities::{stripe_prices, stripe_products, stripe_subscriptions};
use crate::errors::CoreResult;

use super::EntitlementService;

#[derive(Clone)]
pub struct BillingSyncService {
    db: DatabaseConnection,
    stripe: StripeClient,
}

impl BillingSyncService {
    pub fn new(db: DatabaseConnection, stripe: StripeClient) -> Self {
        Self { db, stripe }
    }

    pub async fn sync_product(&self, product: &stripe::Product) -> CoreResult<stripe_products::Model> {
        let existing = stripe_products::Entity::find_by_id(product.id.clone())
            .one(&self.db)
            .await?;
        let old_value = existing.as_ref().and_then(|p| p.allowed_api_access());

        let metadata: Map<String, Value> = product
            .metadata
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();

        let row = stripe_products::Model {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            active: product.active,
            metadata: Value::Object(metadata),
            updated_at: Utc::now(),
        };
        let saved = upsert_product(&self.db, existing.is_some(), row).await?;

        EntitlementService::new(self.db.clone())
            .on_product_saved(old_value.as_deref(), &saved)
            .await?;
        Ok(saved)
    }

    pub async fn deactivate_product(&self, product_id: &str) -> CoreResult<()> {
        if let Some(product) = stripe_products::Entity::find_by_id(product_id.to_string())
            .one(&self.db)
            .await?
        {
            let mut active = product.into_active_model();
            active.active = Set(false);
            active.updated_at = Set(Utc::now());
            active.update(&self.db).await?;
            info!("Marked product {} inactive", product_id);
        }
        Ok(())
    }

    /// Makes sure the product referenced by a price or subscription exists
    /// locally, fetching it from Stripe when it does not.
    async fn ensure_product(&self, product_id: &str) -> CoreResult<bool> {
        if stripe_products::Entity::find_by_id(product_id.to_string())
            .one(&self.db)
            .await?
            .is_some()
        {
            return Ok(true);
        }

        match self.stripe.retrieve_product(product_id).await {
            Ok(product) => {
                self.sync_product(&product).await?;
                Ok(true)
            }
            Err(e) => {
                warn!("Could not fetch product {} from Stripe: {}", product_id, e);
                Ok(false)
            }
        }
    }

    pub async fn sync_price(&self, price: &stripe::Price) -> CoreResult<Option<stripe_prices::Model>> {
        if !self.ensure_product(&price.product).await? {
            warn!("Skipping price {} for unknown product {}", price.id, price.product);
            return Ok(None);
        }

        let existing = stripe_prices::Entity::find_by_id(price.id.clone())
            .one(&self.db)
            .await?;
        let recurring = price.recurring.as_ref();
        let row = stripe_prices::ActiveModel {
            id: Set(price.id.clone()),
            product_id: Set(price.product.clone()),
            currency: Set(price.currency.clone()),
            unit_amount: Set(price.unit_amount),
            nickname: Set(price.nickname.clone()),
            recurring_interval: Set(recurring.and_then(|r| r.interval.clone())),
            usage_type: Set(recurring.and_then(|r| r.usage_type.clone())),
            active: Set(price.active),
        };

        let saved = if existing.is_some() {
            row.update(&self.db).await?
        } else {
            row.insert(&self.db).await?
        };
        Ok(Some(saved))
    }

    /// Upserts a subscription. Entitlement rules run against the previously
    /// stored row before it is replaced.
    pub async fn sync_subscription(
        &self,
        subscription: &stripe::Subscription,
    ) -> CoreResult<stripe_subscriptions::Model> {
        if let Some(price) = subscription.price() {
            self.sync_price(price).await?;
        }

        let existing = stripe_subscriptions::Entity::find_by_id(subscription.id.clone())
            .one(&self.db)
            .await?;

        let price = subscription.price();
        let row = stripe_subscriptions::Model {
            id: subscription.id.clone(),
            customer_id: subscription.customer.clone(),
            status: subscription.status.clone(),
            item_id: subscription.items.data.first().map(|item| item.id.clone()),
            price_id: price.map(|p| p.id.clone()),
            product_id: price.map(|p| p.product.clone()),
            quantity: subscription.item_quantity(),
            start_date: timestamp_to_datetime(subscription.start_date),
            current_period_start: timestamp_to_datetime(subscription.current_period_start),
            current_period_end: timestamp_to_datetime(subscription.current_period_end),
            trial_end: timestamp_to_datetime(subscription.trial_end),
            cancel_at_period_end: subscription.cancel_at_period_end,
            updated_at: Utc::now(),
        };

        EntitlementService::new(self.db.clone())
            .on_subscription_saved(existing.as_ref(), &row)
            .await?;

        let active = row.into_active_model();
        let saved = if existing.is_some() {
            active.reset_all().update(&self.db).await?
        } else {
            active.insert(&self.db).await?
        };
        info!("Synced subscription {} ({})", saved.id, saved.status);
        Ok(saved)
    }
}

async fn upsert_product(
    db: &DatabaseConnection,
    exists: bool,
    row: stripe_products::Model,
) -> CoreResult<stripe_products::Model> {
    let active = row.into_active_model();
    if exists {
        Ok(active.reset_all().update(db).await?)
    } else {
        Ok(active.insert(db).await?)
    }
}
