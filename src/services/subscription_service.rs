//! Team subscriptions: trial provisioning, checkout, billing portal and the
//! read models served by the subscription endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clients::stripe::{CheckoutLineItem, CheckoutRequest};
use crate::clients::StripeClient;
use crate::config::Settings;
use crate::database::entities::{
    memberships, stripe_prices, stripe_products, stripe_subscriptions, subscription_config, teams,
    users,
};
use crate::errors::{CoreError, CoreResult};

use super::BillingSyncService;

pub const NO_SUBSCRIPTION_MESSAGE: &str =
    "Whoops, we couldn't find a subscription associated with your account!";

/// Sigils shown in front of an amount instead of the currency code.
const CURRENCY_SIGILS: &[(&str, &str)] = &[
    ("CAD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("USD", "$"),
];

/// `unit_amount` is in minor units. Unknown amounts render as "Unknown".
pub fn price_display(unit_amount: Option<i64>, currency: &str) -> String {
    let Some(amount) = unit_amount else {
        return "Unknown".to_string();
    };
    let currency = currency.to_uppercase();
    let value = amount as f64 / 100.0;
    match CURRENCY_SIGILS.iter().find(|(code, _)| *code == currency) {
        Some((_, sigil)) => format!("{}{:.2}", sigil, value),
        None => format!("{:.2} {}", value, currency),
    }
}

/// Display with the billing interval, e.g. `$10.00/month`.
pub fn human_readable_price(price: &stripe_prices::Model) -> String {
    let amount = price_display(price.unit_amount, &price.currency);
    match &price.recurring_interval {
        Some(interval) if price.unit_amount.is_some() => format!("{}/{}", amount, interval),
        _ => amount,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PriceView {
    pub id: String,
    pub product_name: String,
    pub human_readable_price: String,
    pub payment_amount: String,
    pub nickname: Option<String>,
    pub unit_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_type: Option<String>,
}

impl PriceView {
    pub fn new(price: &stripe_prices::Model, product_name: &str) -> Self {
        Self {
            id: price.id.clone(),
            product_name: product_name.to_string(),
            human_readable_price: human_readable_price(price),
            payment_amount: price_display(price.unit_amount, &price.currency),
            nickname: price.nickname.clone(),
            unit_amount: price.unit_amount,
            recurring_type: None,
        }
    }

    pub fn with_recurring_type(mut self, price: &stripe_prices::Model) -> Self {
        self.recurring_type = price.recurring_interval.clone();
        self
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub prices: Vec<PriceView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionItemView {
    pub id: Option<String>,
    pub price: PriceView,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionView {
    pub id: String,
    pub start_date: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub status: String,
    pub quantity: Option<i64>,
    pub items: Vec<SubscriptionItemView>,
}

#[derive(Clone)]
pub struct SubscriptionService {
    db: DatabaseConnection,
    stripe: StripeClient,
    settings: Arc<Settings>,
}

impl SubscriptionService {
    pub fn new(db: DatabaseConnection, stripe: StripeClient, settings: Arc<Settings>) -> Self {
        Self {
            db,
            stripe,
            settings,
        }
    }

    pub async fn config(&self) -> CoreResult<BTreeMap<String, String>> {
        Ok(subscription_config::Entity::find()
            .order_by_asc(subscription_config::Column::Key)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| (row.key, row.value))
            .collect())
    }

    pub async fn update_config(
        &self,
        values: BTreeMap<String, String>,
    ) -> CoreResult<BTreeMap<String, String>> {
        for (key, value) in values {
            if key.trim().is_empty() {
                return Err(CoreError::field("key", "This field may not be blank."));
            }
            let row = subscription_config::ActiveModel {
                key: Set(key.clone()),
                value: Set(value),
            };
            match subscription_config::Entity::find_by_id(key).one(&self.db).await? {
                Some(_) => row.update(&self.db).await?,
                None => row.insert(&self.db).await?,
            };
        }
        self.config().await
    }

    async fn config_value(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(subscription_config::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?
            .map(|row| row.value)
            .filter(|value| !value.trim().is_empty()))
    }

    async fn config_number(&self, key: &str) -> CoreResult<i64> {
        Ok(self
            .config_value(key)
            .await?
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0))
    }

    pub async fn trial_duration(&self) -> CoreResult<Duration> {
        let days = self.config_number(subscription_config::KEY_TRIAL_DAYS).await?;
        let hours = self.config_number(subscription_config::KEY_TRIAL_HOURS).await?;
        let minutes = self.config_number(subscription_config::KEY_TRIAL_MINUTES).await?;
        Ok(Duration::days(days) + Duration::hours(hours) + Duration::minutes(minutes))
    }

    pub async fn default_price_id(&self) -> CoreResult<Option<String>> {
        self.config_value(subscription_config::KEY_DEFAULT_PRICE_ID).await
    }

    /// Creates the Stripe customer and the trial subscription for a new team.
    pub async fn subscribe_team_to_initial_subscription(
        &self,
        team: &teams::Model,
        owner: &users::Model,
    ) -> CoreResult<teams::Model> {
        let Some(price_id) = self.default_price_id().await? else {
            warn!("No default price configured, team {} starts unsubscribed", team.id);
            return Ok(team.clone());
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("team_id".to_string(), team.id.to_string());
        let customer = self
            .stripe
            .create_customer(&owner.email, &team.name, &metadata)
            .await?;

        let trial_end = Utc::now() + self.trial_duration().await?;
        let subscription = self
            .stripe
            .create_subscription(&customer.id, &price_id, trial_end)
            .await?;
        let synced = self.billing().sync_subscription(&subscription).await?;

        let mut active = team.clone().into_active_model();
        active.customer_id = Set(Some(customer.id));
        active.subscription_id = Set(Some(synced.id));
        active.updated_at = Set(Utc::now());
        let team = active.update(&self.db).await?;
        info!("Team {} subscribed to trial on {}", team.id, price_id);
        Ok(team)
    }

    pub async fn subscription_for_team(
        &self,
        team: &teams::Model,
    ) -> CoreResult<Option<stripe_subscriptions::Model>> {
        match &team.subscription_id {
            Some(id) => Ok(stripe_subscriptions::Entity::find_by_id(id.clone())
                .one(&self.db)
                .await?),
            None => Ok(None),
        }
    }

    pub async fn subscription_view(
        &self,
        subscription: &stripe_subscriptions::Model,
    ) -> CoreResult<SubscriptionView> {
        let mut items = Vec::new();
        if let Some(price_id) = &subscription.price_id {
            if let Some((price, product)) = stripe_prices::Entity::find_by_id(price_id.clone())
                .find_also_related(stripe_products::Entity)
                .one(&self.db)
                .await?
            {
                let product_name = product.map(|p| p.name).unwrap_or_default();
                items.push(SubscriptionItemView {
                    id: subscription.item_id.clone(),
                    price: PriceView::new(&price, &product_name),
                    quantity: subscription.quantity,
                });
            }
        }

        Ok(SubscriptionView {
            id: subscription.id.clone(),
            start_date: subscription.start_date,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            status: subscription.status.clone(),
            quantity: subscription.quantity,
            items,
        })
    }

    pub async fn active_subscription_view(
        &self,
        team: &teams::Model,
    ) -> CoreResult<Option<SubscriptionView>> {
        match self.subscription_for_team(team).await? {
            Some(subscription) => Ok(Some(self.subscription_view(&subscription).await?)),
            None => Ok(None),
        }
    }

    pub async fn active_products(&self) -> CoreResult<Vec<ProductView>> {
        let rows = stripe_products::Entity::find()
            .filter(stripe_products::Column::Active.eq(true))
            .order_by_asc(stripe_products::Column::Name)
            .find_with_related(stripe_prices::Entity)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, prices)| ProductView {
                prices: prices
                    .iter()
                    .filter(|price| price.active)
                    .map(|price| PriceView::new(price, &product.name).with_recurring_type(price))
                    .collect(),
                id: product.id,
                name: product.name,
                description: product.description,
                active: product.active,
                metadata: product.metadata,
            })
            .collect())
    }

    /// Starts a Stripe Checkout session and returns its redirect URL.
    pub async fn create_checkout_session(
        &self,
        team: &teams::Model,
        user: &users::Model,
        price_id: &str,
    ) -> CoreResult<String> {
        let quantity = self.checkout_quantity(team, price_id).await?;
        let frontend = &self.settings.frontend_base_url;
        let request = CheckoutRequest {
            success_url: format!(
                "{}/dashboard/team/{}/subscription/confirm?session_id={{CHECKOUT_SESSION_ID}}",
                frontend, team.id
            ),
            cancel_url: format!("{}/dashboard/team/{}/subscription/cancel", frontend, team.id),
            client_reference_id: team.id.to_string(),
            customer: team.customer_id.clone(),
            line_item: Some(CheckoutLineItem {
                price: price_id.to_string(),
                quantity,
            }),
            description: team.name.clone(),
            subscription_metadata: checkout_metadata(team, user),
        };

        let session = self.stripe.create_checkout_session(&request).await?;
        session
            .url
            .ok_or_else(CoreError::integration_failure)
    }

    /// Metered prices take no quantity; others are billed per member.
    async fn checkout_quantity(&self, team: &teams::Model, price_id: &str) -> CoreResult<Option<i64>> {
        let price = stripe_prices::Entity::find_by_id(price_id.to_string())
            .one(&self.db)
            .await?;
        if price.as_ref().is_some_and(|price| price.is_metered()) {
            return Ok(None);
        }
        let members = memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team.id))
            .count(&self.db)
            .await?;
        Ok(Some(members.max(1) as i64))
    }

    /// Provisions the subscription of a completed checkout unless a webhook
    /// already did.
    pub async fn confirm_subscription(&self, user: &users::Model, session_id: &str) -> CoreResult<()> {
        let session = self.stripe.retrieve_checkout_session(session_id).await?;
        let team_id = session
            .client_reference_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| CoreError::validation("Invalid checkout session"))?;

        let team = teams::Entity::find_by_id(team_id)
            .inner_join(memberships::Entity)
            .filter(memberships::Column::UserId.eq(user.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("team", team_id.to_string()))?;

        let Some(subscription_id) = session.subscription else {
            return Err(CoreError::validation("Checkout session has no subscription"));
        };
        if team.subscription_id.as_deref() != Some(subscription_id.as_str()) {
            self.provision_subscription(&team, &subscription_id).await?;
        }
        Ok(())
    }

    pub async fn provision_subscription(
        &self,
        team: &teams::Model,
        subscription_id: &str,
    ) -> CoreResult<teams::Model> {
        let subscription = self.stripe.retrieve_subscription(subscription_id).await?;
        let synced = self.billing().sync_subscription(&subscription).await?;

        let mut active = team.clone().into_active_model();
        active.subscription_id = Set(Some(synced.id.clone()));
        if team.customer_id.is_none() {
            active.customer_id = Set(Some(synced.customer_id.clone()));
        }
        active.updated_at = Set(Utc::now());
        let team = active.update(&self.db).await?;
        info!("Provisioned subscription {} for team {}", synced.id, team.id);
        Ok(team)
    }

    pub async fn create_portal_session(&self, team: &teams::Model) -> CoreResult<String> {
        let subscription = self.subscription_for_team(team).await?;
        let Some(subscription) = subscription.filter(|s| !s.customer_id.is_empty()) else {
            return Err(CoreError::validation(NO_SUBSCRIPTION_MESSAGE));
        };

        let return_url = format!("{}/teams/{}", self.settings.frontend_base_url, team.id);
        let session = self
            .stripe
            .create_portal_session(&subscription.customer_id, &return_url)
            .await?;
        Ok(session.url)
    }

    /// Cancels a subscription; a subscription Stripe no longer knows is
    /// ignored.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> CoreResult<()> {
        match self.stripe.cancel_subscription(subscription_id).await {
            Ok(subscription) => {
                self.billing().sync_subscription(&subscription).await?;
                Ok(())
            }
            Err(e) if e.is_resource_missing() => Ok(()),
            Err(e) => {
                error!("Error deleting Stripe subscription: {}", e);
                Ok(())
            }
        }
    }

    pub async fn close_customer_and_subscriptions(&self, customer_id: &str) -> CoreResult<()> {
        let subscriptions = self.stripe.list_customer_subscriptions(customer_id).await?;
        for subscription in subscriptions {
            self.stripe.cancel_subscription(&subscription.id).await?;
        }
        self.stripe.delete_customer(customer_id).await?;
        info!("Closed Stripe customer {}", customer_id);
        Ok(())
    }

    fn billing(&self) -> BillingSyncService {
        BillingSyncService::new(self.db.clone(), self.stripe.clone())
    }
}

pub fn checkout_metadata(team: &teams::Model, user: &users::Model) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("team_id".to_string(), team.id.to_string());
    metadata.insert("team_slug".to_string(), team.slug.clone().unwrap_or_default());
    metadata.insert("team_name".to_string(), team.name.clone());
    metadata.insert("user_id".to_string(), user.id.to_string());
    metadata.insert("user_email".to_string(), user.email.clone());
    metadata.insert("user_name".to_string(), user.full_name());
    metadata
}
