//! Minimal Stripe REST client.
//!
//! Stripe takes `application/x-www-form-urlencoded` bodies with bracketed keys
//! for nested values (`items[0][price]`, `metadata[team_id]`), so requests are
//! assembled as flat `(key, value)` lists.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::errors::StripeError;

pub type StripeResult<T> = Result<T, StripeError>;

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Recurring {
    pub interval: Option<String>,
    pub usage_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Price {
    pub id: String,
    pub product: String,
    pub currency: String,
    pub unit_amount: Option<i64>,
    pub nickname: Option<String>,
    pub recurring: Option<Recurring>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    pub id: String,
    pub price: Price,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub items: List<SubscriptionItem>,
    pub quantity: Option<i64>,
    pub start_date: Option<i64>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Subscription {
    /// Price of the first line item; subscriptions here carry a single plan.
    pub fn price(&self) -> Option<&Price> {
        self.items.data.first().map(|item| &item.price)
    }

    pub fn item_quantity(&self) -> Option<i64> {
        self.quantity
            .or_else(|| self.items.data.first().and_then(|item| item.quantity))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Line item of a checkout session. `quantity` is left out for metered prices.
#[derive(Debug, Clone)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub customer: Option<String>,
    pub line_item: Option<CheckoutLineItem>,
    pub description: String,
    pub subscription_metadata: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

pub fn timestamp_to_datetime(timestamp: Option<i64>) -> Option<DateTime<Utc>> {
    timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: super::http_client(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.stripe_api_base, &settings.stripe_secret_key)
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: &BTreeMap<String, String>,
    ) -> StripeResult<Customer> {
        let mut form = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        push_metadata(&mut form, "metadata", metadata);
        self.send(Method::POST, "/v1/customers", Some(form)).await
    }

    pub async fn delete_customer(&self, customer_id: &str) -> StripeResult<()> {
        let _: serde_json::Value = self
            .send(Method::DELETE, &format!("/v1/customers/{}", customer_id), None)
            .await?;
        Ok(())
    }

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_end: DateTime<Utc>,
    ) -> StripeResult<Subscription> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            ("trial_end".to_string(), trial_end.timestamp().to_string()),
        ];
        self.send(Method::POST, "/v1/subscriptions", Some(form)).await
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> StripeResult<Subscription> {
        self.send(
            Method::GET,
            &format!("/v1/subscriptions/{}", subscription_id),
            None,
        )
        .await
    }

    pub async fn cancel_subscription(&self, subscription_id: &str) -> StripeResult<Subscription> {
        self.send(
            Method::DELETE,
            &format!("/v1/subscriptions/{}", subscription_id),
            None,
        )
        .await
    }

    pub async fn list_customer_subscriptions(
        &self,
        customer_id: &str,
    ) -> StripeResult<Vec<Subscription>> {
        let mut subscriptions = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut path = format!("/v1/subscriptions?customer={}&limit=100", customer_id);
            if let Some(cursor) = &starting_after {
                path.push_str(&format!("&starting_after={}", cursor));
            }
            let page: List<Subscription> = self.send(Method::GET, &path, None).await?;
            starting_after = page.data.last().map(|sub| sub.id.clone());
            let has_more = page.has_more;
            subscriptions.extend(page.data);
            if !has_more || starting_after.is_none() {
                break;
            }
        }

        Ok(subscriptions)
    }

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> StripeResult<CheckoutSession> {
        let mut form = vec![
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("mode".to_string(), "subscription".to_string()),
            (
                "client_reference_id".to_string(),
                request.client_reference_id.clone(),
            ),
            ("allow_promotion_codes".to_string(), "true".to_string()),
            (
                "subscription_data[description]".to_string(),
                request.description.clone(),
            ),
            ("metadata[source]".to_string(), "subscriptions".to_string()),
        ];
        if let Some(item) = &request.line_item {
            form.push(("line_items[0][price]".to_string(), item.price.clone()));
            if let Some(quantity) = item.quantity {
                form.push(("line_items[0][quantity]".to_string(), quantity.to_string()));
            }
        }
        if let Some(customer) = &request.customer {
            form.push(("customer".to_string(), customer.clone()));
        }
        push_metadata(
            &mut form,
            "subscription_data[metadata]",
            &request.subscription_metadata,
        );

        self.send(Method::POST, "/v1/checkout/sessions", Some(form))
            .await
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> StripeResult<CheckoutSession> {
        self.send(
            Method::GET,
            &format!("/v1/checkout/sessions/{}", session_id),
            None,
        )
        .await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> StripeResult<PortalSession> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.send(Method::POST, "/v1/billing_portal/sessions", Some(form))
            .await
    }

    pub async fn retrieve_product(&self, product_id: &str) -> StripeResult<Product> {
        self.send(Method::GET, &format!("/v1/products/{}", product_id), None)
            .await
    }

    pub async fn retrieve_price(&self, price_id: &str) -> StripeResult<Price> {
        self.send(Method::GET, &format!("/v1/prices/{}", price_id), None)
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Option<Vec<(String, String)>>,
    ) -> StripeResult<T> {
        if !self.is_configured() {
            return Err(StripeError::NotConfigured);
        }

        let url = format!("{}{}", self.api_base, path);
        debug!("Stripe {} {}", method, path);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.secret_key);
        if let Some(form) = form {
            request = request.form(&form);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error.code,
                    envelope.error.message.unwrap_or_else(|| body.clone()),
                ),
                Err(_) => (None, body),
            };
            return Err(StripeError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| StripeError::Payload(e.to_string()))
    }
}

fn push_metadata(
    form: &mut Vec<(String, String)>,
    prefix: &str,
    metadata: &BTreeMap<String, String>,
) {
    for (key, value) in metadata {
        form.push((format!("{}[{}]", prefix, key), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn subscription_json(id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "object": "subscription",
            "customer": "cus_1",
            "status": status,
            "items": {"object": "list", "data": [{
                "id": "si_1",
                "quantity": 1,
                "price": {
                    "id": "price_1",
                    "product": "prod_1",
                    "currency": "usd",
                    "unit_amount": 1000,
                    "recurring": {"interval": "month", "usage_type": "licensed"},
                    "active": true
                }
            }], "has_more": false},
            "start_date": 1700000000,
            "current_period_start": 1700000000,
            "current_period_end": 1702592000,
            "trial_end": null,
            "cancel_at_period_end": false
        })
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses_calls() {
        let client = StripeClient::new("http://127.0.0.1:1", "");
        let err = client.retrieve_product("prod_1").await.unwrap_err();
        assert!(matches!(err, StripeError::NotConfigured));
    }

    #[tokio::test]
    async fn test_create_customer_sends_form_metadata() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/customers")
                    .header("authorization", "Bearer sk_test_123")
                    .x_www_form_urlencoded_tuple("email", "owner@example.com")
                    .x_www_form_urlencoded_tuple("metadata[team_id]", "team-1");
                then.status(200)
                    .json_body(json!({"id": "cus_1", "email": "owner@example.com"}));
            })
            .await;

        let client = StripeClient::new(server.base_url(), "sk_test_123");
        let mut metadata = BTreeMap::new();
        metadata.insert("team_id".to_string(), "team-1".to_string());
        let customer = client
            .create_customer("owner@example.com", "Team", &metadata)
            .await
            .unwrap();

        assert_eq!(customer.id, "cus_1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_carries_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/v1/subscriptions/sub_gone");
                then.status(404).json_body(json!({
                    "error": {"code": "resource_missing", "message": "No such subscription"}
                }));
            })
            .await;

        let client = StripeClient::new(server.base_url(), "sk_test_123");
        let err = client.cancel_subscription("sub_gone").await.unwrap_err();
        assert!(err.is_resource_missing());
    }

    #[tokio::test]
    async fn test_subscription_payload_parsing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/subscriptions/sub_1");
                then.status(200).json_body(subscription_json("sub_1", "active"));
            })
            .await;

        let client = StripeClient::new(server.base_url(), "sk_test_123");
        let subscription = client.retrieve_subscription("sub_1").await.unwrap();
        let price = subscription.price().unwrap();
        assert_eq!(price.product, "prod_1");
        assert_eq!(subscription.item_quantity(), Some(1));
        assert!(timestamp_to_datetime(subscription.current_period_end).is_some());
    }
}
