//! Stripe webhook verification and dispatch.

use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::stripe;
use crate::clients::StripeClient;
use crate::config::Settings;
use crate::database::entities::teams;
use crate::errors::{CoreError, CoreResult};

use super::{BillingSyncService, SubscriptionService};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing Stripe-Signature header")]
    Missing,

    #[error("Malformed Stripe-Signature header")]
    Malformed,

    #[error("Timestamp outside the tolerance zone")]
    Expired,

    #[error("No signature matches the payload")]
    Mismatch,
}

impl From<SignatureError> for CoreError {
    fn from(err: SignatureError) -> Self {
        warn!("Rejected Stripe webhook: {}", err);
        CoreError::validation(err.to_string())
    }
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex `v1` signature Stripe would send for `payload` at `timestamp`.
pub fn compute_signature(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, SignatureError> {
    let mac = signed_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a `t=...,v1=...` header against the payload. Any `v1` entry may
/// match; `now` is a unix timestamp.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    let age = now.checked_sub(timestamp).and_then(i64::checked_abs);
    if age.map_or(true, |age| age > SIGNATURE_TOLERANCE_SECS) {
        return Err(SignatureError::Expired);
    }

    let mac = signed_mac(secret, timestamp, payload)?;
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .ok()
            .is_some_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl Event {
    fn object<T: serde::de::DeserializeOwned>(&self) -> CoreResult<T> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            warn!("Unreadable {} payload in event {}: {}", self.event_type, self.id, e);
            CoreError::validation(format!("Invalid {} payload", self.event_type))
        })
    }
}

#[derive(Clone)]
pub struct WebhookService {
    db: DatabaseConnection,
    stripe: StripeClient,
    settings: Arc<Settings>,
}

impl WebhookService {
    pub fn new(db: DatabaseConnection, stripe: StripeClient, settings: Arc<Settings>) -> Self {
        Self {
            db,
            stripe,
            settings,
        }
    }

    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> CoreResult<()> {
        let secret = &self.settings.stripe_webhook_secret;
        if secret.is_empty() {
            return Err(CoreError::unavailable("Stripe webhooks are not configured"));
        }
        let header = signature.ok_or(SignatureError::Missing)?;
        verify_signature(payload, header, secret, Utc::now().timestamp())?;

        let event: Event = serde_json::from_slice(payload)
            .map_err(|_| CoreError::validation("Invalid event payload"))?;
        self.dispatch(&event).await
    }

    pub async fn dispatch(&self, event: &Event) -> CoreResult<()> {
        info!("Stripe event {} ({})", event.id, event.event_type);
        let billing = BillingSyncService::new(self.db.clone(), self.stripe.clone());

        match event.event_type.as_str() {
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted" => {
                let subscription: stripe::Subscription = event.object()?;
                billing.sync_subscription(&subscription).await?;
            }
            "product.created" | "product.updated" => {
                let product: stripe::Product = event.object()?;
                billing.sync_product(&product).await?;
            }
            "product.deleted" => {
                let product: stripe::Product = event.object()?;
                billing.deactivate_product(&product.id).await?;
            }
            "price.created" | "price.updated" | "price.deleted" => {
                let price: stripe::Price = event.object()?;
                billing.sync_price(&price).await?;
            }
            "checkout.session.completed" => {
                let session: stripe::CheckoutSession = event.object()?;
                self.checkout_completed(&session).await?;
            }
            other => debug!("Ignoring Stripe event type {}", other),
        }
        Ok(())
    }

    async fn checkout_completed(&self, session: &stripe::CheckoutSession) -> CoreResult<()> {
        let (Some(reference), Some(subscription_id)) =
            (&session.client_reference_id, &session.subscription)
        else {
            debug!("Checkout session {} has no team subscription", session.id);
            return Ok(());
        };
        let Ok(team_id) = Uuid::parse_str(reference) else {
            warn!("Checkout session {} references unknown team {}", session.id, reference);
            return Ok(());
        };
        let Some(team) = teams::Entity::find_by_id(team_id).one(&self.db).await? else {
            warn!("Checkout session {} references missing team {}", session.id, team_id);
            return Ok(());
        };
        if team.subscription_id.as_deref() == Some(subscription_id.as_str()) {
            return Ok(());
        }

        SubscriptionService::new(self.db.clone(), self.stripe.clone(), self.settings.clone())
            .provision_subscription(&team, subscription_id)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let signature = compute_signature(SECRET, 1_700_000_000, payload).unwrap();
        let header = format!("t=1700000000,v1={}", signature);
        assert_eq!(verify_signature(payload, &header, SECRET, 1_700_000_100), Ok(()));
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let payload = b"{}";
        let signature = compute_signature(SECRET, 10, payload).unwrap();
        let header = format!("t=10,v1=deadbeef,v1={}", signature);
        assert_eq!(verify_signature(payload, &header, SECRET, 10), Ok(()));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let signature = compute_signature(SECRET, 10, b"{\"a\":1}").unwrap();
        let header = format!("t=10,v1={}", signature);
        assert_eq!(
            verify_signature(b"{\"a\":2}", &header, SECRET, 10),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let signature = compute_signature(SECRET, 10, b"{}").unwrap();
        let header = format!("t=10,v1={}", signature);
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, 10 + SIGNATURE_TOLERANCE_SECS + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        let now = 1_700_000_000;
        assert_eq!(
            verify_signature(b"{}", "t=-9223372036854775808,v1=00", SECRET, now),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(b"{}", "t=9223372036854775807,v1=00", SECRET, -now),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(verify_signature(b"{}", "v1=abc", SECRET, 0), Err(SignatureError::Malformed));
        assert_eq!(verify_signature(b"{}", "t=0", SECRET, 0), Err(SignatureError::Malformed));
        assert_eq!(verify_signature(b"{}", "garbage", SECRET, 0), Err(SignatureError::Malformed));
    }

    #[test]
    fn test_event_deserialization() {
        let event: Event = serde_json::from_str(
            r#"{"id":"evt_1","type":"product.deleted","data":{"object":{"id":"prod_1"}}}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, "product.deleted");
        assert_eq!(event.data.object["id"], "prod_1");
    }
}
