use axum::{body::Bytes, extract::State, http::HeaderMap, response::Json};
use serde_json::{json, Value};

use crate::errors::CoreResult;
use crate::server::app::AppState;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> CoreResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state.webhook_service().handle(&body, signature).await?;
    Ok(Json(json!({})))
}
