use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::errors::{CoreError, CoreResult};
use crate::server::app::AppState;
use crate::services::subscription_service::{ProductView, SubscriptionView};

const MODIFY_SUBSCRIPTION_DENIED: &str = "User has no permission to modify subscription";

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitSubscriptionRequest {
    pub price_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmSubscriptionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RedirectView {
    pub redirect_url: String,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<InitSubscriptionRequest>,
) -> CoreResult<(StatusCode, Json<RedirectView>)> {
    let teams = state.team_service();
    let team = teams.get_accessible(&user, team_id).await?;
    if !teams.is_admin(team.id, user.id).await? {
        return Err(CoreError::forbidden(MODIFY_SUBSCRIPTION_DENIED));
    }

    let redirect_url = state
        .subscription_service()
        .create_checkout_session(&team, &user, &payload.price_id)
        .await?;
    Ok((StatusCode::CREATED, Json(RedirectView { redirect_url })))
}

pub async fn active_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<Option<SubscriptionView>>> {
    let team = state.team_service().get_accessible(&user, team_id).await?;
    Ok(Json(
        state
            .subscription_service()
            .active_subscription_view(&team)
            .await?,
    ))
}

pub async fn confirm_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(_team_id): Path<Uuid>,
    Json(payload): Json<ConfirmSubscriptionRequest>,
) -> CoreResult<Json<Value>> {
    state
        .subscription_service()
        .confirm_subscription(&user, &payload.session_id)
        .await?;
    Ok(Json(json!({"status": true})))
}

pub async fn create_portal_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<(StatusCode, Json<RedirectView>)> {
    let team = state.team_service().get_accessible(&user, team_id).await?;
    let redirect_url = state
        .subscription_service()
        .create_portal_session(&team)
        .await?;
    Ok((StatusCode::CREATED, Json(RedirectView { redirect_url })))
}

pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
) -> CoreResult<Json<Vec<ProductView>>> {
    Ok(Json(state.subscription_service().active_products().await?))
}

pub async fn get_config(
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
) -> CoreResult<Json<BTreeMap<String, String>>> {
    Ok(Json(state.subscription_service().config().await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
    Json(payload): Json<BTreeMap<String, String>>,
) -> CoreResult<Json<BTreeMap<String, String>>> {
    Ok(Json(
        state.subscription_service().update_config(payload).await?,
    ))
}
