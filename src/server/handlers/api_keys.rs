use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::entities::{team_api_keys, teams};
use crate::errors::CoreResult;
use crate::server::app::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateKeyRequest {
    pub name: String,
}

/// A key as listed to its owner. Neither the hash nor the clear key is
/// ever part of it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiKeyView {
    pub id: i32,
    pub name: String,
    pub team_name: String,
    pub key_id: Uuid,
    pub last_used: Option<DateTime<Utc>>,
    pub status: String,
}

impl ApiKeyView {
    fn new(key: team_api_keys::Model, team: Option<&teams::Model>) -> Self {
        Self {
            id: key.id,
            name: key.name,
            team_name: team.map(|team| team.name.clone()).unwrap_or_default(),
            key_id: key.key_id,
            last_used: key.last_used,
            status: key.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedKeyView {
    pub api_key: ApiKeyView,
    /// Shown once; only its hash is stored.
    pub key: String,
}

pub async fn list_team_keys(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<Vec<ApiKeyView>>> {
    let service = state.api_key_service();
    let team = service.accessible_team(&user, team_id).await?;
    let keys = service.list_for_team(team.id).await?;
    Ok(Json(
        keys.into_iter()
            .map(|key| ApiKeyView::new(key, Some(&team)))
            .collect(),
    ))
}

pub async fn create_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<CreateKeyRequest>,
) -> CoreResult<(StatusCode, Json<CreatedKeyView>)> {
    let service = state.api_key_service();
    let team = service.accessible_team(&user, team_id).await?;
    let (key, clear_key) = service.create(&team, &user, &payload.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedKeyView {
            api_key: ApiKeyView::new(key, Some(&team)),
            key: clear_key,
        }),
    ))
}

pub async fn get_team_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((team_id, key_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<Json<ApiKeyView>> {
    let service = state.api_key_service();
    let team = service.accessible_team(&user, team_id).await?;
    let key = service.get_for_team(team.id, key_id).await?;
    Ok(Json(ApiKeyView::new(key, Some(&team))))
}

pub async fn delete_team_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((team_id, key_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<StatusCode> {
    let service = state.api_key_service();
    let team = service.accessible_team(&user, team_id).await?;
    let key = service.get_for_team(team.id, key_id).await?;
    service.delete(key).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_user_keys(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Vec<ApiKeyView>>> {
    let keys = state.api_key_service().list_for_user(user.id).await?;
    Ok(Json(
        keys.into_iter()
            .map(|(key, team)| ApiKeyView::new(key, team.as_ref()))
            .collect(),
    ))
}

pub async fn get_user_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(key_id): Path<Uuid>,
) -> CoreResult<Json<ApiKeyView>> {
    let (key, team) = state.api_key_service().get_for_user(user.id, key_id).await?;
    Ok(Json(ApiKeyView::new(key, team.as_ref())))
}

pub async fn delete_user_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(key_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    let service = state.api_key_service();
    let (key, _) = service.get_for_user(user.id, key_id).await?;
    service.delete(key).await?;
    Ok(StatusCode::NO_CONTENT)
}
