use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::services::invitation_service::{InvitationInput, InvitationView};

#[derive(Debug, Default, Deserialize)]
pub struct InvitationQuery {
    pub is_accepted: Option<String>,
}

impl InvitationQuery {
    /// Only a non-empty value filters; anything but "true" means not accepted.
    fn is_accepted(&self) -> Option<bool> {
        self.is_accepted
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|value| value == "true")
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvitationRequest {
    pub email: String,
    pub role: Option<String>,
}

impl From<InvitationRequest> for InvitationInput {
    fn from(request: InvitationRequest) -> Self {
        InvitationInput {
            email: request.email,
            role: request.role,
        }
    }
}

pub async fn list_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Query(query): Query<InvitationQuery>,
) -> CoreResult<Json<Vec<InvitationView>>> {
    let service = state.invitation_service();
    let invitations = service
        .list_for_team(&user, team_id, query.is_accepted())
        .await?;

    let mut views = Vec::with_capacity(invitations.len());
    for invitation in &invitations {
        views.push(service.view(invitation).await?);
    }
    Ok(Json(views))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<InvitationRequest>,
) -> CoreResult<(StatusCode, Json<InvitationView>)> {
    let service = state.invitation_service();
    let invitation = service.create(&user, team_id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(service.view(&invitation).await?)))
}

pub async fn bulk_create_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<Vec<InvitationRequest>>,
) -> CoreResult<Json<Value>> {
    let inputs = payload.into_iter().map(InvitationInput::from).collect();
    state
        .invitation_service()
        .bulk_create(&user, team_id, inputs)
        .await?;
    Ok(Json(json!({})))
}

pub async fn get_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((team_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<Json<InvitationView>> {
    let service = state.invitation_service();
    let invitation = service.get_for_team(&user, team_id, invitation_id).await?;
    Ok(Json(service.view(&invitation).await?))
}

pub async fn delete_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((team_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<StatusCode> {
    state
        .invitation_service()
        .destroy_for_team(&user, team_id, invitation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resend_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((team_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<Json<Value>> {
    state
        .invitation_service()
        .resend(&user, team_id, invitation_id)
        .await?;
    Ok(Json(json!({})))
}

pub async fn cancel_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((team_id, invitation_id)): Path<(Uuid, Uuid)>,
) -> CoreResult<Json<InvitationView>> {
    let service = state.invitation_service();
    let invitation = service
        .cancel_for_team(&user, team_id, invitation_id)
        .await?;
    Ok(Json(service.view(&invitation).await?))
}
