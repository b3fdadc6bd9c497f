use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use super::teams::TeamRequest;
use crate::auth::AuthUser;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::services::invitation_service::{CompleteRegistration, InvitationWithTeamView};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteRegistrationRequest {
    pub team: Option<TeamRequest>,
    #[serde(default)]
    pub accepted_invitations: Vec<Uuid>,
    #[serde(default)]
    pub rejected_invitations: Vec<Uuid>,
}

pub async fn list_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Vec<InvitationWithTeamView>>> {
    let service = state.invitation_service();
    let invitations = service.list_for_user(&user).await?;

    let mut views = Vec::with_capacity(invitations.len());
    for invitation in &invitations {
        views.push(service.view_with_team(&user, invitation).await?);
    }
    Ok(Json(views))
}

pub async fn get_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invitation_id): Path<Uuid>,
) -> CoreResult<Json<InvitationWithTeamView>> {
    let service = state.invitation_service();
    let invitation = service.get_for_user(&user, invitation_id).await?;
    Ok(Json(service.view_with_team(&user, &invitation).await?))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invitation_id): Path<Uuid>,
) -> CoreResult<Json<Value>> {
    state.invitation_service().accept(&user, invitation_id).await?;
    Ok(Json(json!({})))
}

pub async fn decline_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invitation_id): Path<Uuid>,
) -> CoreResult<Json<Value>> {
    state.invitation_service().decline(&user, invitation_id).await?;
    Ok(Json(json!({})))
}

pub async fn complete_registration(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CompleteRegistrationRequest>,
) -> CoreResult<(StatusCode, Json<Value>)> {
    let request = CompleteRegistration {
        team: payload.team.map(Into::into),
        accepted_invitations: payload.accepted_invitations,
        rejected_invitations: payload.rejected_invitations,
    };
    let team = state
        .invitation_service()
        .complete_registration(&user, request)
        .await?;

    let body = match team {
        Some(team) => json!({"team_id": team.id}),
        None => json!({}),
    };
    Ok((StatusCode::CREATED, Json(body)))
}
