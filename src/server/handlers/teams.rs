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
use crate::services::team_service::{
    MembershipView, MembershipWithTeamView, TeamInput, TeamLimitsView, TeamView,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl From<TeamRequest> for TeamInput {
    fn from(request: TeamRequest) -> Self {
        TeamInput {
            name: request.name,
            description: request.description,
            is_private: request.is_private,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveMemberRequest {
    pub user_id: Uuid,
}

fn success() -> Json<Value> {
    Json(json!({"status": "success"}))
}

pub async fn list_teams(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> CoreResult<Json<Vec<TeamView>>> {
    let service = state.team_service();
    let teams = service
        .list_for_user(&user, query.search.as_deref(), query.ordering.as_deref())
        .await?;

    let mut views = Vec::with_capacity(teams.len());
    for team in &teams {
        views.push(service.team_view(&user, team).await?);
    }
    Ok(Json(views))
}

pub async fn create_team(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<TeamRequest>,
) -> CoreResult<(StatusCode, Json<TeamView>)> {
    let service = state.team_service();
    let team = service.create(&user, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(service.team_view(&user, &team).await?)))
}

pub async fn get_team(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<TeamView>> {
    let service = state.team_service();
    let team = service.get_for_user(&user, team_id).await?;
    Ok(Json(service.team_view(&user, &team).await?))
}

pub async fn update_team(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<TeamRequest>,
) -> CoreResult<Json<TeamView>> {
    let service = state.team_service();
    let team = service.update(&user, team_id, payload.into()).await?;
    Ok(Json(service.team_view(&user, &team).await?))
}

pub async fn delete_team(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    state.team_service().destroy(&user, team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_limits(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<TeamLimitsView>> {
    let service = state.team_service();
    let team = service.get_for_user(&user, team_id).await?;
    Ok(Json(service.limits_view(&user, &team).await?))
}

pub async fn list_memberships(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> CoreResult<Json<Vec<MembershipWithTeamView>>> {
    Ok(Json(state.team_service().memberships_for_user(&user).await?))
}

pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<Vec<MembershipView>>> {
    let service = state.team_service();
    let team = service.get_for_user(&user, team_id).await?;
    Ok(Json(service.members(team.id).await?))
}

pub async fn change_role(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<ChangeRoleRequest>,
) -> CoreResult<Json<Value>> {
    state
        .team_service()
        .change_role(&user, team_id, payload.user_id, &payload.role)
        .await?;
    Ok(success())
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<RemoveMemberRequest>,
) -> CoreResult<Json<Value>> {
    state
        .team_service()
        .remove_member(&user, team_id, payload.user_id)
        .await?;
    Ok(success())
}

pub async fn leave_team(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<Value>> {
    state.team_service().leave_team(&user, team_id).await?;
    Ok(success())
}
