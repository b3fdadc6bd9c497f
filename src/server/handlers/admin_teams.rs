use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use super::teams::{ListQuery, TeamRequest};
use crate::auth::AdminUser;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::services::team_service::AdminTeamView;

pub async fn list_teams(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Query(query): Query<ListQuery>,
) -> CoreResult<Json<Vec<AdminTeamView>>> {
    let service = state.team_service();
    let teams = service
        .admin_list(query.search.as_deref(), query.ordering.as_deref())
        .await?;

    let mut views = Vec::with_capacity(teams.len());
    for team in &teams {
        views.push(service.admin_view(&user, team).await?);
    }
    Ok(Json(views))
}

pub async fn get_team(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<Json<AdminTeamView>> {
    let service = state.team_service();
    let team = service.get(team_id).await?;
    Ok(Json(service.admin_view(&user, &team).await?))
}

pub async fn update_team(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(team_id): Path<Uuid>,
    Json(payload): Json<TeamRequest>,
) -> CoreResult<Json<AdminTeamView>> {
    let service = state.team_service();
    let team = service.get(team_id).await?;
    let team = service.apply_update(team, payload.into()).await?;
    Ok(Json(service.admin_view(&user, &team).await?))
}

pub async fn delete_team(
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
    Path(team_id): Path<Uuid>,
) -> CoreResult<StatusCode> {
    let service = state.team_service();
    let team = service.get(team_id).await?;
    service.delete_team(team).await?;
    Ok(StatusCode::NO_CONTENT)
}
