use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::teams::ListQuery;
use crate::auth::AdminUser;
use crate::errors::CoreResult;
use crate::server::app::AppState;
use crate::services::user_service::AdminUserView;

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListQuery>,
) -> CoreResult<Json<Vec<AdminUserView>>> {
    Ok(Json(
        state
            .user_service()
            .admin_list(query.search.as_deref(), query.ordering.as_deref())
            .await?,
    ))
}

fn staff_changed(changed: bool, message: &str) -> Json<Value> {
    if changed {
        Json(json!({"status": "success", "detail": message}))
    } else {
        Json(json!({"status": "success"}))
    }
}

pub async fn make_staff(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> CoreResult<Json<Value>> {
    let changed = state.user_service().set_staff(user_id, true).await?;
    Ok(staff_changed(changed, "User made admin successfully"))
}

pub async fn remove_staff(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> CoreResult<Json<Value>> {
    let changed = state.user_service().set_staff(user_id, false).await?;
    Ok(staff_changed(changed, "User removed from admin successfully"))
}
