use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::database::entities::users;
use crate::errors::CoreResult;
use crate::server::app::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Auth0LoginRequest {
    pub access_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<users::Model> for UserView {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub key: String,
    pub user: UserView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenView {
    pub token: String,
}

pub async fn auth0_login(
    State(state): State<AppState>,
    Json(payload): Json<Auth0LoginRequest>,
) -> CoreResult<Json<LoginResponse>> {
    let (token, user) = state
        .auth_service()
        .login_with_auth0(&payload.access_token)
        .await?;
    Ok(Json(LoginResponse {
        key: token.key,
        user: user.into(),
    }))
}

pub async fn current_user(AuthUser(user): AuthUser) -> Json<UserView> {
    Json(user.into())
}

#[utoipa::path(
    post,
    path = "/users/admin/token",
    operation_id = "users_admin_token_create",
    tag = "User",
    responses(
        (status = 201, description = "Token of the calling admin", body = TokenView),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not staff")
    ),
    security(("api_key" = []))
)]
pub async fn admin_token(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
) -> CoreResult<(StatusCode, Json<TokenView>)> {
    let token = state.auth_service().get_or_create_token(user.id).await?;
    Ok((StatusCode::CREATED, Json(TokenView { token: token.key })))
}
