use axum::{extract::State, response::Json, Router};
use serde_json::Value;

use crate::auth::AdminUser;
use crate::errors::CoreResult;
use crate::openapi::{self, load_schema};
use crate::server::app::AppState;

pub const SWAGGER_UI_PATH: &str = "/vulmatch_api/api/schema/swagger-ui";
pub const PUBLIC_SCHEMA_URL: &str = "/vulmatch_api/api/schema/schema-json";
pub const ADMIN_SWAGGER_UI_PATH: &str = "/vulmatch_api/admin/schema/swagger-ui";
pub const ADMIN_SCHEMA_URL: &str = "/vulmatch_api/admin/schema/schema-json";

pub async fn public_schema(State(state): State<AppState>) -> CoreResult<Json<Value>> {
    let stored = load_schema(&state.settings.public_schema_path())?;
    Ok(Json(openapi::public_document(&stored)))
}

pub async fn admin_schema(
    State(state): State<AppState>,
    AdminUser(_user): AdminUser,
) -> CoreResult<Json<Value>> {
    let stored = load_schema(&state.settings.admin_schema_path())?;
    Ok(Json(openapi::admin_document(&stored)?))
}

/// Swagger UI for both documents; the admin one is staff only.
#[cfg(feature = "swagger-ui")]
pub fn swagger_ui(state: AppState) -> Router<AppState> {
    use axum::middleware;
    use utoipa_swagger_ui::{Config, SwaggerUi};

    let admin = Router::new()
        .merge(SwaggerUi::new(ADMIN_SWAGGER_UI_PATH).config(Config::from(ADMIN_SCHEMA_URL)))
        .route_layer(middleware::from_fn_with_state(state, require_staff));

    Router::new()
        .merge(SwaggerUi::new(SWAGGER_UI_PATH).config(Config::from(PUBLIC_SCHEMA_URL)))
        .merge(admin)
}

#[cfg(feature = "swagger-ui")]
async fn require_staff(
    AdminUser(_user): AdminUser,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    next.run(request).await
}

#[cfg(not(feature = "swagger-ui"))]
pub fn swagger_ui(_state: AppState) -> Router<AppState> {
    Router::new()
}
