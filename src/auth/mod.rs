//! Request authentication: `Authorization: Token <key>` for users and
//! `API-KEY: <prefix>.<secret>` for team API keys.

pub mod api_key;
pub mod roles;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde_json::json;

use crate::database::entities::{team_api_keys, teams, users};
use crate::errors::{CoreError, CoreErrorKind};
use crate::server::app::AppState;
use crate::services::auth_service::parse_token_header;

pub use api_key::API_KEY_HEADER;
pub use roles::Role;

/// An active user authenticated by token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub users::Model);

/// An authenticated staff user.
#[derive(Debug, Clone)]
pub struct AdminUser(pub users::Model);

/// A valid, active team API key and the team it belongs to.
#[derive(Debug, Clone)]
pub struct TeamApiKeyAuth {
    pub key: team_api_keys::Model,
    pub team: teams::Model,
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = header_str(parts, AUTHORIZATION.as_str())
            .ok_or_else(|| CoreError::unauthorized("Authentication credentials were not provided."))?;
        let key = parse_token_header(header)
            .ok_or_else(|| CoreError::unauthorized("Invalid token header."))?;

        let user = state.auth_service().user_for_token(key).await?;
        Ok(AuthUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(CoreError::forbidden(
                "You do not have permission to perform this action.",
            ));
        }
        Ok(AdminUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for TeamApiKeyAuth {
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let rejection = |err: CoreError| match err.kind() {
            CoreErrorKind::Unauthorized => err.with_body(json!({})),
            _ => err,
        };

        let presented = header_str(parts, API_KEY_HEADER)
            .ok_or_else(|| rejection(CoreError::unauthorized("Missing key")))?;
        let (key, team) = state
            .api_key_service()
            .authenticate(presented)
            .await
            .map_err(rejection)?;

        Ok(TeamApiKeyAuth { key, team })
    }
}
