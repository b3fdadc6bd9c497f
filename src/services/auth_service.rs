use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::clients::Auth0Client;
use crate::database::entities::{auth_tokens, social_accounts, users};
use crate::errors::{CoreError, CoreResult};

use super::Auth0SyncService;

pub const TOKEN_KEYWORD: &str = "Token";

/// 40 hex characters, the shape of the tokens issued by the previous backend.
pub fn generate_token_key() -> String {
    let mut bytes = Uuid::new_v4().as_bytes().to_vec();
    bytes.extend_from_slice(&Uuid::new_v4().as_bytes()[..4]);
    hex::encode(bytes)
}

/// Extracts `<key>` from an `Authorization: Token <key>` header value.
pub fn parse_token_header(value: &str) -> Option<&str> {
    let mut parts = value.split_whitespace();
    let keyword = parts.next()?;
    let key = parts.next()?;
    if !keyword.eq_ignore_ascii_case(TOKEN_KEYWORD) || parts.next().is_some() {
        return None;
    }
    Some(key)
}

#[derive(Clone)]
pub struct AuthService {
    db: DatabaseConnection,
    auth0: Auth0Client,
}

impl AuthService {
    pub fn new(db: DatabaseConnection, auth0: Auth0Client) -> Self {
        Self { db, auth0 }
    }

    pub async fn user_for_token(&self, key: &str) -> CoreResult<users::Model> {
        let token = auth_tokens::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::unauthorized("Invalid token."))?;

        let user = users::Entity::find_by_id(token.user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::unauthorized("Invalid token."))?;

        if !user.is_active {
            return Err(CoreError::unauthorized("User inactive or deleted."));
        }
        Ok(user)
    }

    pub async fn get_or_create_token(&self, user_id: Uuid) -> CoreResult<auth_tokens::Model> {
        let existing = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        if let Some(token) = existing {
            return Ok(token);
        }

        let token = auth_tokens::ActiveModel {
            key: Set(generate_token_key()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };
        Ok(token.insert(&self.db).await?)
    }

    /// Exchanges an Auth0 access token for a local API token, creating the
    /// local user on first login.
    pub async fn login_with_auth0(
        &self,
        access_token: &str,
    ) -> CoreResult<(auth_tokens::Model, users::Model)> {
        let info = self.auth0.userinfo(access_token).await?;

        let account = social_accounts::Entity::find()
            .filter(social_accounts::Column::Provider.eq(social_accounts::PROVIDER_AUTH0))
            .filter(social_accounts::Column::Uid.eq(info.sub.as_str()))
            .one(&self.db)
            .await?;

        let user = match account {
            Some(account) => users::Entity::find_by_id(account.user_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| CoreError::not_found("User", account.user_id.to_string()))?,
            None => {
                let user = self.create_user_from_userinfo(&info).await?;
                let link = social_accounts::ActiveModel {
                    user_id: Set(user.id),
                    provider: Set(social_accounts::PROVIDER_AUTH0.to_string()),
                    uid: Set(info.sub.clone()),
                    email: Set(info.email.clone()),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                };
                link.insert(&self.db).await?;
                info!("Linked Auth0 account {} to user {}", info.sub, user.id);
                user
            }
        };

        if !user.is_active {
            return Err(CoreError::unauthorized("User inactive or deleted."));
        }

        let mut active: users::ActiveModel = user.into();
        active.last_login = Set(Some(Utc::now()));
        let user = active.update(&self.db).await?;

        let token = self.get_or_create_token(user.id).await?;
        Auth0SyncService::new(self.db.clone(), self.auth0.clone())
            .sync_logged(user.id)
            .await;

        Ok((token, user))
    }

    async fn create_user_from_userinfo(
        &self,
        info: &crate::clients::auth0::UserInfo,
    ) -> CoreResult<users::Model> {
        let email = info.email.clone().unwrap_or_default();
        if !email.is_empty() {
            let existing = users::Entity::find()
                .filter(users::Column::Email.eq(email.as_str()))
                .one(&self.db)
                .await?;
            if let Some(user) = existing {
                return Ok(user);
            }
        }

        let username = if email.is_empty() {
            info.nickname.clone().unwrap_or_else(|| info.sub.clone())
        } else {
            email.clone()
        };
        let username = self.unique_username(&username).await?;

        let mut user = users::ActiveModel::new(&email, &username);
        user.first_name = Set(info.given_name.clone().unwrap_or_default());
        user.last_name = Set(info.family_name.clone().unwrap_or_default());
        let user = user.insert(&self.db).await?;
        info!("Created user {} for Auth0 subject {}", user.id, info.sub);
        Ok(user)
    }

    async fn unique_username(&self, base: &str) -> CoreResult<String> {
        let mut candidate = base.to_string();
        let mut suffix = 0;
        while users::Entity::find()
            .filter(users::Column::Username.eq(candidate.as_str()))
            .one(&self.db)
            .await?
            .is_some()
        {
            suffix += 1;
            candidate = format!("{}{}", base, suffix);
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_key_shape() {
        let key = generate_token_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_token_key());
    }

    #[test]
    fn test_parse_token_header() {
        assert_eq!(parse_token_header("Token abc123"), Some("abc123"));
        assert_eq!(parse_token_header("token abc123"), Some("abc123"));
        assert_eq!(parse_token_header("Bearer abc123"), None);
        assert_eq!(parse_token_header("Token"), None);
        assert_eq!(parse_token_header("Token a b"), None);
    }
}
