use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use crate::clients::Auth0Client;
use crate::database::entities::{memberships, social_accounts, users};
use crate::errors::{CoreError, CoreResult};

/// Pushes the local view of a user (id, staff flag, teams) into the Auth0
/// `app_metadata.vulmatch` block.
#[derive(Clone)]
pub struct Auth0SyncService {
    db: DatabaseConnection,
    auth0: Auth0Client,
}

impl Auth0SyncService {
    pub fn new(db: DatabaseConnection, auth0: Auth0Client) -> Self {
        Self { db, auth0 }
    }

    pub async fn auth0_account(&self, user_id: Uuid) -> CoreResult<Option<social_accounts::Model>> {
        Ok(social_accounts::Entity::find()
            .filter(social_accounts::Column::UserId.eq(user_id))
            .filter(social_accounts::Column::Provider.eq(social_accounts::PROVIDER_AUTH0))
            .order_by_asc(social_accounts::Column::Id)
            .one(&self.db)
            .await?)
    }

    /// Auth0 id of the user, or a 400 when the account was never linked.
    pub async fn require_auth0_uid(&self, user_id: Uuid) -> CoreResult<String> {
        self.auth0_account(user_id)
            .await?
            .map(|account| account.uid)
            .ok_or_else(|| CoreError::validation("No Auth0 account is linked to this user"))
    }

    pub async fn metadata_payload(&self, user: &users::Model, is_staff: bool) -> CoreResult<Value> {
        let team_ids: Vec<String> = memberships::Entity::find()
            .filter(memberships::Column::UserId.eq(user.id))
            .order_by_asc(memberships::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|membership| membership.team_id.to_string())
            .collect();

        Ok(json!({
            "app_metadata": {
                "vulmatch": {
                    "user_id": user.id.to_string(),
                    "is_staff": is_staff,
                    "team_ids": team_ids,
                }
            }
        }))
    }

    /// Returns `false` when the user has no Auth0 link and nothing was sent.
    pub async fn sync_user_metadata(&self, user_id: Uuid) -> CoreResult<bool> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("User", user_id.to_string()))?;
        self.sync_with_staff_flag(&user, user.is_staff).await
    }

    /// Like [`Self::sync_user_metadata`] but announces `is_staff` before it is
    /// stored locally.
    pub async fn sync_with_staff_flag(&self, user: &users::Model, is_staff: bool) -> CoreResult<bool> {
        let Some(account) = self.auth0_account(user.id).await? else {
            debug!("User {} has no Auth0 account, skipping metadata sync", user.id);
            return Ok(false);
        };

        let payload = self.metadata_payload(user, is_staff).await?;
        self.auth0.update_user(&account.uid, &payload).await?;
        Ok(true)
    }

    /// Fire-and-forget variant used after membership changes.
    pub async fn sync_logged(&self, user_id: Uuid) {
        if let Err(e) = self.sync_user_metadata(user_id).await {
            error!("Auth0 metadata sync failed for user {}: {}", user_id, e);
        }
    }
}
