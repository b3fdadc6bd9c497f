use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::api_key::{generate_key, key_prefix, verify_key};
use crate::database::entities::{memberships, team_api_keys, teams, users};
use crate::errors::{CoreError, CoreResult};

use super::team_service::NO_PERMISSION_MESSAGE;
use super::EntitlementService;

pub const INVALID_KEY_MESSAGE: &str = "Invalid key";
pub const UPGRADE_MESSAGE: &str = "Upgrade your subscription to be able to access the API";

#[derive(Clone)]
pub struct ApiKeyService {
    db: DatabaseConnection,
}

impl ApiKeyService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Team whose keys `user` may manage. The subscription must grant API
    /// access before membership is even looked at.
    pub async fn accessible_team(&self, user: &users::Model, team_id: Uuid) -> CoreResult<teams::Model> {
        let team = teams::Entity::find_by_id(team_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("team", team_id.to_string()))?;

        let entitlements = EntitlementService::new(self.db.clone()).for_team(&team).await?;
        if !entitlements.allowed_api_access {
            return Err(CoreError::validation(UPGRADE_MESSAGE));
        }

        let is_member = memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team.id))
            .filter(memberships::Column::UserId.eq(user.id))
            .count(&self.db)
            .await?
            > 0;
        if user.is_staff || is_member {
            Ok(team)
        } else {
            Err(CoreError::forbidden(NO_PERMISSION_MESSAGE))
        }
    }

    /// Creates a key for `user` on `team`. The clear key is only ever
    /// returned from here.
    pub async fn create(
        &self,
        team: &teams::Model,
        user: &users::Model,
        name: &str,
    ) -> CoreResult<(team_api_keys::Model, String)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::field("name", "This field may not be blank."));
        }

        let membership = memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team.id))
            .filter(memberships::Column::UserId.eq(user.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::forbidden("Only team members can create API keys"))?;

        let generated = generate_key();
        let key = team_api_keys::ActiveModel {
            key_id: Set(Uuid::new_v4()),
            prefix: Set(generated.prefix.clone()),
            hashed_key: Set(generated.hashed_key.clone()),
            name: Set(name.to_string()),
            revoked: Set(false),
            expiry_date: Set(None),
            status: Set(team_api_keys::STATUS_ACTIVE.to_string()),
            last_used: Set(None),
            user_id: Set(user.id),
            team_id: Set(team.id),
            membership_id: Set(membership.id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let key = key.insert(&self.db).await?;
        info!("Created API key {} for team {}", key.key_id, team.id);

        Ok((key, generated.clear_key))
    }

    pub async fn list_for_team(&self, team_id: Uuid) -> CoreResult<Vec<team_api_keys::Model>> {
        Ok(team_api_keys::Entity::find()
            .filter(team_api_keys::Column::TeamId.eq(team_id))
            .order_by_desc(team_api_keys::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn count_for_team(&self, team_id: Uuid) -> CoreResult<u64> {
        Ok(team_api_keys::Entity::find()
            .filter(team_api_keys::Column::TeamId.eq(team_id))
            .count(&self.db)
            .await?)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> CoreResult<Vec<(team_api_keys::Model, Option<teams::Model>)>> {
        Ok(team_api_keys::Entity::find()
            .filter(team_api_keys::Column::UserId.eq(user_id))
            .order_by_desc(team_api_keys::Column::CreatedAt)
            .find_also_related(teams::Entity)
            .all(&self.db)
            .await?)
    }

    pub async fn get_for_team(&self, team_id: Uuid, key_id: Uuid) -> CoreResult<team_api_keys::Model> {
        team_api_keys::Entity::find()
            .filter(team_api_keys::Column::TeamId.eq(team_id))
            .filter(team_api_keys::Column::KeyId.eq(key_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("TeamApiKey", key_id.to_string()))
    }

    pub async fn get_for_user(
        &self,
        user_id: Uuid,
        key_id: Uuid,
    ) -> CoreResult<(team_api_keys::Model, Option<teams::Model>)> {
        team_api_keys::Entity::find()
            .filter(team_api_keys::Column::UserId.eq(user_id))
            .filter(team_api_keys::Column::KeyId.eq(key_id))
            .find_also_related(teams::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("TeamApiKey", key_id.to_string()))
    }

    pub async fn delete(&self, key: team_api_keys::Model) -> CoreResult<()> {
        let key_id = key.key_id;
        key.delete(&self.db).await?;
        info!("Deleted API key {}", key_id);
        Ok(())
    }

    /// Resolves a presented `API-KEY` value to its key and team. Every failure
    /// is reported as an unauthorized "Invalid key".
    pub async fn authenticate(
        &self,
        presented: &str,
    ) -> CoreResult<(team_api_keys::Model, teams::Model)> {
        let invalid = || CoreError::unauthorized(INVALID_KEY_MESSAGE);

        let prefix = key_prefix(presented).ok_or_else(invalid)?;
        let key = team_api_keys::Entity::find()
            .filter(team_api_keys::Column::Prefix.eq(prefix))
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        if !verify_key(presented, &key.hashed_key) {
            debug!("API key {} presented with a wrong secret", key.key_id);
            return Err(invalid());
        }
        if key.revoked || key.is_expired() {
            return Err(invalid());
        }
        if !key.is_active() {
            debug!("API key {} is {}", key.key_id, key.status);
            return Err(invalid());
        }

        let team = teams::Entity::find_by_id(key.team_id)
            .one(&self.db)
            .await?
            .ok_or_else(invalid)?;

        let mut active: team_api_keys::ActiveModel = key.into();
        active.last_used = Set(Some(Utc::now()));
        let key = active.update(&self.db).await?;

        Ok((key, team))
    }

    /// Blocks every key of the teams attached to `subscription_id`.
    pub async fn block_for_subscription(&self, subscription_id: &str) -> CoreResult<u64> {
        self.block_for_subscriptions(&[subscription_id.to_string()])
            .await
    }

    pub async fn block_for_subscriptions(&self, subscription_ids: &[String]) -> CoreResult<u64> {
        if subscription_ids.is_empty() {
            return Ok(0);
        }

        let team_ids: Vec<Uuid> = teams::Entity::find()
            .filter(teams::Column::SubscriptionId.is_in(subscription_ids.iter().cloned()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|team| team.id)
            .collect();
        if team_ids.is_empty() {
            return Ok(0);
        }

        let result = team_api_keys::Entity::update_many()
            .col_expr(
                team_api_keys::Column::Status,
                Expr::value(team_api_keys::STATUS_BLOCKED),
            )
            .filter(team_api_keys::Column::TeamId.is_in(team_ids))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
