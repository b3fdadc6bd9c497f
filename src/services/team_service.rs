//! Teams, memberships and the team-level read models.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, Order};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Select, Set,
};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::roles::{stored_role, Role};
use crate::clients::{Auth0Client, StripeClient};
use crate::config::Settings;
use crate::database::entities::{invitations, memberships, team_api_keys, teams, users};
use crate::errors::{CoreError, CoreResult};

use super::slug::next_unique_team_slug;
use super::subscription_service::SubscriptionView;
use super::{Auth0SyncService, EntitlementService, SubscriptionService};

pub const NO_PERMISSION_MESSAGE: &str = "User has no permission to perform this action";

#[derive(Debug, Clone, Default)]
pub struct TeamInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

/// Membership row with the member's user fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MembershipView {
    pub id: i32,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub role: String,
    pub email: String,
}

impl MembershipView {
    pub fn new(membership: &memberships::Model, user: &users::Model) -> Self {
        Self {
            id: membership.id,
            user_id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            display_name: user.display_name(),
            role: membership.role.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamSummaryView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_admin: bool,
    pub is_owner: bool,
    pub is_private: bool,
    pub owner_id: Option<Uuid>,
    pub has_active_subscription: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MembershipWithTeamView {
    pub id: i32,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub role: String,
    pub team: TeamSummaryView,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamView {
    #[serde(flatten)]
    pub team: TeamSummaryView,
    pub subscription: Option<SubscriptionView>,
    pub allowed_api_access: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamLimitsView {
    #[serde(flatten)]
    pub team: TeamSummaryView,
    pub members_count: u64,
    pub invitations_count: u64,
    pub user_limit: i64,
    pub api_keys_count: u64,
    pub allowed_api_access: bool,
    pub limits_exceeded: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminTeamView {
    #[serde(flatten)]
    pub limits: TeamLimitsView,
    pub user_emails: Vec<String>,
    pub subscription: Option<SubscriptionView>,
}

/// Counts behind the user limit of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamCounts {
    pub members: u64,
    pub pending_invitations: u64,
}

pub fn limits_exceeded(user_limit: i64, counts: TeamCounts) -> bool {
    user_limit < (counts.members + counts.pending_invitations) as i64
}

#[derive(Clone)]
pub struct TeamService {
    db: DatabaseConnection,
    stripe: StripeClient,
    auth0: Auth0Client,
    settings: Arc<Settings>,
}

impl TeamService {
    pub fn new(
        db: DatabaseConnection,
        stripe: StripeClient,
        auth0: Auth0Client,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            db,
            stripe,
            auth0,
            settings,
        }
    }

    fn auth0_sync(&self) -> Auth0SyncService {
        Auth0SyncService::new(self.db.clone(), self.auth0.clone())
    }

    fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.db.clone(), self.stripe.clone(), self.settings.clone())
    }

    pub async fn get(&self, team_id: Uuid) -> CoreResult<teams::Model> {
        teams::Entity::find_by_id(team_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("team", team_id.to_string()))
    }

    pub async fn membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<memberships::Model>> {
        Ok(memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team_id))
            .filter(memberships::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?)
    }

    pub async fn role(&self, team_id: Uuid, user_id: Uuid) -> CoreResult<Option<Role>> {
        Ok(self
            .membership(team_id, user_id)
            .await?
            .map(|membership| stored_role(&membership.role)))
    }

    pub async fn is_member(&self, team_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        Ok(self.membership(team_id, user_id).await?.is_some())
    }

    pub async fn is_admin(&self, team_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        Ok(self
            .role(team_id, user_id)
            .await?
            .is_some_and(|role| role.is_admin()))
    }

    pub async fn is_owner(&self, team_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        Ok(self
            .role(team_id, user_id)
            .await?
            .is_some_and(|role| role.is_owner()))
    }

    /// Team visible to `user`: any team for staff, otherwise only teams the
    /// user belongs to. Others are reported as missing.
    pub async fn get_for_user(&self, user: &users::Model, team_id: Uuid) -> CoreResult<teams::Model> {
        let team = self.get(team_id).await?;
        if user.is_staff || self.is_member(team_id, user.id).await? {
            Ok(team)
        } else {
            Err(CoreError::not_found("team", team_id.to_string()))
        }
    }

    /// Team for a nested resource: 404 when missing, 403 for outsiders.
    pub async fn get_accessible(&self, user: &users::Model, team_id: Uuid) -> CoreResult<teams::Model> {
        let team = self.get(team_id).await?;
        if user.is_staff || self.is_member(team_id, user.id).await? {
            Ok(team)
        } else {
            Err(CoreError::forbidden(NO_PERMISSION_MESSAGE))
        }
    }

    pub async fn list_for_user(
        &self,
        user: &users::Model,
        search: Option<&str>,
        ordering: Option<&str>,
    ) -> CoreResult<Vec<teams::Model>> {
        let query = teams::Entity::find()
            .inner_join(memberships::Entity)
            .filter(memberships::Column::UserId.eq(user.id));
        Ok(apply_ordering(apply_search(query, search), ordering)
            .all(&self.db)
            .await?)
    }

    pub async fn create(&self, user: &users::Model, input: TeamInput) -> CoreResult<teams::Model> {
        let team = self.insert_team(user, input, Role::Owner).await?;
        info!("Team {} created by {}", team.id, user.id);

        self.auth0_sync().sync_logged(user.id).await;
        match self
            .subscriptions()
            .subscribe_team_to_initial_subscription(&team, user)
            .await
        {
            Ok(team) => Ok(team),
            Err(e) => {
                error!("Initial subscription failed for team {}: {}", team.id, e);
                Ok(team)
            }
        }
    }

    /// Inserts the team row and the creator's membership.
    pub(crate) async fn insert_team(
        &self,
        user: &users::Model,
        input: TeamInput,
        creator_role: Role,
    ) -> CoreResult<teams::Model> {
        let name = input.name.unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(CoreError::field("name", "This field may not be blank."));
        }

        let now = Utc::now();
        let slug = next_unique_team_slug(&self.db, &name).await?;
        let team = teams::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            slug: Set(Some(slug)),
            description: Set(input.description),
            owner_id: Set(Some(user.id)),
            is_private: Set(input.is_private.unwrap_or(false)),
            customer_id: Set(None),
            subscription_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        memberships::ActiveModel {
            team_id: Set(team.id),
            user_id: Set(user.id),
            role: Set(creator_role.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(team)
    }

    pub async fn update(
        &self,
        user: &users::Model,
        team_id: Uuid,
        input: TeamInput,
    ) -> CoreResult<teams::Model> {
        let team = self.get_for_user(user, team_id).await?;
        if !self.is_admin(team.id, user.id).await? {
            return Err(CoreError::forbidden(NO_PERMISSION_MESSAGE));
        }
        self.apply_update(team, input).await
    }

    pub async fn apply_update(&self, team: teams::Model, input: TeamInput) -> CoreResult<teams::Model> {
        let mut active = team.into_active_model();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CoreError::field("name", "This field may not be blank."));
            }
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(is_private) = input.is_private {
            active.is_private = Set(is_private);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Owner-only delete. The Stripe customer and its subscriptions are closed
    /// before the team row goes.
    pub async fn destroy(&self, user: &users::Model, team_id: Uuid) -> CoreResult<()> {
        let team = self.get_for_user(user, team_id).await?;
        if !self.is_owner(team.id, user.id).await? {
            return Err(CoreError::forbidden("Only owners can delete a team"));
        }
        if let Some(customer_id) = &team.customer_id {
            if self.stripe.is_configured() {
                self.subscriptions()
                    .close_customer_and_subscriptions(customer_id)
                    .await?;
            }
        }
        self.delete_team(team).await
    }

    /// Deletes the team and refreshes the Auth0 metadata of its former members.
    pub async fn delete_team(&self, team: teams::Model) -> CoreResult<()> {
        let member_ids: Vec<Uuid> = team
            .find_related(memberships::Entity)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|membership| membership.user_id)
            .collect();

        let team_id = team.id;
        team.delete(&self.db).await?;
        info!("Team {} deleted", team_id);

        let sync = self.auth0_sync();
        for user_id in member_ids {
            sync.sync_logged(user_id).await;
        }
        Ok(())
    }

    pub async fn counts(&self, team_id: Uuid) -> CoreResult<TeamCounts> {
        let members = memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team_id))
            .count(&self.db)
            .await?;
        let pending_invitations = invitations::Entity::find()
            .filter(invitations::Column::TeamId.eq(team_id))
            .filter(invitations::Column::IsAccepted.eq(false))
            .filter(invitations::Column::IsCancelled.eq(false))
            .count(&self.db)
            .await?;
        Ok(TeamCounts {
            members,
            pending_invitations,
        })
    }

    pub async fn summary_view(&self, user: &users::Model, team: &teams::Model) -> CoreResult<TeamSummaryView> {
        let role = self.role(team.id, user.id).await?;
        let entitlements = EntitlementService::new(self.db.clone()).for_team(team).await?;
        Ok(TeamSummaryView {
            id: team.id,
            name: team.name.clone(),
            description: team.description.clone(),
            is_admin: role.is_some_and(|role| role.is_admin()),
            is_owner: role.is_some_and(|role| role.is_owner()),
            is_private: team.is_private,
            owner_id: team.owner_id,
            has_active_subscription: entitlements.has_active_subscription,
        })
    }

    pub async fn team_view(&self, user: &users::Model, team: &teams::Model) -> CoreResult<TeamView> {
        let entitlements = EntitlementService::new(self.db.clone()).for_team(team).await?;
        let subscription = match &entitlements.subscription {
            Some(subscription) => Some(self.subscriptions().subscription_view(subscription).await?),
            None => None,
        };
        Ok(TeamView {
            team: self.summary_view(user, team).await?,
            subscription,
            allowed_api_access: entitlements.allowed_api_access,
        })
    }

    pub async fn limits_view(&self, user: &users::Model, team: &teams::Model) -> CoreResult<TeamLimitsView> {
        let entitlements = EntitlementService::new(self.db.clone()).for_team(team).await?;
        let counts = self.counts(team.id).await?;
        let api_keys_count = team_api_keys::Entity::find()
            .filter(team_api_keys::Column::TeamId.eq(team.id))
            .count(&self.db)
            .await?;

        Ok(TeamLimitsView {
            team: self.summary_view(user, team).await?,
            members_count: counts.members,
            invitations_count: counts.pending_invitations,
            user_limit: entitlements.user_limit,
            api_keys_count,
            allowed_api_access: entitlements.allowed_api_access,
            limits_exceeded: limits_exceeded(entitlements.user_limit, counts),
        })
    }

    pub async fn memberships_for_user(&self, user: &users::Model) -> CoreResult<Vec<MembershipWithTeamView>> {
        let rows = memberships::Entity::find()
            .filter(memberships::Column::UserId.eq(user.id))
            .order_by_asc(memberships::Column::CreatedAt)
            .find_also_related(teams::Entity)
            .all(&self.db)
            .await?;

        let mut views = Vec::with_capacity(rows.len());
        for (membership, team) in rows {
            let Some(team) = team else { continue };
            views.push(MembershipWithTeamView {
                id: membership.id,
                user_id: user.id,
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                display_name: user.display_name(),
                role: membership.role.clone(),
                team: self.summary_view(user, &team).await?,
            });
        }
        Ok(views)
    }

    /// Memberships ordered by the member's email.
    pub async fn members(&self, team_id: Uuid) -> CoreResult<Vec<MembershipView>> {
        let rows = memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team_id))
            .find_also_related(users::Entity)
            .order_by_asc(users::Column::Email)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(membership, user)| user.map(|user| MembershipView::new(&membership, &user)))
            .collect())
    }

    pub async fn member_emails(&self, team_id: Uuid) -> CoreResult<Vec<String>> {
        Ok(self
            .members(team_id)
            .await?
            .into_iter()
            .map(|member| member.email)
            .collect())
    }

    async fn owner_count(&self, team_id: Uuid) -> CoreResult<u64> {
        Ok(memberships::Entity::find()
            .filter(memberships::Column::TeamId.eq(team_id))
            .filter(memberships::Column::Role.eq(Role::Owner.as_str()))
            .count(&self.db)
            .await?)
    }

    pub async fn change_role(
        &self,
        user: &users::Model,
        team_id: Uuid,
        target_user_id: Uuid,
        role: &str,
    ) -> CoreResult<()> {
        let team = self.get_for_user(user, team_id).await?;
        if !self.is_admin(team.id, user.id).await? {
            return Err(CoreError::forbidden("Only team admins can change member role"));
        }
        let role = Role::parse(role)?;
        if self.is_owner(team.id, target_user_id).await? && self.owner_count(team.id).await? < 2 {
            return Err(CoreError::validation("Team must have at least one owner"));
        }

        memberships::Entity::update_many()
            .col_expr(memberships::Column::Role, Expr::value(role.as_str()))
            .col_expr(memberships::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(memberships::Column::TeamId.eq(team.id))
            .filter(memberships::Column::UserId.eq(target_user_id))
            .exec(&self.db)
            .await?;
        info!("User {} is now {} of team {}", target_user_id, role, team.id);

        self.auth0_sync().sync_logged(target_user_id).await;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        user: &users::Model,
        team_id: Uuid,
        target_user_id: Uuid,
    ) -> CoreResult<()> {
        let team = self.get_for_user(user, team_id).await?;
        if !self.is_admin(team.id, user.id).await? {
            return Err(CoreError::forbidden("Only team admins can remove members"));
        }
        if self.is_owner(team.id, target_user_id).await? && self.owner_count(team.id).await? < 2 {
            return Err(CoreError::validation(
                "User is the only owner for this team, and can't be removed",
            ));
        }

        self.delete_membership(team.id, target_user_id).await
    }

    pub async fn leave_team(&self, user: &users::Model, team_id: Uuid) -> CoreResult<()> {
        let team = self.get_for_user(user, team_id).await?;
        if self.is_owner(team.id, user.id).await? && self.owner_count(team.id).await? < 2 {
            return Err(CoreError::validation(
                "You are the only owner for this team, and can't leave",
            ));
        }
        self.delete_membership(team.id, user.id).await
    }

    async fn delete_membership(&self, team_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        let removed = memberships::Entity::delete_many()
            .filter(memberships::Column::TeamId.eq(team_id))
            .filter(memberships::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if removed.rows_affected > 0 {
            info!("User {} left team {}", user_id, team_id);
            self.auth0_sync().sync_logged(user_id).await;
        }
        Ok(())
    }

    pub async fn admin_list(
        &self,
        search: Option<&str>,
        ordering: Option<&str>,
    ) -> CoreResult<Vec<teams::Model>> {
        Ok(apply_ordering(apply_search(teams::Entity::find(), search), ordering)
            .all(&self.db)
            .await?)
    }

    pub async fn admin_view(&self, user: &users::Model, team: &teams::Model) -> CoreResult<AdminTeamView> {
        let view = self.team_view(user, team).await?;
        Ok(AdminTeamView {
            limits: self.limits_view(user, team).await?,
            user_emails: self.member_emails(team.id).await?,
            subscription: view.subscription,
        })
    }
}

fn apply_search(query: Select<teams::Entity>, search: Option<&str>) -> Select<teams::Entity> {
    match search.map(str::trim).filter(|term| !term.is_empty()) {
        Some(term) => query.filter(
            Condition::any()
                .add(teams::Column::Name.contains(term))
                .add(teams::Column::Description.contains(term)),
        ),
        None => query,
    }
}

/// `?ordering=name` or `?ordering=-created_at`; unknown fields fall back to name.
fn apply_ordering(query: Select<teams::Entity>, ordering: Option<&str>) -> Select<teams::Entity> {
    let ordering = ordering.unwrap_or("name");
    let (field, order) = match ordering.strip_prefix('-') {
        Some(field) => (field, Order::Desc),
        None => (ordering, Order::Asc),
    };
    let column = match field {
        "description" => teams::Column::Description,
        "created_at" => teams::Column::CreatedAt,
        "updated_at" => teams::Column::UpdatedAt,
        _ => teams::Column::Name,
    };
    query.order_by(column, order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_exceeded() {
        let counts = TeamCounts {
            members: 2,
            pending_invitations: 1,
        };
        assert!(limits_exceeded(2, counts));
        assert!(!limits_exceeded(3, counts));
        assert!(limits_exceeded(0, TeamCounts { members: 1, pending_invitations: 0 }));
    }
}
