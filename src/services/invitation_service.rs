//! Team invitations, seen from the team (admins inviting) and from the
//! invitee (accepting, declining, completing registration).

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::roles::Role;
use crate::clients::Auth0Client;
use crate::database::entities::{invitations, memberships, teams, users};
use crate::errors::{CoreError, CoreResult};

use super::team_service::{TeamInput, TeamSummaryView, NO_PERMISSION_MESSAGE};
use super::{Auth0SyncService, EntitlementService, MailService, TeamService};

pub const USER_LIMIT_CODE: &str = "E01";
pub const USER_LIMIT_MESSAGE: &str = "Team subscription user count exceeded";

#[derive(Debug, Clone)]
pub struct InvitationInput {
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompleteRegistration {
    pub team: Option<TeamInput>,
    pub accepted_invitations: Vec<Uuid>,
    pub rejected_invitations: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvitationView {
    pub id: Uuid,
    pub team_id: Uuid,
    pub email: String,
    pub role: String,
    /// Display name of the inviter.
    pub invited_by: String,
    pub is_accepted: bool,
    pub last_email_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvitationWithTeamView {
    pub id: Uuid,
    pub team_id: Uuid,
    pub team: TeamSummaryView,
    pub email: String,
    pub role: String,
    pub invited_by: String,
    pub is_accepted: bool,
}

fn user_limit_error() -> CoreError {
    CoreError::coded(USER_LIMIT_CODE, USER_LIMIT_MESSAGE)
}

/// A zero limit disables the check.
pub fn exceeds_limit_on_create(user_limit: i64, members: u64, invitations: u64) -> bool {
    user_limit != 0 && user_limit < (members + invitations) as i64
}

/// `available = limit - (members + pending)`; a zero limit disables the check.
pub fn exceeds_limit_on_bulk(user_limit: i64, members: u64, pending: u64, requested: usize) -> bool {
    let available = user_limit - (members + pending) as i64;
    user_limit != 0 && available < requested as i64
}

/// Validates the requested role; only owners may invite owners.
pub fn invitation_role(requested: Option<&str>, inviter_is_owner: bool) -> CoreResult<Role> {
    let role = match requested {
        Some(value) => Role::parse(value)?,
        None => Role::Member,
    };
    if role.is_owner() && !inviter_is_owner {
        return Err(CoreError::field(
            "role",
            "Only a owner can invite another user as a owner",
        ));
    }
    Ok(role)
}

fn normalize_email(email: &str) -> CoreResult<String> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(CoreError::field("email", "Enter a valid email address."));
    }
    Ok(email.to_string())
}

#[derive(Clone)]
pub struct InvitationService {
    db: DatabaseConnection,
    teams: TeamService,
    mail: MailService,
    auth0: Auth0Client,
}

impl InvitationService {
    pub fn new(db: DatabaseConnection, teams: TeamService, mail: MailService, auth0: Auth0Client) -> Self {
        Self {
            db,
            teams,
            mail,
            auth0,
        }
    }

    pub async fn view(&self, invitation: &invitations::Model) -> CoreResult<InvitationView> {
        Ok(InvitationView {
            id: invitation.id,
            team_id: invitation.team_id,
            email: invitation.email.clone(),
            role: invitation.role.clone(),
            invited_by: self.inviter_name(invitation).await?,
            is_accepted: invitation.is_accepted,
            last_email_date: invitation.last_email_date,
        })
    }

    pub async fn view_with_team(
        &self,
        user: &users::Model,
        invitation: &invitations::Model,
    ) -> CoreResult<InvitationWithTeamView> {
        let team = self.teams.get(invitation.team_id).await?;
        Ok(InvitationWithTeamView {
            id: invitation.id,
            team_id: invitation.team_id,
            team: self.teams.summary_view(user, &team).await?,
            email: invitation.email.clone(),
            role: invitation.role.clone(),
            invited_by: self.inviter_name(invitation).await?,
            is_accepted: invitation.is_accepted,
        })
    }

    async fn inviter_name(&self, invitation: &invitations::Model) -> CoreResult<String> {
        Ok(users::Entity::find_by_id(invitation.invited_by)
            .one(&self.db)
            .await?
            .map(|user| user.display_name())
            .unwrap_or_default())
    }

    async fn require_inviter(&self, user: &users::Model, team: &teams::Model) -> CoreResult<()> {
        if user.is_staff || self.teams.is_admin(team.id, user.id).await? {
            Ok(())
        } else {
            Err(CoreError::forbidden(NO_PERMISSION_MESSAGE))
        }
    }

    async fn ensure_no_pending_invite(&self, team_id: Uuid, email: &str) -> CoreResult<()> {
        let pending = invitations::Entity::find()
            .filter(invitations::Column::TeamId.eq(team_id))
            .filter(invitations::Column::Email.eq(email))
            .filter(invitations::Column::IsAccepted.eq(false))
            .filter(invitations::Column::IsCancelled.eq(false))
            .count(&self.db)
            .await?;
        if pending > 0 {
            return Err(CoreError::field(
                "email",
                format!("There is already a pending invitation for {}.", email),
            ));
        }
        Ok(())
    }

    async fn user_limit(&self, team: &teams::Model) -> CoreResult<i64> {
        Ok(EntitlementService::new(self.db.clone())
            .for_team(team)
            .await?
            .user_limit)
    }

    pub async fn list_for_team(
        &self,
        user: &users::Model,
        team_id: Uuid,
        is_accepted: Option<bool>,
    ) -> CoreResult<Vec<invitations::Model>> {
        let team = self.teams.get_accessible(user, team_id).await?;
        let mut query = invitations::Entity::find()
            .filter(invitations::Column::TeamId.eq(team.id))
            .order_by_desc(invitations::Column::CreatedAt);
        if let Some(is_accepted) = is_accepted {
            query = query.filter(invitations::Column::IsAccepted.eq(is_accepted));
        }
        Ok(query.all(&self.db).await?)
    }

    pub async fn get_for_team(
        &self,
        user: &users::Model,
        team_id: Uuid,
        invitation_id: Uuid,
    ) -> CoreResult<invitations::Model> {
        let team = self.teams.get_accessible(user, team_id).await?;
        invitations::Entity::find_by_id(invitation_id)
            .filter(invitations::Column::TeamId.eq(team.id))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("invitation", invitation_id.to_string()))
    }

    pub async fn create(
        &self,
        user: &users::Model,
        team_id: Uuid,
        input: InvitationInput,
    ) -> CoreResult<invitations::Model> {
        let team = self.teams.get_accessible(user, team_id).await?;
        let is_owner = self.teams.is_owner(team.id, user.id).await?;
        let role = invitation_role(input.role.as_deref(), is_owner)?;
        let email = normalize_email(&input.email)?;

        self.ensure_no_pending_invite(team.id, &email).await?;
        self.require_inviter(user, &team).await?;

        let members = self.teams.counts(team.id).await?.members;
        let all_invitations = invitations::Entity::find()
            .filter(invitations::Column::TeamId.eq(team.id))
            .count(&self.db)
            .await?;
        if exceeds_limit_on_create(self.user_limit(&team).await?, members, all_invitations) {
            return Err(user_limit_error());
        }

        let invitation = self.insert(&team, user, &email, role).await?;
        self.mail.send_invitation(&invitation, &team, Some(user)).await?;
        Ok(invitation)
    }

    pub async fn bulk_create(
        &self,
        user: &users::Model,
        team_id: Uuid,
        inputs: Vec<InvitationInput>,
    ) -> CoreResult<Vec<invitations::Model>> {
        let team = self.teams.get_accessible(user, team_id).await?;
        let is_owner = self.teams.is_owner(team.id, user.id).await?;

        let mut requested = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let role = invitation_role(input.role.as_deref(), is_owner)?;
            requested.push((normalize_email(&input.email)?, role));
        }

        self.require_inviter(user, &team).await?;
        let counts = self.teams.counts(team.id).await?;
        if exceeds_limit_on_bulk(
            self.user_limit(&team).await?,
            counts.members,
            counts.pending_invitations,
            requested.len(),
        ) {
            return Err(user_limit_error());
        }
        for (email, _) in &requested {
            self.ensure_no_pending_invite(team.id, email).await?;
        }

        let mut created = Vec::with_capacity(requested.len());
        for (email, role) in requested {
            created.push(self.insert(&team, user, &email, role).await?);
        }
        for invitation in &created {
            self.mail.send_invitation(invitation, &team, Some(user)).await?;
        }
        Ok(created)
    }

    async fn insert(
        &self,
        team: &teams::Model,
        inviter: &users::Model,
        email: &str,
        role: Role,
    ) -> CoreResult<invitations::Model> {
        let now = Utc::now();
        let invitation = invitations::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team.id),
            email: Set(email.to_string()),
            role: Set(role.as_str().to_string()),
            invited_by: Set(inviter.id),
            is_accepted: Set(false),
            is_cancelled: Set(false),
            accepted_by: Set(None),
            last_email_date: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        info!("Invited {} to team {} as {}", email, team.id, role);
        Ok(invitation)
    }

    pub async fn resend(&self, user: &users::Model, team_id: Uuid, invitation_id: Uuid) -> CoreResult<()> {
        let invitation = self.get_for_team(user, team_id, invitation_id).await?;
        let team = self.teams.get(team_id).await?;
        self.require_inviter(user, &team).await?;
        if !invitation.is_pending() {
            return Err(CoreError::validation("Invalid invite"));
        }

        let mut active = invitation.into_active_model();
        active.last_email_date = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let invitation = active.update(&self.db).await?;

        let inviter = users::Entity::find_by_id(invitation.invited_by)
            .one(&self.db)
            .await?;
        self.mail
            .send_invitation(&invitation, &team, inviter.as_ref())
            .await
    }

    /// Team-side cancel; the row stays for the audit trail.
    pub async fn cancel_for_team(
        &self,
        user: &users::Model,
        team_id: Uuid,
        invitation_id: Uuid,
    ) -> CoreResult<invitations::Model> {
        let invitation = self.get_for_team(user, team_id, invitation_id).await?;
        let team = self.teams.get(team_id).await?;
        self.require_inviter(user, &team).await?;

        let mut active = invitation.into_active_model();
        active.is_cancelled = Set(true);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn destroy_for_team(
        &self,
        user: &users::Model,
        team_id: Uuid,
        invitation_id: Uuid,
    ) -> CoreResult<()> {
        let invitation = self.get_for_team(user, team_id, invitation_id).await?;
        let team = self.teams.get(team_id).await?;
        self.require_inviter(user, &team).await?;
        invitation.delete(&self.db).await?;
        Ok(())
    }

    /// Pending invitations addressed to the caller.
    pub async fn list_for_user(&self, user: &users::Model) -> CoreResult<Vec<invitations::Model>> {
        Ok(invitations::Entity::find()
            .filter(invitations::Column::Email.eq(user.email.as_str()))
            .filter(invitations::Column::IsAccepted.eq(false))
            .filter(invitations::Column::IsCancelled.eq(false))
            .order_by_desc(invitations::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn get_for_user(&self, user: &users::Model, invitation_id: Uuid) -> CoreResult<invitations::Model> {
        invitations::Entity::find_by_id(invitation_id)
            .filter(invitations::Column::Email.eq(user.email.as_str()))
            .filter(invitations::Column::IsAccepted.eq(false))
            .filter(invitations::Column::IsCancelled.eq(false))
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("invitation", invitation_id.to_string()))
    }

    pub async fn decline(&self, user: &users::Model, invitation_id: Uuid) -> CoreResult<()> {
        let invitation = self.get_for_user(user, invitation_id).await?;
        invitation.delete(&self.db).await?;
        info!("User {} declined invitation {}", user.id, invitation_id);
        Ok(())
    }

    pub async fn accept(&self, user: &users::Model, invitation_id: Uuid) -> CoreResult<()> {
        let invitation = self.get_for_user(user, invitation_id).await?;
        if self.teams.is_member(invitation.team_id, user.id).await? {
            return Err(CoreError::validation("User is already a member of this team"));
        }
        self.process(invitation, user).await?;
        Auth0SyncService::new(self.db.clone(), self.auth0.clone())
            .sync_logged(user.id)
            .await;
        Ok(())
    }

    /// Joins the team with the invited role and marks the invitation used.
    async fn process(&self, invitation: invitations::Model, user: &users::Model) -> CoreResult<()> {
        let now = Utc::now();
        memberships::ActiveModel {
            team_id: Set(invitation.team_id),
            user_id: Set(user.id),
            role: Set(invitation.role.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        let team_id = invitation.team_id;
        let mut active = invitation.into_active_model();
        active.is_accepted = Set(true);
        active.accepted_by = Set(Some(user.id));
        active.updated_at = Set(now);
        active.update(&self.db).await?;
        info!("User {} joined team {}", user.id, team_id);
        Ok(())
    }

    pub async fn complete_registration(
        &self,
        user: &users::Model,
        request: CompleteRegistration,
    ) -> CoreResult<Option<teams::Model>> {
        if !request.accepted_invitations.is_empty() {
            let accepted = invitations::Entity::find()
                .filter(invitations::Column::Email.eq(user.email.as_str()))
                .filter(invitations::Column::Id.is_in(request.accepted_invitations.clone()))
                .all(&self.db)
                .await?;
            for invitation in accepted {
                if self.teams.is_member(invitation.team_id, user.id).await? {
                    continue;
                }
                self.process(invitation, user).await?;
            }
        }

        if !request.rejected_invitations.is_empty() {
            invitations::Entity::update_many()
                .col_expr(invitations::Column::IsCancelled, Expr::value(true))
                .filter(invitations::Column::Email.eq(user.email.as_str()))
                .filter(invitations::Column::Id.is_in(request.rejected_invitations.clone()))
                .exec(&self.db)
                .await?;
        }

        let team = match request.team {
            Some(input) if input.name.as_deref().is_some_and(|name| !name.trim().is_empty()) => {
                Some(self.teams.insert_team(user, input, Role::Admin).await?)
            }
            _ => None,
        };

        let sync = Auth0SyncService::new(self.db.clone(), self.auth0.clone());
        sync.sync_logged(user.id).await;
        match sync.auth0_account(user.id).await? {
            Some(account) => {
                self.auth0
                    .update_user(&account.uid, &json!({"app_metadata": {"registered": true}}))
                    .await?;
            }
            None => warn!("User {} has no Auth0 account to mark registered", user.id),
        }

        Ok(team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_limit_counts_all_invitations() {
        assert!(!exceeds_limit_on_create(5, 2, 3));
        assert!(exceeds_limit_on_create(5, 3, 3));
        assert!(!exceeds_limit_on_create(0, 10, 10));
    }

    #[test]
    fn test_bulk_limit_uses_available_slots() {
        assert!(!exceeds_limit_on_bulk(5, 2, 1, 2));
        assert!(exceeds_limit_on_bulk(5, 2, 1, 3));
        assert!(!exceeds_limit_on_bulk(0, 2, 1, 30));
    }

    #[test]
    fn test_only_owners_invite_owners() {
        assert_eq!(invitation_role(None, false).unwrap(), Role::Member);
        assert_eq!(invitation_role(Some("admin"), false).unwrap(), Role::Admin);
        assert_eq!(invitation_role(Some("owner"), true).unwrap(), Role::Owner);
        assert!(invitation_role(Some("owner"), false).is_err());
        assert!(invitation_role(Some("boss"), true).is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" a@b.co ").unwrap(), "a@b.co");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("@b.co").is_err());
    }
}
