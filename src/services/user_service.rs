//! Account self-service (email, password, MFA) and staff administration.
//! Most operations are thin wrappers around the Auth0 Management API.

use sea_orm::sea_query::Order;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use serde_json::json;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::clients::Auth0Client;
use crate::database::entities::{memberships, social_accounts, teams, users};
use crate::errors::{Auth0Error, CoreError, CoreResult};

use super::Auth0SyncService;

pub const OTP_ISSUER: &str = "vulmatch";
const OTP_DIGITS: usize = 6;
const OTP_STEP: u64 = 30;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OtpEnrollment {
    pub totp_secret: String,
    pub totp_uri: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserTeamSummary {
    pub name: String,
    pub id: String,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminUserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: chrono::DateTime<chrono::Utc>,
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
    pub teams: Vec<UserTeamSummary>,
}

/// Auth0 answers with a status of its own are relayed; anything else is the
/// generic 400.
fn relay_auth0(err: Auth0Error) -> CoreError {
    match err {
        Auth0Error::Api { status, body } => {
            error!("Auth0 rejected request ({}): {}", status, body);
            CoreError::relayed(status, body)
        }
        other => other.into(),
    }
}

pub fn validate_email(email: &str) -> CoreResult<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email.to_string()),
        _ => Err(CoreError::field("email", "Enter a valid email address.")),
    }
}

/// Fresh base32 secret and its provisioning URI.
pub fn new_otp_enrollment(account_name: &str) -> CoreResult<OtpEnrollment> {
    let secret = Secret::generate_secret();
    let bytes = secret
        .to_bytes()
        .map_err(|e| CoreError::internal(format!("Could not generate OTP secret: {:?}", e)))?;
    let totp = TOTP::new(
        Algorithm::SHA1,
        OTP_DIGITS,
        0,
        OTP_STEP,
        bytes,
        Some(OTP_ISSUER.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| CoreError::internal(format!("Could not build OTP: {}", e)))?;

    Ok(OtpEnrollment {
        totp_secret: secret.to_encoded().to_string(),
        totp_uri: totp.get_url(),
    })
}

/// Checks `otp` against the base32 `otp_key` for the current time step.
pub fn verify_otp_code(otp_key: &str, otp: &str) -> bool {
    let Ok(bytes) = Secret::Encoded(otp_key.trim().to_uppercase()).to_bytes() else {
        return false;
    };
    let totp = TOTP::new_unchecked(
        Algorithm::SHA1,
        OTP_DIGITS,
        0,
        OTP_STEP,
        bytes,
        Some(OTP_ISSUER.to_string()),
        String::new(),
    );
    totp.check_current(otp.trim()).unwrap_or(false)
}

#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
    auth0: Auth0Client,
}

impl UserService {
    pub fn new(db: DatabaseConnection, auth0: Auth0Client) -> Self {
        Self { db, auth0 }
    }

    fn sync(&self) -> Auth0SyncService {
        Auth0SyncService::new(self.db.clone(), self.auth0.clone())
    }

    pub async fn get(&self, user_id: Uuid) -> CoreResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| CoreError::not_found("user", user_id.to_string()))
    }

    /// Updates the email in Auth0 first, then locally, then asks Auth0 to
    /// verify the new address.
    pub async fn change_email(&self, user: &users::Model, email: &str) -> CoreResult<users::Model> {
        let email = validate_email(email)?;
        let uid = self.sync().require_auth0_uid(user.id).await?;

        self.auth0.update_user(&uid, &json!({"email": email})).await?;

        let mut active = user.clone().into_active_model();
        active.email = Set(email.clone());
        let user = active.update(&self.db).await?;

        self.auth0.send_verification_email(&uid).await?;
        info!("User {} changed email", user.id);
        Ok(user)
    }

    /// Anonymous variant: looks the address up in Auth0. Unknown addresses
    /// succeed silently.
    pub async fn resend_verification_for_email(&self, email: &str) -> CoreResult<()> {
        let email = validate_email(email)?;
        let matches = self.auth0.users_by_email(&email).await?;
        let Some(account) = matches.first() else {
            return Ok(());
        };
        self.auth0.send_verification_email(&account.user_id).await?;
        Ok(())
    }

    /// Authenticated variant: resolves the address through the locally
    /// linked Auth0 accounts.
    pub async fn resend_verification_for_linked_email(&self, email: &str) -> CoreResult<()> {
        let email = validate_email(email)?;
        let account = social_accounts::Entity::find()
            .filter(social_accounts::Column::Provider.eq(social_accounts::PROVIDER_AUTH0))
            .filter(social_accounts::Column::Email.eq(email.as_str()))
            .one(&self.db)
            .await?;
        let Some(account) = account else {
            return Ok(());
        };
        self.auth0.send_verification_email(&account.uid).await?;
        Ok(())
    }

    pub async fn resend_my_verification_email(&self, user: &users::Model) -> CoreResult<()> {
        let uid = self.sync().require_auth0_uid(user.id).await?;
        self.auth0.send_verification_email(&uid).await?;
        Ok(())
    }

    pub async fn change_password(&self, user: &users::Model) -> CoreResult<()> {
        self.auth0
            .change_password(&user.email)
            .await
            .map_err(relay_auth0)
    }

    pub async fn init_otp(&self, user: &users::Model) -> CoreResult<OtpEnrollment> {
        let uid = self.sync().require_auth0_uid(user.id).await?;
        let enrollment = new_otp_enrollment(&user.email)?;
        self.auth0
            .create_totp_method(&uid, &enrollment.totp_secret)
            .await
            .map_err(relay_auth0)?;
        Ok(enrollment)
    }

    pub async fn verify_otp(&self, user: &users::Model, otp: &str, otp_key: &str) -> CoreResult<()> {
        if !verify_otp_code(otp_key, otp) {
            return Err(CoreError::validation("Invalid OTP"));
        }
        self.set_mfa_enabled(user, true).await
    }

    pub async fn disable_otp(&self, user: &users::Model) -> CoreResult<()> {
        self.set_mfa_enabled(user, false).await
    }

    async fn set_mfa_enabled(&self, user: &users::Model, enabled: bool) -> CoreResult<()> {
        let uid = self.sync().require_auth0_uid(user.id).await?;
        self.auth0
            .update_user(&uid, &json!({"app_metadata": {"mfa_enabled": enabled}}))
            .await?;
        info!("MFA for user {} set to {}", user.id, enabled);
        Ok(())
    }

    pub async fn admin_list(
        &self,
        search: Option<&str>,
        ordering: Option<&str>,
    ) -> CoreResult<Vec<AdminUserView>> {
        let mut query = users::Entity::find();
        if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
            query = query.filter(users::Column::Email.contains(term));
        }

        let ordering = ordering.unwrap_or("email");
        let (field, order) = match ordering.strip_prefix('-') {
            Some(field) => (field, Order::Desc),
            None => (ordering, Order::Asc),
        };
        let column = match field {
            "is_staff" => users::Column::IsStaff,
            "date_joined" => users::Column::DateJoined,
            "last_login" => users::Column::LastLogin,
            _ => users::Column::Email,
        };

        let users = query.order_by(column, order).all(&self.db).await?;
        let mut views = Vec::with_capacity(users.len());
        for user in users {
            views.push(self.admin_view(user).await?);
        }
        Ok(views)
    }

    pub async fn admin_view(&self, user: users::Model) -> CoreResult<AdminUserView> {
        let teams = memberships::Entity::find()
            .filter(memberships::Column::UserId.eq(user.id))
            .order_by_asc(memberships::Column::CreatedAt)
            .find_also_related(teams::Entity)
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(_, team)| team)
            .map(|team| UserTeamSummary {
                name: team.name,
                id: team.id.to_string(),
                owner_id: team.owner_id,
            })
            .collect();

        Ok(AdminUserView {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            is_active: user.is_active,
            date_joined: user.date_joined,
            last_login: user.last_login,
            teams,
        })
    }

    /// Returns `false` when the user already had the requested flag.
    /// Auth0 learns the new flag first; if that fails nothing changes locally.
    pub async fn set_staff(&self, user_id: Uuid, is_staff: bool) -> CoreResult<bool> {
        let user = self.get(user_id).await?;
        if user.is_staff == is_staff {
            return Ok(false);
        }

        self.sync().sync_with_staff_flag(&user, is_staff).await?;

        let mut active = user.into_active_model();
        active.is_staff = Set(is_staff);
        active.is_superuser = Set(is_staff);
        active.update(&self.db).await?;
        info!("User {} staff flag set to {}", user_id, is_staff);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_uri_names_issuer_and_account() {
        let enrollment = new_otp_enrollment("jane@example.com").unwrap();
        assert!(enrollment.totp_uri.starts_with("otpauth://totp/"));
        assert!(enrollment.totp_uri.contains("issuer=vulmatch"));
        assert!(enrollment.totp_uri.contains(&enrollment.totp_secret));
    }

    #[test]
    fn test_current_code_verifies() {
        let enrollment = new_otp_enrollment("jane@example.com").unwrap();
        let bytes = Secret::Encoded(enrollment.totp_secret.clone()).to_bytes().unwrap();
        let totp = TOTP::new_unchecked(
            Algorithm::SHA1,
            OTP_DIGITS,
            0,
            OTP_STEP,
            bytes,
            None,
            String::new(),
        );
        let code = totp.generate_current().unwrap();
        assert!(verify_otp_code(&enrollment.totp_secret, &code));
    }

    #[test]
    fn test_invalid_codes_are_rejected() {
        let enrollment = new_otp_enrollment("jane@example.com").unwrap();
        assert!(!verify_otp_code(&enrollment.totp_secret, "not-a-code"));
        assert!(!verify_otp_code("!!invalid base32!!", "123456"));
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" x@y.io ").unwrap(), "x@y.io");
        assert!(validate_email("xy.io").is_err());
    }

    #[test]
    fn test_api_errors_are_relayed() {
        let err = relay_auth0(Auth0Error::Api {
            status: 429,
            body: json!({"error": "too_many_requests"}),
        });
        assert_eq!(err.message(), "Relayed 429 response");
    }
}
