use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use axum::{
    routing::{any, get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers::{
    admin_teams, admin_users, api_keys, auth, health, invitations, proxy, schema, subscriptions,
    teams, user_invitations, users, webhooks,
};
use crate::clients::{Auth0Client, BrevoClient, StripeClient, VulmatchClient};
use crate::config::Settings;
use crate::services::{
    ApiKeyService, AuthService, EntitlementService, InvitationService, MailService,
    SubscriptionService, TeamService, UserService, WebhookService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    pub stripe: StripeClient,
    pub auth0: Auth0Client,
    pub brevo: BrevoClient,
    pub vulmatch: VulmatchClient,
}

impl AppState {
    pub fn new(db: DatabaseConnection, settings: Settings) -> Self {
        Self {
            stripe: StripeClient::from_settings(&settings),
            auth0: Auth0Client::from_settings(&settings),
            brevo: BrevoClient::from_settings(&settings),
            vulmatch: VulmatchClient::from_settings(&settings),
            settings: Arc::new(settings),
            db,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.db.clone(), self.auth0.clone())
    }

    pub fn api_key_service(&self) -> ApiKeyService {
        ApiKeyService::new(self.db.clone())
    }

    pub fn entitlement_service(&self) -> EntitlementService {
        EntitlementService::new(self.db.clone())
    }

    pub fn team_service(&self) -> TeamService {
        TeamService::new(
            self.db.clone(),
            self.stripe.clone(),
            self.auth0.clone(),
            self.settings.clone(),
        )
    }

    pub fn mail_service(&self) -> MailService {
        MailService::new(
            self.brevo.clone(),
            self.settings.invitation_base_url(),
            self.settings.email_sender_name.clone(),
        )
    }

    pub fn invitation_service(&self) -> InvitationService {
        InvitationService::new(
            self.db.clone(),
            self.team_service(),
            self.mail_service(),
            self.auth0.clone(),
        )
    }

    pub fn subscription_service(&self) -> SubscriptionService {
        SubscriptionService::new(self.db.clone(), self.stripe.clone(), self.settings.clone())
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.db.clone(), self.auth0.clone())
    }

    pub fn webhook_service(&self) -> WebhookService {
        WebhookService::new(self.db.clone(), self.stripe.clone(), self.settings.clone())
    }
}

fn cors_layer(cors_origin: Option<&str>) -> CorsLayer {
    let any_origin = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    match cors_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", origin);
                any_origin
            }
        },
        None => any_origin,
    }
}

pub fn create_app(state: AppState) -> Result<Router> {
    let cors = cors_layer(state.settings.cors_origin.as_deref());

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/rest-auth/auth0", post(auth::auth0_login))
        .route("/rest-auth/user", get(auth::current_user))
        .route("/stripe/webhook", post(webhooks::stripe_webhook))
        .nest("/teams/api", team_routes())
        .nest("/team-management/:team_id/subscription/init", subscription_routes())
        .nest("/subscriptions/api", product_routes())
        .nest("/users", user_routes())
        .nest("/vulmatch_api", vulmatch_routes())
        .merge(schema::swagger_ui(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(app)
}

fn team_routes() -> Router<AppState> {
    Router::new()
        // Teams
        .route("/teams", get(teams::list_teams).post(teams::create_team))
        .route("/teams/membership", get(teams::list_memberships))
        .route(
            "/teams/:team_id",
            get(teams::get_team)
                .put(teams::update_team)
                .patch(teams::update_team)
                .delete(teams::delete_team),
        )
        .route("/teams/:team_id/limits", get(teams::get_limits))
        .route("/teams/:team_id/members", get(teams::list_members))
        .route("/teams/:team_id/change-role", post(teams::change_role))
        .route("/teams/:team_id/remove-member", post(teams::remove_member))
        .route("/teams/:team_id/leave-team", post(teams::leave_team))
        // Team invitations
        .route(
            "/teams/:team_id/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        )
        .route(
            "/teams/:team_id/invitations/bulk-create",
            post(invitations::bulk_create_invitations),
        )
        .route(
            "/teams/:team_id/invitations/:invitation_id",
            get(invitations::get_invitation).delete(invitations::delete_invitation),
        )
        .route(
            "/teams/:team_id/invitations/:invitation_id/resend-invite",
            post(invitations::resend_invitation),
        )
        .route(
            "/teams/:team_id/invitations/:invitation_id/cancel-invitation",
            post(invitations::cancel_invitation),
        )
        // Team API keys
        .route(
            "/teams/:team_id/api-keys",
            get(api_keys::list_team_keys).post(api_keys::create_key),
        )
        .route(
            "/teams/:team_id/api-keys/:key_id",
            get(api_keys::get_team_key).delete(api_keys::delete_team_key),
        )
        // Caller scoped
        .route("/user/invitations", get(user_invitations::list_invitations))
        .route(
            "/user/invitations/:invitation_id",
            get(user_invitations::get_invitation),
        )
        .route(
            "/user/invitations/:invitation_id/accept-invitation",
            post(user_invitations::accept_invitation),
        )
        .route(
            "/user/invitations/:invitation_id/cancel-invitation",
            post(user_invitations::decline_invitation),
        )
        .route(
            "/user/complete-registration",
            post(user_invitations::complete_registration),
        )
        .route("/user/api-keys", get(api_keys::list_user_keys))
        .route(
            "/user/api-keys/:key_id",
            get(api_keys::get_user_key).delete(api_keys::delete_user_key),
        )
        // Staff
        .route("/admin", get(admin_teams::list_teams))
        .route(
            "/admin/:team_id",
            get(admin_teams::get_team)
                .put(admin_teams::update_team)
                .patch(admin_teams::update_team)
                .delete(admin_teams::delete_team),
        )
}

fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(subscriptions::create_checkout_session))
        .route(
            "/active-subscription",
            get(subscriptions::active_subscription),
        )
        .route(
            "/confirm-subscription",
            post(subscriptions::confirm_subscription),
        )
        .route(
            "/create-portal-session",
            post(subscriptions::create_portal_session),
        )
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(subscriptions::list_products))
        .route(
            "/admin/config",
            get(subscriptions::get_config).put(subscriptions::update_config),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/token", post(auth::admin_token))
        .route(
            "/email/resend-verification-email",
            post(users::resend_verification_email_anonymous),
        )
        .route("/user-management/change-email", patch(users::change_email))
        .route(
            "/user-management/resend-verification-email",
            post(users::resend_verification_email),
        )
        .route(
            "/user-management/resend-my-verification-email",
            post(users::resend_my_verification_email),
        )
        .route("/user-management/change-password", post(users::change_password))
        .route("/user-management/init-otp", post(users::init_otp))
        .route("/user-management/verify-otp", post(users::verify_otp))
        .route("/user-management/disable-otp", post(users::disable_otp))
        .route("/admin-user-management", get(admin_users::list_users))
        .route(
            "/admin-user-management/:user_id/make-staff",
            post(admin_users::make_staff),
        )
        .route(
            "/admin-user-management/:user_id/remove-staff",
            post(admin_users::remove_staff),
        )
}

fn vulmatch_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/*path", any(proxy::forward_public))
        .route("/admin/api/v1/*path", any(proxy::forward_admin))
        .route("/schema/schema-json", get(schema::public_schema))
        .route("/api/schema/schema-json", get(schema::public_schema))
        .route("/admin/schema/schema-json", get(schema::admin_schema))
}
