//! Business logic behind the HTTP handlers. Each service is a cheap value
//! built per request from `AppState`.

pub mod api_key_service;
pub mod auth_service;
pub mod auth0_sync_service;
pub mod billing_sync_service;
pub mod entitlement_service;
pub mod invitation_service;
pub mod mail_service;
pub mod slug;
pub mod subscription_service;
pub mod team_service;
pub mod user_service;
pub mod webhook;

pub use api_key_service::ApiKeyService;
pub use auth_service::AuthService;
pub use auth0_sync_service::Auth0SyncService;
pub use billing_sync_service::BillingSyncService;
pub use entitlement_service::{EntitlementService, Entitlements};
pub use invitation_service::InvitationService;
pub use mail_service::MailService;
pub use subscription_service::SubscriptionService;
pub use team_service::TeamService;
pub use user_service::UserService;
pub use webhook::WebhookService;
