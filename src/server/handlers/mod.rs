pub mod admin_teams;
pub mod admin_users;
pub mod api_keys;
pub mod auth;
pub mod health;
pub mod invitations;
pub mod proxy;
pub mod schema;
pub mod subscriptions;
pub mod teams;
pub mod user_invitations;
pub mod users;
pub mod webhooks;
