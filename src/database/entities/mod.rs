pub mod auth_tokens;
pub mod invitations;
pub mod memberships;
pub mod social_accounts;
pub mod stripe_prices;
pub mod stripe_products;
pub mod stripe_subscriptions;
pub mod subscription_config;
pub mod team_api_keys;
pub mod teams;
pub mod users;
