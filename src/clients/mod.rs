//! Outbound HTTP clients for the third-party services the backend talks to.

pub mod auth0;
pub mod brevo;
pub mod stripe;
pub mod vulmatch;

pub use auth0::Auth0Client;
pub use brevo::BrevoClient;
pub use stripe::StripeClient;
pub use vulmatch::VulmatchClient;

use std::time::Duration;

use reqwest::Client;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}
