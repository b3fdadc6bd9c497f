//! Errors raised by the outbound integrations (Stripe, Auth0, Brevo and the
//! upstream Vulmatch service).
//!
//! None of these reach API clients verbatim. They are logged where they
//! happen and converted into a [`CoreError`]: Stripe and Auth0 failures
//! become the generic 400, upstream proxy failures become a 502.

use thiserror::Error;

use super::{CoreError, CoreErrorKind};

/// Stripe REST API errors
#[derive(Error, Debug)]
pub enum StripeError {
    /// No secret key configured
    #[error("Stripe is not configured")]
    NotConfigured,

    /// Transport-level failure
    #[error("Stripe request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe answered with an error object
    #[error("Stripe API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Payload could not be interpreted
    #[error("Unexpected Stripe payload: {0}")]
    Payload(String),
}

impl StripeError {
    /// Stripe's `resource_missing` code, used when cancelling already-gone objects.
    pub fn is_resource_missing(&self) -> bool {
        matches!(self, StripeError::Api { code: Some(code), .. } if code == "resource_missing")
    }
}

/// Auth0 Management / Authentication API errors
#[derive(Error, Debug)]
pub enum Auth0Error {
    #[error("Auth0 is not configured")]
    NotConfigured,

    #[error("Auth0 request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Auth0 API error ({status}): {body}")]
    Api { status: u16, body: serde_json::Value },

    #[error("Malformed Auth0 user id: {0}")]
    MalformedUserId(String),
}

/// Transactional email errors
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Email request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Template error: {0}")]
    Template(#[from] handlebars::RenderError),
}

/// Upstream Vulmatch service errors
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Vulmatch service base URL is not configured")]
    NotConfigured,

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected upstream payload: {0}")]
    Payload(String),
}

impl From<StripeError> for CoreError {
    fn from(err: StripeError) -> Self {
        tracing::error!("Stripe call failed: {}", err);
        CoreError::integration_failure().with_source(err)
    }
}

impl From<Auth0Error> for CoreError {
    fn from(err: Auth0Error) -> Self {
        tracing::error!("An error occurred: {}", err);
        CoreError::integration_failure().with_source(err)
    }
}

impl From<MailError> for CoreError {
    fn from(err: MailError) -> Self {
        tracing::error!("Sending email failed: {}", err);
        CoreError::integration_failure().with_source(err)
    }
}

impl From<UpstreamError> for CoreError {
    fn from(err: UpstreamError) -> Self {
        tracing::error!("Vulmatch upstream failed: {}", err);
        let kind = match err {
            UpstreamError::NotConfigured => CoreErrorKind::Unavailable,
            _ => CoreErrorKind::Upstream,
        };
        CoreError::new(kind, "Upstream service unavailable").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_missing_detection() {
        let err = StripeError::Api {
            status: 404,
            code: Some("resource_missing".to_string()),
            message: "No such subscription".to_string(),
        };
        assert!(err.is_resource_missing());
        assert!(!StripeError::NotConfigured.is_resource_missing());
    }

    #[test]
    fn test_stripe_failures_become_generic_bad_request() {
        let err: CoreError = StripeError::NotConfigured.into();
        assert_eq!(err.kind(), CoreErrorKind::Validation);
        assert_eq!(err.message(), super::super::core_error::GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_upstream_not_configured_is_unavailable() {
        let err: CoreError = UpstreamError::NotConfigured.into();
        assert_eq!(err.kind(), CoreErrorKind::Unavailable);
    }
}
