//! Error types for vulmatch-web
//!
//! - [`CoreError`]: the API-facing error every handler returns; its kind picks
//!   the HTTP status.
//! - Integration errors ([`StripeError`], [`Auth0Error`], [`MailError`],
//!   [`UpstreamError`]): raised by the outbound clients and converted into
//!   `CoreError` at the service boundary.

pub mod core_error;
pub mod integration;

pub use core_error::{CoreError, CoreErrorKind, CoreResult, GENERIC_FAILURE_MESSAGE};
pub use integration::{Auth0Error, MailError, StripeError, UpstreamError};
