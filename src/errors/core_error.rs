use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred while processing your request.";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreErrorKind {
    NotFound,
    Validation,
    Conflict,
    Forbidden,
    Unauthorized,
    MethodNotAllowed,
    Upstream,
    Unavailable,
    Internal,
}

impl CoreErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreErrorKind::NotFound => StatusCode::NOT_FOUND,
            CoreErrorKind::Validation => StatusCode::BAD_REQUEST,
            CoreErrorKind::Conflict => StatusCode::CONFLICT,
            CoreErrorKind::Forbidden => StatusCode::FORBIDDEN,
            CoreErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            CoreErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            CoreErrorKind::Upstream => StatusCode::BAD_GATEWAY,
            CoreErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            CoreErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API-facing error. Every handler returns `CoreResult<_>` and the kind
/// decides the HTTP status.
#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    message: String,
    body: Option<Value>,
    status: Option<StatusCode>,
    fields: Option<BTreeMap<String, String>>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            body: None,
            status: None,
            fields: None,
            source: None,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("entity".to_string(), entity.into());
        fields.insert("id".to_string(), id.into());

        Self {
            kind: CoreErrorKind::NotFound,
            message: "Not found.".to_string(),
            body: None,
            status: None,
            fields: Some(fields),
            source: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Validation, message)
    }

    /// Validation error that renders `body` verbatim instead of `{"detail": ..}`.
    pub fn validation_body(body: Value) -> Self {
        let message = body.to_string();
        Self {
            body: Some(body),
            ..Self::new(CoreErrorKind::Validation, message)
        }
    }

    /// Field-scoped validation error, e.g. `{"email": ["..."]}`.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::validation_body(json!({ field: [message] }))
    }

    /// Coded validation error, e.g. `{"code": "E01", "message": "..."}`.
    pub fn coded(code: &str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::validation_body(json!({ "code": code, "message": message }))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Conflict, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Forbidden, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unauthorized, message)
    }

    pub fn method_not_allowed(method: &str) -> Self {
        Self::new(
            CoreErrorKind::MethodNotAllowed,
            format!("Method \"{}\" not allowed.", method),
        )
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Upstream, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    /// Relays a third-party answer with its own status and body.
    pub fn relayed(status: u16, body: Value) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
        let kind = match status {
            StatusCode::UNAUTHORIZED => CoreErrorKind::Unauthorized,
            StatusCode::FORBIDDEN => CoreErrorKind::Forbidden,
            StatusCode::NOT_FOUND => CoreErrorKind::NotFound,
            s if s.is_server_error() => CoreErrorKind::Upstream,
            _ => CoreErrorKind::Validation,
        };
        Self {
            body: Some(body),
            status: Some(status),
            ..Self::new(kind, format!("Relayed {} response", status.as_u16()))
        }
    }

    /// The 400 surfaced when a third-party call (Stripe, Auth0) fails.
    pub fn integration_failure() -> Self {
        Self::validation(GENERIC_FAILURE_MESSAGE)
    }

    /// Replaces the rendered body, keeping the status.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.fields.as_ref()
    }

    fn to_body(&self) -> Value {
        if let Some(body) = &self.body {
            return body.clone();
        }

        let mut body = Map::new();
        body.insert("detail".to_string(), Value::String(self.message.clone()));
        if let Some(fields) = &self.fields {
            for (key, value) in fields {
                body.insert(key.clone(), Value::String(value.clone()));
            }
        }
        Value::Object(body)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        if self.kind == CoreErrorKind::Internal {
            tracing::error!(error = %self, source = ?self.source, "Request failed");
        }
        let status = self.status.unwrap_or_else(|| self.kind.status_code());
        (status, Json(self.to_body())).into_response()
    }
}

impl From<sea_orm::DbErr> for CoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::RecordNotFound(message) => {
                CoreError::new(CoreErrorKind::NotFound, message)
            }
            other => CoreError::internal("Database error").with_source(other),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = err.into();
        Self {
            source: Some(boxed),
            ..CoreError::internal("Unhandled error")
        }
    }
}
