//! OpenAPI documents served by this service: the stored upstream schemas
//! merged with the locally described endpoints.

pub mod generator;
pub mod merge;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::error;
use utoipa::OpenApi;

use crate::errors::{CoreError, UpstreamError};

pub use merge::{
    extract_paths_and_schemas, find_unresolved_references, merge_components, merge_paths,
    resolve_schemas,
};

pub const TITLE: &str = "Vulmatch Web API";
pub const VERSION: &str = "1.0.0";
pub const DESCRIPTION: &str = "Generate a Vulmatch API Key in your Account Settings in the Vulmatch web app. This documentation is interactive. Click \"Authorize\", enter your API key, expand the endpoint you want to use, and click \"Try it out\".\n\n[Back to Vulmatch Web](https://app.vulmatch.com)";
pub const ADMIN_TOKEN_OPERATION: &str = "users_admin_token_create";

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write schema {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Could not fetch upstream schema: {0}")]
    Fetch(#[from] UpstreamError),

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

impl From<SchemaError> for CoreError {
    fn from(err: SchemaError) -> Self {
        error!("Schema unavailable: {}", err);
        match err {
            SchemaError::Read { .. } => {
                CoreError::unavailable("API schema has not been generated").with_source(err)
            }
            other => CoreError::internal("Invalid API schema").with_source(other),
        }
    }
}

/// Endpoints of this service that are published in the admin document.
#[derive(OpenApi)]
#[openapi(
    paths(crate::server::handlers::auth::admin_token),
    components(schemas(crate::server::handlers::auth::TokenView))
)]
pub struct ApiDoc;

pub fn api_key_security() -> Value {
    json!([{ "api_key": [] }])
}

pub fn api_key_scheme(header: &str, description: Option<&str>) -> Value {
    let mut scheme = json!({"type": "apiKey", "in": "header", "name": header});
    if let (Some(description), Some(scheme)) = (description, scheme.as_object_mut()) {
        scheme.insert("description".into(), Value::String(description.into()));
    }
    json!({ "api_key": scheme })
}

pub fn load_schema(path: &Path) -> Result<Value, SchemaError> {
    let content = fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn object_at(document: &Value, key: &str) -> Map<String, Value> {
    document
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn merged_document(local: &Value, stored: &Value, security_schemes: Value) -> Value {
    let mut components = merge_components(&object_at(local, "components"), &object_at(stored, "components"));
    components.insert("securitySchemes".into(), security_schemes);
    let paths = merge_paths(&object_at(stored, "paths"), &object_at(local, "paths"));

    json!({
        "openapi": "3.0.0",
        "info": {"title": TITLE, "version": VERSION, "description": DESCRIPTION},
        "components": components,
        "paths": paths,
    })
}

/// Public document: nothing local is published, and unreferenced schemas
/// are pruned.
pub fn public_document(stored: &Value) -> Value {
    let mut document = merged_document(&json!({}), stored, api_key_scheme("API-KEY", None));
    resolve_schemas(&mut document);
    document
}

/// Keeps only the admin token operation of `local`, marked as needing the
/// token header.
pub fn admin_local_paths(local: &Value) -> Map<String, Value> {
    let mut paths = Map::new();
    let Some(local_paths) = local.get("paths").and_then(Value::as_object) else {
        return paths;
    };
    for (path, methods) in local_paths.iter().filter(|(path, _)| path.contains("user")) {
        let Some(methods) = methods.as_object() else {
            continue;
        };
        let found = methods.iter().find(|(_, operation)| {
            operation.get("operationId").and_then(Value::as_str) == Some(ADMIN_TOKEN_OPERATION)
        });
        if let Some((method, operation)) = found {
            let mut operation = operation.clone();
            if let Some(fields) = operation.as_object_mut() {
                fields.insert("security".into(), api_key_security());
                fields.insert("tags".into(), json!(["User"]));
            }
            paths.insert(path.clone(), json!({ method: operation }));
        }
    }
    paths
}

pub fn local_admin_schema() -> Result<Value, SchemaError> {
    let mut local = serde_json::to_value(ApiDoc::openapi())?;
    let paths = admin_local_paths(&local);
    if let Some(root) = local.as_object_mut() {
        root.insert("paths".into(), Value::Object(paths));
    }
    Ok(local)
}

pub fn admin_document(stored: &Value) -> Result<Value, SchemaError> {
    let local = local_admin_schema()?;
    Ok(merged_document(
        &local,
        stored,
        api_key_scheme(
            "Authorization",
            Some("Token-based authentication with required prefix \"Token\""),
        ),
    ))
}
