//! Builds the stored `schema.json` / `admin-schema.json` from the upstream
//! service's own OpenAPI document.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::clients::VulmatchClient;
use crate::common::write_json_file;
use crate::config::Settings;

use super::{api_key_security, api_key_scheme, SchemaError};

const PUBLIC_PREFIX: &str = "/vulmatch_api";
const ADMIN_PREFIX: &str = "/vulmatch_api/admin";

/// Upstream answers YAML by default; JSON is a subset so both parse.
pub fn parse_upstream(raw: &str) -> Result<Value, SchemaError> {
    let document: Value = serde_yaml::from_str(raw)?;
    if !document.is_object() {
        return Err(SchemaError::Invalid("upstream schema is not an object".into()));
    }
    Ok(document)
}

/// GET operations only, skipping schema and job endpoints, each requiring
/// the API key.
pub fn public_paths(document: &Value) -> Map<String, Value> {
    let mut paths = Map::new();
    let Some(upstream) = document.get("paths").and_then(Value::as_object) else {
        return paths;
    };
    for (path, methods) in upstream {
        if path.contains("schema") || path.contains("jobs") {
            continue;
        }
        let Some(get) = methods.get("get") else {
            continue;
        };
        let mut get = get.clone();
        if let Some(operation) = get.as_object_mut() {
            operation.insert("security".into(), api_key_security());
        }
        paths.insert(format!("{}{}", PUBLIC_PREFIX, path), json!({ "get": get }));
    }
    paths
}

pub fn admin_paths(document: &Value) -> Map<String, Value> {
    document
        .get("paths")
        .and_then(Value::as_object)
        .map(|upstream| {
            upstream
                .iter()
                .filter(|(path, _)| !path.contains("api/schema/"))
                .map(|(path, methods)| (format!("{}{}", ADMIN_PREFIX, path), methods.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Replaces the paths and installs the `api_key` scheme both as a
/// component and as the top-level requirement.
pub fn finish_document(mut document: Value, paths: Map<String, Value>) -> Value {
    if let Some(root) = document.as_object_mut() {
        root.insert("paths".into(), Value::Object(paths));

        let components = root
            .entry("components")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(components) = components.as_object_mut() {
            components.insert("securitySchemes".into(), api_key_scheme("API-KEY", None));
        }
        root.insert("security".into(), api_key_security());
    }
    document
}

pub fn public_document(upstream: &Value) -> Value {
    finish_document(upstream.clone(), public_paths(upstream))
}

pub fn admin_document(upstream: &Value) -> Value {
    finish_document(upstream.clone(), admin_paths(upstream))
}

/// Fetches the upstream document and writes both stored schemas under
/// `schema_dir`.
pub async fn generate(settings: &Settings) -> Result<(), SchemaError> {
    let client = VulmatchClient::from_settings(settings);
    let raw = client.fetch_schema().await?;
    let upstream = parse_upstream(&raw)?;

    info!("Generating user schema");
    let path = settings.public_schema_path();
    write_json_file(&path, &public_document(&upstream))
        .map_err(|source| SchemaError::Write { path: path.clone(), source })?;

    info!("Generating admin schema");
    let path = settings.admin_schema_path();
    write_json_file(&path, &admin_document(&upstream))
        .map_err(|source| SchemaError::Write { path: path.clone(), source })?;

    Ok(())
}
