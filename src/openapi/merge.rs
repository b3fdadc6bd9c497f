//! Stitching of two independently generated OpenAPI documents.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";
const PROXIED_PATH_PREFIX: &str = "/vulmatch_api/api/v1/";
const PUBLIC_PATH_PREFIX: &str = "/v1/";

/// Shallow-updates `target` with the entries of `source`.
fn update(target: &mut Value, source: &Value) {
    if let (Some(target), Some(source)) = (target.as_object_mut(), source.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Keys of `second` missing from `first` are added. Shared keys holding an
/// object in `second` are shallow-updated; other shared keys keep `first`.
pub fn merge_components(first: &Map<String, Value>, second: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = first.clone();
    for (key, value) in second {
        match merged.get_mut(key) {
            None => {
                merged.insert(key.clone(), value.clone());
            }
            Some(existing) if value.is_object() => update(existing, value),
            Some(_) => {}
        }
    }
    merged
}

pub fn rewrite_path(path: &str) -> String {
    path.replace(PROXIED_PATH_PREFIX, PUBLIC_PATH_PREFIX)
}

/// Merges the path maps in order. Methods already present are
/// shallow-updated by later documents.
pub fn merge_paths(first: &Map<String, Value>, second: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    for paths in [first, second] {
        for (original_path, methods) in paths {
            let path = rewrite_path(original_path);
            let Some(existing) = merged.get_mut(&path).and_then(Value::as_object_mut) else {
                merged.insert(path, methods.clone());
                continue;
            };
            let Some(methods) = methods.as_object() else {
                continue;
            };
            for (method, details) in methods {
                match existing.get_mut(method) {
                    Some(current) => update(current, details),
                    None => {
                        existing.insert(method.clone(), details.clone());
                    }
                }
            }
        }
    }
    merged
}

/// `$ref`s used directly as response content schemas.
pub fn extract_paths_and_schemas(document: &Value) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return refs;
    };

    let operations = paths
        .values()
        .filter_map(Value::as_object)
        .flat_map(|methods| methods.values());
    for operation in operations {
        let Some(responses) = operation.get("responses").and_then(Value::as_object) else {
            continue;
        };
        for response in responses.values() {
            let Some(content) = response.get("content").and_then(Value::as_object) else {
                continue;
            };
            for media in content.values() {
                if let Some(reference) = media
                    .get("schema")
                    .and_then(|schema| schema.get("$ref"))
                    .and_then(Value::as_str)
                {
                    refs.insert(reference.to_string());
                }
            }
        }
    }
    refs
}

fn ref_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

fn collect_refs(value: &Value, refs: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("$ref", Value::String(reference)) => {
                        refs.insert(reference.clone());
                    }
                    _ => collect_refs(value, refs),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        _ => {}
    }
}

/// `$ref`s inside `schemas` whose target name is not a key of `schemas`.
pub fn find_unresolved_references(schemas: &Map<String, Value>) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    for schema in schemas.values() {
        collect_refs(schema, &mut refs);
    }
    refs.retain(|reference| !schemas.contains_key(ref_name(reference)));
    refs
}

/// Prunes `components.schemas` down to what responses reference, plus
/// everything those reference in turn. References to missing schemas are
/// skipped.
pub fn resolve_schemas(document: &mut Value) {
    let used = extract_paths_and_schemas(document);
    let Some(schemas) = document
        .pointer_mut("/components/schemas")
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    let mut kept: Map<String, Value> = schemas
        .iter()
        .filter(|(name, _)| used.contains(&format!("{}{}", SCHEMA_REF_PREFIX, name)))
        .map(|(name, schema)| (name.clone(), schema.clone()))
        .collect();

    loop {
        let mut added = false;
        for reference in find_unresolved_references(&kept) {
            let name = ref_name(&reference);
            if let Some(schema) = schemas.get(name) {
                kept.insert(name.to_string(), schema.clone());
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    *schemas = kept;
}
