use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method},
    response::Response,
};
use tracing::debug;

use crate::auth::{AdminUser, TeamApiKeyAuth};
use crate::clients::vulmatch::{ForwardRequest, ForwardResponse};
use crate::errors::{CoreError, CoreResult};
use crate::server::app::AppState;

fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

fn relay(upstream: ForwardResponse) -> CoreResult<Response> {
    let mut builder = Response::builder().status(upstream.status);
    if let Some(content_type) = upstream.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(upstream.body))
        .map_err(|e| CoreError::internal("Invalid upstream response").with_source(e))
}

async fn forward(
    state: &AppState,
    method: Method,
    path: String,
    raw_query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> CoreResult<Response> {
    let request = ForwardRequest {
        method,
        query: query_pairs(raw_query.as_deref()),
        path,
        headers,
        body,
    };
    let upstream = state.vulmatch.forward(request).await?;
    relay(upstream)
}

/// Read-only access to the Vulmatch API for holders of a team key.
pub async fn forward_public(
    State(state): State<AppState>,
    auth: TeamApiKeyAuth,
    method: Method,
    Path(path): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> CoreResult<Response> {
    if method != Method::GET {
        return Err(CoreError::method_not_allowed(method.as_str()));
    }
    debug!("Team {} reads /api/v1/{}", auth.team.id, path);
    forward(&state, method, path, raw_query, headers, body).await
}

pub async fn forward_admin(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    method: Method,
    Path(path): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> CoreResult<Response> {
    debug!("Admin {} forwards {} /api/v1/{}", user.id, method, path);
    forward(&state, method, path, raw_query, headers, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_query_pairs_keep_repeats_and_decoding() {
        let pairs = query_pairs(Some("cve_id=CVE-2024-1&sort=a%20b&cve_id=CVE-2024-2"));
        assert_eq!(
            pairs,
            vec![
                ("cve_id".to_string(), "CVE-2024-1".to_string()),
                ("sort".to_string(), "a b".to_string()),
                ("cve_id".to_string(), "CVE-2024-2".to_string()),
            ]
        );
        assert!(query_pairs(None).is_empty());
    }

    #[test]
    fn test_relay_keeps_status_and_content_type() {
        let response = relay(ForwardResponse {
            status: StatusCode::MOVED_PERMANENTLY,
            content_type: Some("text/html".into()),
            body: Bytes::from_static(b"moved"),
        })
        .unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    }
}
