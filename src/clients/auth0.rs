//! Auth0 Management and Authentication API client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Settings;
use crate::errors::Auth0Error;

pub type Auth0Result<T> = Result<T, Auth0Error>;

pub const MANAGEMENT_TOKEN_TTL: Duration = Duration::from_secs(10800);
pub const PASSWORD_CONNECTION: &str = "Username-Password-Authentication";

#[derive(Debug, Clone, Deserialize)]
pub struct Auth0User {
    pub user_id: String,
    pub email: Option<String>,
}

/// Subset of the `/userinfo` payload used at login.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

struct CachedToken {
    token: String,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct Auth0Client {
    http: Client,
    base_url: String,
    audience: String,
    client_id: String,
    client_secret: String,
    enabled: bool,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl Auth0Client {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http: super::http_client(),
            base_url: settings.auth0_url(),
            audience: settings.auth0_audience(),
            client_id: settings.auth0_client_id.clone(),
            client_secret: settings.auth0_client_secret.clone(),
            enabled: settings.auth0_enabled(),
            token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.enabled
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client-credentials token for the Management API, reused for
    /// [`MANAGEMENT_TOKEN_TTL`].
    pub async fn management_token(&self) -> Auth0Result<String> {
        if !self.enabled {
            return Err(Auth0Error::NotConfigured);
        }

        let mut cached = self.token.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < MANAGEMENT_TOKEN_TTL {
                return Ok(entry.token.clone());
            }
        }

        debug!("Fetching Auth0 management token");
        let response = self
            .http
            .post(format!("{}/oauth/token", self.base_url))
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "audience": self.audience,
            }))
            .send()
            .await?;
        let token: TokenResponse = parse_json(response, StatusCode::OK).await?;

        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            fetched_at: Instant::now(),
        });
        Ok(token.access_token)
    }

    pub async fn update_user(&self, auth0_user_id: &str, payload: &Value) -> Auth0Result<Value> {
        self.management(
            Method::PATCH,
            &format!("/api/v2/users/{}", auth0_user_id),
            Some(payload),
            StatusCode::OK,
        )
        .await
    }

    pub async fn users_by_email(&self, email: &str) -> Auth0Result<Vec<Auth0User>> {
        let token = self.management_token().await?;
        let response = self
            .http
            .get(format!("{}/api/v2/users-by-email", self.base_url))
            .query(&[("email", email)])
            .bearer_auth(token)
            .send()
            .await?;
        parse_json(response, StatusCode::OK).await
    }

    /// Triggers Auth0's verification email job. `auth0_user_id` must look like
    /// `provider|identity`.
    pub async fn send_verification_email(&self, auth0_user_id: &str) -> Auth0Result<()> {
        let (provider, identity) = split_user_id(auth0_user_id)?;
        let payload = json!({
            "user_id": auth0_user_id,
            "client_id": self.client_id,
            "identity": {"user_id": identity, "provider": provider},
        });
        let _: Value = self
            .management(
                Method::POST,
                "/api/v2/jobs/verification-email",
                Some(&payload),
                StatusCode::CREATED,
            )
            .await?;
        Ok(())
    }

    pub async fn change_password(&self, email: &str) -> Auth0Result<()> {
        let token = self.management_token().await?;
        let response = self
            .http
            .post(format!("{}/dbconnections/change_password", self.base_url))
            .bearer_auth(token)
            .json(&json!({
                "client_id": self.client_id,
                "email": email,
                "connection": PASSWORD_CONNECTION,
            }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(api_error(status, response).await);
        }
        Ok(())
    }

    pub async fn create_totp_method(&self, auth0_user_id: &str, secret: &str) -> Auth0Result<Value> {
        let payload = json!({
            "type": "totp",
            "name": "totp",
            "totp_secret": secret,
        });
        self.management(
            Method::POST,
            &format!("/api/v2/users/{}/authentication-methods", auth0_user_id),
            Some(&payload),
            StatusCode::CREATED,
        )
        .await
    }

    pub async fn userinfo(&self, access_token: &str) -> Auth0Result<UserInfo> {
        if !self.enabled {
            return Err(Auth0Error::NotConfigured);
        }
        let response = self
            .http
            .get(format!("{}/userinfo", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;
        parse_json(response, StatusCode::OK).await
    }

    async fn management(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        expected: StatusCode,
    ) -> Auth0Result<Value> {
        let token = self.management_token().await?;
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        let response = request.send().await?;
        parse_json(response, expected).await
    }
}

/// Accepts any 2xx; `expected` only documents the usual answer.
async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    expected: StatusCode,
) -> Auth0Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error(status, response).await);
    }
    if status != expected {
        debug!("Auth0 answered {} where {} was expected", status, expected);
    }

    let body = response.text().await?;
    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body).map_err(|_| Auth0Error::Api {
        status: status.as_u16(),
        body: Value::String(body.to_string()),
    })
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> Auth0Error {
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Auth0Error::Api {
        status: status.as_u16(),
        body,
    }
}

/// Splits `auth0|abc123` into `("auth0", "abc123")`.
pub fn split_user_id(auth0_user_id: &str) -> Auth0Result<(&str, &str)> {
    match auth0_user_id.split_once('|') {
        Some((provider, identity)) if !provider.is_empty() && !identity.is_empty() => {
            Ok((provider, identity))
        }
        _ => Err(Auth0Error::MalformedUserId(auth0_user_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> Auth0Client {
        let settings = Settings {
            auth0_domain: "tenant.auth0.com".to_string(),
            auth0_client_id: "client".to_string(),
            auth0_client_secret: "secret".to_string(),
            auth0_base_url: Some(server.base_url()),
            ..Settings::default()
        };
        Auth0Client::from_settings(&settings)
    }

    #[test]
    fn test_split_user_id() {
        assert_eq!(split_user_id("auth0|abc").unwrap(), ("auth0", "abc"));
        assert!(split_user_id("no-separator").is_err());
        assert!(split_user_id("|abc").is_err());
    }

    #[tokio::test]
    async fn test_management_token_is_cached() {
        let server = MockServer::start_async().await;
        let token_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .json_body_partial(r#"{"audience": "https://tenant.auth0.com/api/v2/"}"#);
                then.status(200).json_body(json!({"access_token": "mgmt"}));
            })
            .await;

        let client = client_for(&server);
        assert_eq!(client.management_token().await.unwrap(), "mgmt");
        assert_eq!(client.management_token().await.unwrap(), "mgmt");
        token_mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_update_user_error_keeps_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/token");
                then.status(200).json_body(json!({"access_token": "mgmt"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH).path("/api/v2/users/user-1");
                then.status(429).json_body(json!({"message": "Too many requests"}));
            })
            .await;

        let client = client_for(&server);
        let err = client
            .update_user("user-1", &json!({"email": "x@y.z"}))
            .await
            .unwrap_err();
        match err {
            Auth0Error::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body["message"], "Too many requests");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_client() {
        let client = Auth0Client::from_settings(&Settings::default());
        assert!(matches!(
            client.management_token().await,
            Err(Auth0Error::NotConfigured)
        ));
    }
}
