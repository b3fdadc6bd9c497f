//! Brevo transactional email API.

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Settings;
use crate::errors::MailError;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_content: String,
}

#[derive(Clone)]
pub struct BrevoClient {
    http: Client,
    api_base: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
}

impl BrevoClient {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http: super::http_client(),
            api_base: settings.brevo_api_base.trim_end_matches('/').to_string(),
            api_key: settings.brevo_key.clone(),
            sender_name: settings.email_sender_name.clone(),
            sender_email: settings.email_sender_address.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Sends one message. Without an API key the message is logged and dropped.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if !self.is_configured() {
            warn!(
                "Brevo key not configured, skipping email \"{}\" to {}",
                email.subject, email.to_email
            );
            return Ok(());
        }

        let to_name = email.to_name.clone().unwrap_or_else(|| email.to_email.clone());
        let response = self
            .http
            .post(format!("{}/v3/smtp/email", self.api_base))
            .header("api-key", &self.api_key)
            .json(&json!({
                "sender": {"name": self.sender_name, "email": self.sender_email},
                "to": [{"email": email.to_email, "name": to_name}],
                "subject": email.subject,
                "htmlContent": email.html_content,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Sent \"{}\" to {}", email.subject, email.to_email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to_email: "invitee@example.com".to_string(),
            to_name: None,
            subject: "Invitation".to_string(),
            html_content: "<p>hi</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_with_api_key() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v3/smtp/email")
                    .header("api-key", "brevo-key")
                    .body_contains("invitee@example.com");
                then.status(201).json_body(json!({"messageId": "1"}));
            })
            .await;

        let settings = Settings {
            brevo_key: "brevo-key".to_string(),
            brevo_api_base: server.base_url(),
            ..Settings::default()
        };
        BrevoClient::from_settings(&settings).send(&email()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v3/smtp/email");
                then.status(401).body("unauthorized");
            })
            .await;

        let settings = Settings {
            brevo_key: "bad".to_string(),
            brevo_api_base: server.base_url(),
            ..Settings::default()
        };
        let err = BrevoClient::from_settings(&settings).send(&email()).await.unwrap_err();
        assert!(matches!(err, MailError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_missing_key_is_a_noop() {
        let client = BrevoClient::from_settings(&Settings::default());
        assert!(client.send(&email()).await.is_ok());
    }
}
