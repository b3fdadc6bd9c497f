use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime settings. Read from an optional TOML file, then overridden by the
/// environment variables the deployment already uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub database_url: String,
    pub cors_origin: Option<String>,

    pub vulmatch_service_base_url: String,
    pub frontend_base_url: String,
    pub invitation_url: String,
    pub schema_dir: PathBuf,

    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub stripe_webhook_secret: String,

    pub auth0_domain: String,
    pub auth0_client_id: String,
    pub auth0_client_secret: String,
    /// Overrides `https://{auth0_domain}`; used to point at a local mock.
    pub auth0_base_url: Option<String>,

    pub brevo_key: String,
    pub brevo_api_base: String,
    pub email_sender_name: String,
    pub email_sender_address: String,

    pub cve_sync_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8000,
            database_url: "sqlite://vulmatch_web.db?mode=rwc".to_string(),
            cors_origin: None,
            vulmatch_service_base_url: String::new(),
            frontend_base_url: String::new(),
            invitation_url: String::new(),
            schema_dir: PathBuf::from("schema"),
            stripe_secret_key: String::new(),
            stripe_api_base: "https://api.stripe.com".to_string(),
            stripe_webhook_secret: String::new(),
            auth0_domain: String::new(),
            auth0_client_id: String::new(),
            auth0_client_secret: String::new(),
            auth0_base_url: None,
            brevo_key: String::new(),
            brevo_api_base: "https://api.brevo.com".to_string(),
            email_sender_name: "Dogesec".to_string(),
            email_sender_address: "noreply@dogesec.com".to_string(),
            cve_sync_enabled: false,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        override_string(&mut self.database_url, "DATABASE_URL");
        override_string(&mut self.vulmatch_service_base_url, "VULMATCH_SERVICE_BASE_URL");
        override_string(&mut self.frontend_base_url, "FRONTEND_BASE_URL");
        override_string(&mut self.invitation_url, "INVITATION_URL");
        override_string(&mut self.stripe_secret_key, "STRIPE_SECRET_KEY");
        override_string(&mut self.stripe_api_base, "STRIPE_API_BASE");
        override_string(&mut self.stripe_webhook_secret, "DJSTRIPE_WEBHOOK_SECRET");
        override_string(&mut self.auth0_domain, "AUTH0_DOMAIN");
        override_string(&mut self.auth0_client_id, "AUTH0_CLIENT_ID");
        override_string(&mut self.auth0_client_secret, "AUTH0_CLIENT_SECRET");
        override_string(&mut self.brevo_key, "BREVO_KEY");
        override_string(&mut self.brevo_api_base, "BREVO_API_BASE");

        if let Ok(value) = env::var("AUTH0_BASE_URL") {
            self.auth0_base_url = Some(value);
        }
        if let Ok(value) = env::var("CORS_ORIGIN") {
            self.cors_origin = Some(value);
        }
        if let Ok(value) = env::var("SCHEMA_DIR") {
            self.schema_dir = PathBuf::from(value);
        }
        if let Ok(value) = env::var("PORT") {
            self.port = value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: value.clone(),
            })?;
        }
        if let Ok(value) = env::var("CVE_SYNC_ENABLED") {
            self.cve_sync_enabled = parse_flag(&value);
        }

        Ok(self)
    }

    pub fn stripe_enabled(&self) -> bool {
        !self.stripe_secret_key.is_empty()
    }

    pub fn auth0_enabled(&self) -> bool {
        !self.auth0_domain.is_empty() || self.auth0_base_url.is_some()
    }

    pub fn auth0_url(&self) -> String {
        match &self.auth0_base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.auth0_domain),
        }
    }

    /// Audience for the Management API; always derived from the real domain.
    pub fn auth0_audience(&self) -> String {
        format!("https://{}/api/v2/", self.auth0_domain)
    }

    /// Base of invitation links; an invitation id is appended to it.
    pub fn invitation_base_url(&self) -> String {
        if self.invitation_url.is_empty() {
            format!("{}/teams/invitation/", self.frontend_base_url)
        } else {
            self.invitation_url.clone()
        }
    }

    pub fn public_schema_path(&self) -> PathBuf {
        self.schema_dir.join("schema.json")
    }

    pub fn admin_schema_path(&self) -> PathBuf {
        self.schema_dir.join("admin-schema.json")
    }
}

fn override_string(target: &mut String, name: &str) {
    if let Ok(value) = env::var(name) {
        *target = value;
    }
}

fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}
