use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PapertalkConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EndpointConfig {
    pub upload_path: String,
    pub chat_path: String,
    pub research_path: String,
    pub session_header: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            upload_path: "/api/chat/upload".to_string(),
            chat_path: "/api/chat".to_string(),
            research_path: "/api/research-chat".to_string(),
            session_header: "session-id".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    /// Applies to connection setup only. Response bodies are never timed out.
    pub connect_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl PapertalkConfig {
    /// Load from a TOML file (optional) layered under `PAPERTALK__*` env vars.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("PAPERTALK").prefix_separator("__").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Point every endpoint at a different server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.service.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        self.service.base_url.trim_end_matches('/')
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url(), self.endpoints.upload_path)
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url(), self.endpoints.chat_path)
    }

    pub fn research_url(&self) -> String {
        format!("{}{}", self.base_url(), self.endpoints.research_path)
    }
}
