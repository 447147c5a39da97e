//! Document upload and session installation.
//!
//! A successful upload returns a server-issued `session_id`, which becomes the
//! active session. Concurrent uploads are not serialised here: whichever
//! finishes last owns the session.

use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::client::build_http_client;
use crate::config::PapertalkConfig;
use crate::error::{ChatError, PapertalkError};
use crate::models::Session;
use crate::session::SessionStore;

const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    session_id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    client: Client,
    config: PapertalkConfig,
    sessions: SessionStore,
}

impl UploadCoordinator {
    pub fn new(config: PapertalkConfig, sessions: SessionStore) -> Result<Self, PapertalkError> {
        let client = build_http_client(&config)?;
        Ok(Self::with_client(client, config, sessions))
    }

    pub fn with_client(client: Client, config: PapertalkConfig, sessions: SessionStore) -> Self {
        Self {
            client,
            config,
            sessions,
        }
    }

    /// Read a file from disk and upload it under its own file name.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<Arc<Session>, ChatError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        self.upload_bytes(file_name, bytes).await
    }

    /// Upload an in-memory artifact as a single multipart request and install
    /// the returned session. The store is untouched on any failure.
    pub async fn upload_bytes(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Arc<Session>, ChatError> {
        let file_name = file_name.into();
        let size = bytes.len();
        let part = Part::bytes(bytes).file_name(file_name.clone());
        let form = Form::new().part(FILE_FIELD, part);

        let url = self.config.upload_url();
        tracing::info!(url = %url, file = %file_name, size, "Uploading document");

        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), detail = %detail, "Upload rejected");
            return Err(ChatError::RequestFailed { status, detail });
        }

        let body = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::InvalidResponse(format!("upload response: {e}")))?;

        let token = match parsed.session_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                tracing::error!(
                    server_message = parsed.message.as_deref().unwrap_or(""),
                    "Upload succeeded without a session_id"
                );
                return Err(ChatError::UploadContractViolation);
            }
        };

        if let Some(message) = parsed.message.as_deref() {
            tracing::debug!(server_message = message, "Upload acknowledged");
        }
        Ok(self.sessions.put(token))
    }
}
