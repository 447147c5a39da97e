use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binding between a server-issued session token and an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub has_artifact: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session produced by a successful upload.
    pub fn for_upload(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            has_artifact: true,
            created_at: Utc::now(),
        }
    }
}
