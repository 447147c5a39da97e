use serde::{Deserialize, Serialize};

/// A paper reference mined from a finished assistant answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    pub source_url: String,
    pub fetch_url: String,
    pub summary: String,
}
