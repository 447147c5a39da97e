use reqwest::StatusCode;
use thiserror::Error;

use crate::models::MessageState;

#[derive(Error, Debug)]
pub enum PapertalkError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Other error: {0}")]
    Other(String),
}

/// Failures of a single upload or chat turn. None of these outlive the turn
/// that produced them.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No active session: upload a document first")]
    NoActiveSession,

    #[error("Query is empty")]
    EmptyQuery,

    #[error("Request failed ({status}): {detail}")]
    RequestFailed { status: StatusCode, detail: String },

    #[error("Transport interrupted mid-stream: {0}")]
    TransportInterrupted(String),

    #[error("Upload response did not contain a session_id")]
    UploadContractViolation,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message state error: {0}")]
    State(#[from] MessageError),
}

/// Rejected state-machine operations. A rejected operation leaves the log
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Unknown message id {0}")]
    UnknownMessage(String),

    #[error("Message {0} is not an assistant message")]
    NotAssistant(String),

    #[error("Message {id} is already {state:?}")]
    Terminal { id: String, state: MessageState },

    #[error("Message {id} is {state:?}, metadata needs a complete message")]
    NotComplete { id: String, state: MessageState },

    #[error("Metadata already attached to message {0}")]
    MetadataAlreadyAttached(String),
}
