pub mod citations;
pub mod client;
pub mod config;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod messages;
pub mod models;
pub mod session;
pub mod upload;

pub use citations::extract_citations;
pub use client::{ChatClient, QueryMode, SendOptions, StreamHandle};
pub use config::PapertalkConfig;
pub use conversation::{Conversation, NoopObserver, TurnObserver, TurnOutcome};
pub use decoder::ChunkDecoder;
pub use error::{ChatError, MessageError, PapertalkError};
pub use messages::{MessageLog, FAILURE_NOTICE};
pub use models::{Citation, Message, MessageMetadata, MessageState, Role, Session};
pub use session::SessionStore;
pub use upload::UploadCoordinator;
