pub mod citation;
pub mod message;
pub mod session;

pub use citation::Citation;
pub use message::{Message, MessageMetadata, MessageState, Role};
pub use session::Session;
