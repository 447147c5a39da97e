//! The conversation's message log and per-message state machine.
//!
//! Each turn adds one user message and one assistant placeholder. The
//! assistant message then moves `Pending -> Streaming -> Complete`, or to
//! `Errored` from any non-terminal state. Terminal messages only accept a
//! single metadata attachment afterwards.

use crate::error::MessageError;
use crate::models::{Citation, Message, MessageMetadata, MessageState, Role};
use crate::session::SessionStore;

/// Shown in place of any partial answer when a turn fails.
pub const FAILURE_NOTICE: &str =
    "Sorry, there was an error processing your request. Please try again.";

#[derive(Debug)]
pub struct MessageLog {
    messages: Vec<Message>,
    sessions: SessionStore,
    /// Assistant message created by the most recent `begin_turn`.
    current_turn: Option<String>,
    awaiting_first_response: bool,
}

impl MessageLog {
    pub fn new(sessions: SessionStore) -> Self {
        Self {
            messages: Vec::new(),
            sessions,
            current_turn: None,
            awaiting_first_response: false,
        }
    }

    /// Append the user's query and a `Pending` assistant message, returning
    /// the assistant message id.
    pub fn begin_turn(&mut self, query: impl Into<String>) -> String {
        let user = Message::user(query);
        let assistant = Message::assistant_placeholder();
        let id = assistant.id.clone();

        self.messages.push(user);
        self.messages.push(assistant);
        self.current_turn = Some(id.clone());
        self.awaiting_first_response = true;

        tracing::debug!(message_id = %id, "Turn started");
        id
    }

    pub fn append_chunk(&mut self, id: &str, text: &str) -> Result<(), MessageError> {
        let message = self.open_assistant_mut(id)?;
        message.state = MessageState::Streaming;
        message.content.push_str(text);
        self.mark_responded(id);
        Ok(())
    }

    /// Calling `complete` again on a `Complete` message is a no-op.
    pub fn complete(&mut self, id: &str) -> Result<(), MessageError> {
        let message = self.assistant_mut(id)?;
        match message.state {
            MessageState::Complete => return Ok(()),
            MessageState::Errored => {
                return Err(MessageError::Terminal {
                    id: id.to_string(),
                    state: MessageState::Errored,
                });
            }
            MessageState::Pending | MessageState::Streaming => {
                message.state = MessageState::Complete;
            }
        }
        tracing::debug!(message_id = %id, content_len = message.content.len(), "Turn complete");
        self.mark_responded(id);
        Ok(())
    }

    /// Move a message to `Errored`, replacing whatever was streamed so far
    /// with [`FAILURE_NOTICE`]. `reason` is logged, never shown.
    pub fn fail(&mut self, id: &str, reason: &str) -> Result<(), MessageError> {
        let message = self.open_assistant_mut(id)?;
        let discarded = message.content.len();
        message.state = MessageState::Errored;
        message.content = FAILURE_NOTICE.to_string();
        tracing::warn!(message_id = %id, discarded_bytes = discarded, reason, "Turn failed");
        self.mark_responded(id);
        Ok(())
    }

    pub fn attach_metadata(&mut self, id: &str, citations: Vec<Citation>) -> Result<(), MessageError> {
        let message = self.assistant_mut(id)?;
        if message.state != MessageState::Complete {
            return Err(MessageError::NotComplete {
                id: id.to_string(),
                state: message.state,
            });
        }
        if message.metadata.is_some() {
            return Err(MessageError::MetadataAlreadyAttached(id.to_string()));
        }
        message.metadata = Some(MessageMetadata { citations });
        Ok(())
    }

    /// True from `begin_turn` until the current turn first hears back: its
    /// first chunk (even an empty one), completion, or failure.
    pub fn is_responding(&self) -> bool {
        self.awaiting_first_response
    }

    /// True while the current turn's assistant message is not terminal.
    pub fn is_in_flight(&self) -> bool {
        self.current_turn
            .as_deref()
            .and_then(|id| self.get(id))
            .is_some_and(|m| !m.state.is_terminal())
    }

    /// Drop every message and the active session.
    pub fn clear(&mut self) {
        let dropped = self.messages.len();
        self.messages.clear();
        self.current_turn = None;
        self.awaiting_first_response = false;
        self.sessions.clear();
        tracing::info!(dropped, "Conversation cleared");
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn current_turn(&self) -> Option<&str> {
        self.current_turn.as_deref()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn mark_responded(&mut self, id: &str) {
        if self.current_turn.as_deref() == Some(id) {
            self.awaiting_first_response = false;
        }
    }

    fn assistant_mut(&mut self, id: &str) -> Result<&mut Message, MessageError> {
        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == id)
            .ok_or_else(|| MessageError::UnknownMessage(id.to_string()))?;
        if message.role != Role::Assistant {
            return Err(MessageError::NotAssistant(id.to_string()));
        }
        Ok(message)
    }

    fn open_assistant_mut(&mut self, id: &str) -> Result<&mut Message, MessageError> {
        let message = self.assistant_mut(id)?;
        if message.state.is_terminal() {
            return Err(MessageError::Terminal {
                id: id.to_string(),
                state: message.state,
            });
        }
        Ok(message)
    }
}
