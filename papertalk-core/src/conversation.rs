//! Turn driver.
//!
//! `Conversation` owns the message log and wires one turn end to end:
//! session check, request, incremental decode into the assistant message,
//! terminal transition and, for research queries, citation mining. The
//! presentation layer reads the log and follows progress through a
//! [`TurnObserver`]; it never touches the response stream itself.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

use crate::citations::extract_citations;
use crate::client::{build_http_client, ChatClient, QueryMode};
use crate::config::PapertalkConfig;
use crate::error::{ChatError, PapertalkError};
use crate::messages::MessageLog;
use crate::models::{Message, MessageState, Session};
use crate::session::SessionStore;
use crate::upload::UploadCoordinator;

/// Progress callbacks for one turn. All methods default to no-ops.
pub trait TurnObserver: Send {
    fn on_turn_started(&mut self, _message_id: &str) {}

    /// Fired once per turn, on the first decoded chunk.
    fn on_first_response(&mut self, _message_id: &str, _latency: Duration) {}

    fn on_chunk(&mut self, _message_id: &str, _text: &str) {}

    fn on_completed(&mut self, _message: &Message) {}

    fn on_failed(&mut self, _message_id: &str, _error: &ChatError) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// How a turn ended. Failures after the turn started are reported here with
/// `state == Errored` rather than as an `Err`.
#[derive(Debug)]
pub struct TurnOutcome {
    pub message_id: String,
    pub state: MessageState,
    pub first_chunk_after: Option<Duration>,
    pub citation_count: usize,
    pub error: Option<ChatError>,
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == MessageState::Complete
    }
}

pub struct Conversation {
    log: MessageLog,
    sessions: SessionStore,
    client: ChatClient,
    uploader: UploadCoordinator,
    observer: Box<dyn TurnObserver>,
}

impl Conversation {
    /// Fresh conversation with an empty session slot.
    pub fn new(config: PapertalkConfig) -> Result<Self, PapertalkError> {
        Self::with_sessions(config, SessionStore::new())
    }

    pub fn with_sessions(config: PapertalkConfig, sessions: SessionStore) -> Result<Self, PapertalkError> {
        let http = build_http_client(&config)?;
        let client = ChatClient::with_client(http.clone(), config.clone(), sessions.clone());
        let uploader = UploadCoordinator::with_client(http, config, sessions.clone());
        Ok(Self {
            log: MessageLog::new(sessions.clone()),
            sessions,
            client,
            uploader,
            observer: Box::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn set_observer(&mut self, observer: Box<dyn TurnObserver>) {
        self.observer = observer;
    }

    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<Arc<Session>, ChatError> {
        self.uploader.upload_file(path).await
    }

    pub async fn upload_bytes(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Arc<Session>, ChatError> {
        self.uploader.upload_bytes(file_name, bytes).await
    }

    /// Run one turn to its terminal state.
    ///
    /// Returns `Err` only when the turn never started (blank query, or a
    /// document query without a session); the log is unchanged in that case.
    pub async fn submit(&mut self, query: &str, mode: QueryMode) -> Result<TurnOutcome, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if mode.requires_session() && !self.sessions.is_active() {
            tracing::warn!("Document query refused: no active session");
            return Err(ChatError::NoActiveSession);
        }

        let id = self.log.begin_turn(query);
        self.observer.on_turn_started(&id);

        let started = Instant::now();
        let handle = match self.client.send(query, mode.send_options()).await {
            Ok(handle) => handle,
            Err(e) => return self.fail_turn(id, e, None),
        };

        let stream = handle.into_text_stream();
        futures::pin_mut!(stream);

        let mut first_chunk_after = None;
        while let Some(item) = stream.next().await {
            let text = match item {
                Ok(text) => text,
                Err(e) => return self.fail_turn(id, e, first_chunk_after),
            };

            if first_chunk_after.is_none() {
                let latency = started.elapsed();
                first_chunk_after = Some(latency);
                tracing::info!(
                    message_id = %id,
                    first_byte_ms = latency.as_millis() as u64,
                    "First response chunk"
                );
                self.observer.on_first_response(&id, latency);
            }

            self.log.append_chunk(&id, &text)?;
            self.observer.on_chunk(&id, &text);
        }

        self.log.complete(&id)?;

        let mut citation_count = 0;
        if mode.extracts_citations() {
            let citations = self.log.get(&id).and_then(|m| extract_citations(&m.content));
            if let Some(citations) = citations {
                citation_count = citations.len();
                self.log.attach_metadata(&id, citations)?;
            }
        }

        tracing::info!(
            message_id = %id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            citations = citation_count,
            "Turn complete"
        );
        if let Some(message) = self.log.get(&id) {
            self.observer.on_completed(message);
        }

        Ok(TurnOutcome {
            message_id: id,
            state: MessageState::Complete,
            first_chunk_after,
            citation_count,
            error: None,
        })
    }

    fn fail_turn(
        &mut self,
        id: String,
        error: ChatError,
        first_chunk_after: Option<Duration>,
    ) -> Result<TurnOutcome, ChatError> {
        self.log.fail(&id, &error.to_string())?;
        self.observer.on_failed(&id, &error);
        Ok(TurnOutcome {
            message_id: id,
            state: MessageState::Errored,
            first_chunk_after,
            citation_count: 0,
            error: Some(error),
        })
    }

    /// Drop all messages and the active session.
    pub fn clear(&mut self) {
        self.log.clear();
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn is_responding(&self) -> bool {
        self.log.is_responding()
    }

    pub fn is_in_flight(&self) -> bool {
        self.log.is_in_flight()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.sessions.get()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}
