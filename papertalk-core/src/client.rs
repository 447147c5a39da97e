//! Streaming chat client.
//!
//! Sends a query to the document-chat or research-chat endpoint and hands back
//! a [`StreamHandle`] over the raw response body. The body carries UTF-8 text
//! with no inner framing; the end of the body is the end of the answer.

use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, Response};
use serde::Serialize;

use crate::config::PapertalkConfig;
use crate::decoder::ChunkDecoder;
use crate::error::{ChatError, PapertalkError};
use crate::session::SessionStore;

/// Which endpoint a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Questions about the uploaded document. Needs an active session.
    Document,
    /// Open research questions. No session; answers are mined for citations.
    Research,
}

impl QueryMode {
    pub fn requires_session(self) -> bool {
        matches!(self, QueryMode::Document)
    }

    pub fn extracts_citations(self) -> bool {
        matches!(self, QueryMode::Research)
    }

    pub fn send_options(self) -> SendOptions {
        SendOptions {
            require_session: self.requires_session(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Session-bound request: fail fast without a session and attach the
    /// session header. Otherwise the research endpoint is used.
    pub require_session: bool,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    config: PapertalkConfig,
    sessions: SessionStore,
}

impl ChatClient {
    pub fn new(config: PapertalkConfig, sessions: SessionStore) -> Result<Self, PapertalkError> {
        let client = build_http_client(&config)?;
        Ok(Self::with_client(client, config, sessions))
    }

    /// Reuse an existing connection pool.
    pub fn with_client(client: Client, config: PapertalkConfig, sessions: SessionStore) -> Self {
        Self {
            client,
            config,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn config(&self) -> &PapertalkConfig {
        &self.config
    }

    /// Issue a query and return a handle over the streamed answer.
    ///
    /// With `require_session` and no session installed this fails with
    /// [`ChatError::NoActiveSession`] before any network I/O.
    pub async fn send(&self, query: &str, options: SendOptions) -> Result<StreamHandle, ChatError> {
        let (url, token) = if options.require_session {
            let token = self.sessions.token().ok_or(ChatError::NoActiveSession)?;
            (self.config.chat_url(), Some(token))
        } else {
            (self.config.research_url(), None)
        };

        let mut request = self.client.post(&url).json(&QueryBody { query });
        if let Some(token) = token {
            request = request.header(self.config.endpoints.session_header.as_str(), token);
        }

        tracing::debug!(url = %url, query_len = query.len(), "Sending chat request");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), detail = %detail, url = %url, "Chat request rejected");
            return Err(ChatError::RequestFailed { status, detail });
        }

        Ok(StreamHandle::new(response))
    }
}

pub(crate) fn build_http_client(config: &PapertalkConfig) -> Result<Client, PapertalkError> {
    Ok(Client::builder()
        .connect_timeout(config.http.connect_timeout())
        .build()?)
}

/// Exclusive handle over one response body. Dropping it abandons the stream.
#[derive(Debug)]
pub struct StreamHandle {
    response: Option<Response>,
}

impl StreamHandle {
    fn new(response: Response) -> Self {
        Self {
            response: Some(response),
        }
    }

    /// Wait for the next raw chunk.
    ///
    /// `Ok(None)` signals the end of the body and `Err` a transport failure;
    /// either is reported once, after which the handle is finished.
    ///
    /// # Panics
    ///
    /// Panics if called after a terminal signal.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, ChatError> {
        let Some(response) = self.response.as_mut() else {
            panic!("StreamHandle::next_chunk called after the stream finished");
        };

        match response.chunk().await {
            Ok(Some(bytes)) => Ok(Some(bytes)),
            Ok(None) => {
                self.response = None;
                Ok(None)
            }
            Err(e) => {
                self.response = None;
                Err(ChatError::TransportInterrupted(e.to_string()))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.response.is_none()
    }

    /// Decoded text chunks, in arrival order. The stream yields at most one
    /// error and ends after it.
    pub fn into_text_stream(self) -> impl Stream<Item = Result<String, ChatError>> {
        futures::stream::unfold(Some((self, ChunkDecoder::new())), |state| async move {
            let Some((mut handle, mut decoder)) = state else {
                return None;
            };
            match handle.next_chunk().await {
                Ok(Some(bytes)) => {
                    let text = decoder.feed(&bytes);
                    Some((Ok(text), Some((handle, decoder))))
                }
                Ok(None) => {
                    let tail = decoder.finish();
                    if tail.is_empty() {
                        None
                    } else {
                        Some((Ok(tail), None))
                    }
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
