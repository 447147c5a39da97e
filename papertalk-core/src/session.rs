//! Process-wide single-slot session storage.
//!
//! The store starts empty on every run and is never persisted. Cloning a
//! `SessionStore` shares the same slot, so the upload path, the chat client and
//! the message log all observe one session.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::models::Session;

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    slot: Arc<ArcSwapOption<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session for `token`, replacing any previous one.
    pub fn put(&self, token: impl Into<String>) -> Arc<Session> {
        let session = Arc::new(Session::for_upload(token));
        let previous = self.slot.swap(Some(session.clone()));
        tracing::info!(
            token_len = session.token.len(),
            replaced = previous.is_some(),
            "Session installed"
        );
        session
    }

    pub fn get(&self) -> Option<Arc<Session>> {
        self.slot.load_full()
    }

    pub fn token(&self) -> Option<String> {
        self.get().map(|s| s.token.clone())
    }

    pub fn is_active(&self) -> bool {
        self.slot.load().is_some()
    }

    pub fn clear(&self) {
        if self.slot.swap(None).is_some() {
            tracing::info!("Session cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = SessionStore::new();
        assert!(store.get().is_none());
        assert!(store.token().is_none());
        assert!(!store.is_active());
    }

    #[test]
    fn test_put_overwrites_previous_token() {
        let store = SessionStore::new();
        store.put("first");
        store.put("second");

        let session = store.get().expect("session should be present");
        assert_eq!(session.token, "second");
        assert!(session.has_artifact);
    }

    #[test]
    fn test_clones_share_one_slot() {
        let store = SessionStore::new();
        let other = store.clone();

        store.put("shared");
        assert_eq!(other.token().as_deref(), Some("shared"));

        other.clear();
        assert!(store.token().is_none());
    }

    #[test]
    fn test_clear_on_empty_store_is_noop() {
        let store = SessionStore::new();
        store.clear();
        assert!(!store.is_active());
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_tokens() {
        let store = SessionStore::new();
        store.put("a".repeat(64));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    if i % 2 == 0 {
                        store.put("b".repeat(64));
                    } else {
                        store.put("a".repeat(64));
                    }
                }
            })
        };

        for _ in 0..500 {
            let token = store.token().expect("slot is never cleared here");
            assert!(token == "a".repeat(64) || token == "b".repeat(64));
        }
        writer.join().unwrap();
    }
}
