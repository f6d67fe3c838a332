//! Keyed conversation sessions.
//!
//! A session holds the committed question/answer history for one caller
//! plus the retrieval options snapshotted when the session was created.
//! Sessions are created lazily on first use; an unknown id is
//! indistinguishable from a new conversation.
//!
//! Concurrency: the store's outer map is a `std::sync::RwLock` (held only
//! for lookup/insert, never across awaits); each session carries its own
//! `tokio::sync::Mutex`, which callers hold across the whole
//! retrieve-generate-commit span so concurrent queries against the same
//! session serialize instead of interleaving history.
//!
//! Sessions are never evicted; lifetime is bounded by the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::models::Exchange;

/// Retrieval behavior fixed per session at creation time.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub top_k: usize,
}

/// Mutable state of one conversation.
#[derive(Debug)]
pub struct ConversationState {
    pub history: Vec<Exchange>,
    pub retrieval: RetrievalOptions,
}

impl ConversationState {
    fn new(retrieval: RetrievalOptions) -> Self {
        Self {
            history: Vec::new(),
            retrieval,
        }
    }

    /// Commit one completed turn.
    pub fn push(&mut self, question: String, answer: String) {
        self.history.push(Exchange { question, answer });
    }
}

/// Process-wide session registry.
pub struct SessionStore {
    default_retrieval: RetrievalOptions,
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    pub fn new(default_retrieval: RetrievalOptions) -> Self {
        Self {
            default_retrieval,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the session for `id`, creating it if absent.
    pub fn session(&self, id: &str) -> Arc<Mutex<ConversationState>> {
        if let Some(session) = self.sessions.read().unwrap().get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().unwrap();
        // Double-check under the write lock: another caller may have
        // created it between the two lock acquisitions.
        Arc::clone(
            sessions
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new(self.default_retrieval)))),
        )
    }

    pub fn default_retrieval(&self) -> RetrievalOptions {
        self.default_retrieval
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
