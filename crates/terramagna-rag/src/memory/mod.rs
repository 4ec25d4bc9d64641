//! Conversation memory and delivery bookkeeping
//!
//! In-memory only: sessions and seen message ids are lost on restart.

pub mod seen_messages;

pub use seen_messages::SeenMessages;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::types::ConversationMessage;

/// One user message and the reply it received.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    pub id: String,
    history: VecDeque<Exchange>,
    max_exchanges: usize,
    pub last_activity: DateTime<Utc>,
}

impl ConversationSession {
    fn new(id: String, max_exchanges: usize, now: DateTime<Utc>) -> Self {
        Self {
            id,
            history: VecDeque::with_capacity(max_exchanges + 1),
            max_exchanges,
            last_activity: now,
        }
    }

    /// Append an exchange, dropping the oldest beyond the configured depth.
    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        let now = Utc::now();
        self.history.push_back(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
            at: now,
        });
        while self.history.len() > self.max_exchanges {
            self.history.pop_front();
        }
        self.last_activity = now;
    }

    /// History flattened into alternating user/assistant messages, oldest first.
    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.history
            .iter()
            .flat_map(|e| {
                [
                    ConversationMessage {
                        role: "user".to_string(),
                        content: e.user.clone(),
                    },
                    ConversationMessage {
                        role: "assistant".to_string(),
                        content: e.assistant.clone(),
                    },
                ]
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Shared handle; holding its lock serialises a whole conversational turn.
pub type SessionHandle = Arc<tokio::sync::Mutex<ConversationSession>>;

struct Slot {
    session: SessionHandle,
    last_activity: DateTime<Utc>,
}

/// Per-identifier conversation sessions with TTL and LRU capacity eviction.
pub struct SessionStore {
    sessions: Mutex<LruCache<String, Slot>>,
    ttl: Duration,
    history_depth: usize,
}

impl SessionStore {
    pub fn new(config: &MemoryConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl: i64::try_from(config.session_ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            history_depth: config.history_depth.max(1),
        }
    }

    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        self.get_or_create_at(id, Utc::now())
    }

    pub(crate) fn get_or_create_at(&self, id: &str, now: DateTime<Utc>) -> SessionHandle {
        let mut sessions = self.sessions.lock();

        if let Some(slot) = sessions.get_mut(id) {
            if now - slot.last_activity <= self.ttl {
                slot.last_activity = now;
                return slot.session.clone();
            }
            tracing::debug!(session = %id, "Session expired, starting fresh");
        }

        let session = Arc::new(tokio::sync::Mutex::new(ConversationSession::new(
            id.to_string(),
            self.history_depth,
            now,
        )));
        let evicted = sessions.push(
            id.to_string(),
            Slot {
                session: session.clone(),
                last_activity: now,
            },
        );
        if let Some((old_id, _)) = evicted.filter(|(old_id, _)| old_id != id) {
            tracing::debug!(session = %old_id, "Evicted least recently used session");
        }
        session
    }

    pub async fn append_exchange(&self, id: &str, user: &str, assistant: &str) {
        let handle = self.get_or_create(id);
        handle.lock().await.push_exchange(user, assistant);
    }

    /// Stored history for `id`, empty when the session is unknown or expired.
    pub async fn history(&self, id: &str) -> Vec<ConversationMessage> {
        let handle = {
            let sessions = self.sessions.lock();
            match sessions.peek(id) {
                Some(slot) if Utc::now() - slot.last_activity <= self.ttl => slot.session.clone(),
                _ => return Vec::new(),
            }
        };
        let session = handle.lock().await;
        session.messages()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions idle for longer than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub(crate) fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, slot)| now - slot.last_activity > self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            sessions.pop(id);
        }
        expired.len()
    }
}
