//! Session storage and the per-client teach state machine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Default session timeout (30 minutes).
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Who said what in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

/// One line of a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Per-client state machine position.
///
/// `Normal` is the default. `AwaitingTeach` means the last message went
/// unrecognized and the next message from this client is treated as the
/// answer to `question`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TeachState {
    #[default]
    Normal,
    AwaitingTeach {
        /// Normalized form of the unanswered question.
        question: String,
    },
}

/// A single client session.
///
/// Cheap to clone; clones share the same underlying state.
#[derive(Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier.
    id: String,
    /// Transcript, oldest first.
    messages: RwLock<Vec<ChatMessage>>,
    /// Where this client sits in the teach flow.
    teach_state: RwLock<TeachState>,
    /// Session creation time.
    created_at: DateTime<Utc>,
    /// Last activity time.
    last_activity: RwLock<DateTime<Utc>>,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Session {
    /// Create a new session with the given ID.
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                messages: RwLock::new(Vec::new()),
                teach_state: RwLock::new(TeachState::Normal),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Current teach-flow position.
    #[must_use]
    pub fn teach_state(&self) -> TeachState {
        self.inner.teach_state.read().unwrap().clone()
    }

    /// Move the teach-flow state machine.
    pub fn set_teach_state(&self, state: TeachState) {
        let mut guard = self.inner.teach_state.write().unwrap();
        *guard = state;
        drop(guard);
        self.touch();
    }

    /// Append a user line to the transcript.
    pub fn add_user_message(&self, content: impl Into<String>) {
        self.add_message(ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        });
    }

    /// Append a bot line to the transcript.
    pub fn add_bot_message(&self, content: impl Into<String>) {
        self.add_message(ChatMessage {
            role: ChatRole::Bot,
            content: content.into(),
        });
    }

    fn add_message(&self, message: ChatMessage) {
        let mut guard = self.inner.messages.write().unwrap();
        guard.push(message);
        drop(guard);
        self.touch();
    }

    /// Full transcript, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.messages.read().unwrap().clone()
    }

    /// Number of transcript lines.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.messages.read().unwrap().len()
    }

    /// Update the last activity timestamp.
    fn touch(&self) {
        let mut guard = self.inner.last_activity.write().unwrap();
        *guard = Utc::now();
    }

    /// Check if the session has been inactive longer than the timeout.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *self.inner.last_activity.read().unwrap();
        let now = Utc::now();
        match (now - last).to_std() {
            Ok(duration) => duration > timeout,
            // Negative duration means clock skew or "last" in the future.
            Err(_) => false,
        }
    }

    /// Session age.
    #[must_use]
    pub fn age(&self) -> Duration {
        let now = Utc::now();
        (now - self.inner.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

/// Thread-safe store for sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a new session store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a new session with a fresh UUID.
    #[must_use]
    pub fn create(&self) -> Session {
        let id = Uuid::new_v4().to_string();
        self.create_with_id(id)
    }

    /// Create a new session with a specific ID.
    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> Session {
        let id = id.into();
        let session = Session::new(id.clone());
        let mut guard = self.inner.sessions.write().unwrap();
        guard.insert(id, session.clone());
        session
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let guard = self.inner.sessions.read().unwrap();
        guard.get(id).cloned()
    }

    /// Get a session by ID, creating it if it doesn't exist.
    ///
    /// Lookup and insert happen under one write lock, so two racing first
    /// requests for the same ID always end up sharing one session.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Session {
        let mut guard = self.inner.sessions.write().unwrap();
        guard
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id.to_string()))
            .clone()
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut guard = self.inner.sessions.write().unwrap();
        guard.remove(id)
    }

    /// Number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.read().unwrap().len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions inactive longer than the default timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    /// Remove sessions inactive longer than the given timeout.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.sessions.write().unwrap();
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_with_timeout(timeout));
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let session = Session::new("test-123".to_string());

        assert_eq!(session.id(), "test-123");
        assert_eq!(session.message_count(), 0);

        session.add_user_message("Hello");
        session.add_bot_message("Hi there!");
        assert_eq!(session.message_count(), 2);

        let messages = session.messages();
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Bot);
    }

    #[test]
    fn test_teach_state_transitions() {
        let session = Session::new("test".to_string());
        assert_eq!(session.teach_state(), TeachState::Normal);

        session.set_teach_state(TeachState::AwaitingTeach {
            question: "what is rust".to_string(),
        });
        match session.teach_state() {
            TeachState::AwaitingTeach { question } => assert_eq!(question, "what is rust"),
            TeachState::Normal => panic!("expected AwaitingTeach"),
        }

        session.set_teach_state(TeachState::Normal);
        assert_eq!(session.teach_state(), TeachState::Normal);
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::new("shared".to_string());
        let clone = session.clone();

        clone.set_teach_state(TeachState::AwaitingTeach {
            question: "q".to_string(),
        });
        assert_ne!(session.teach_state(), TeachState::Normal);
    }

    #[test]
    fn test_session_store() {
        let store = SessionStore::new();

        assert!(store.is_empty());

        let session = store.create();
        assert_eq!(store.len(), 1);

        let retrieved = store.get(session.id()).unwrap();
        assert_eq!(retrieved.id(), session.id());

        store.remove(session.id());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_or_create() {
        let store = SessionStore::new();
        let a = store.get_or_create("abc");
        a.add_user_message("first");

        let b = store.get_or_create("abc");
        assert_eq!(a.id(), b.id());
        assert_eq!(b.message_count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_or_create_is_atomic_across_threads() {
        let store = SessionStore::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let session = store.get_or_create("shared");
                    session.add_user_message(format!("msg-{i}"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // One session, no transcript lost to a racing insert.
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("shared").unwrap().message_count(), 8);
    }

    #[test]
    fn test_cleanup_expired() {
        let store = SessionStore::new();
        let _session = store.create();

        assert_eq!(store.cleanup_expired_with_timeout(Duration::from_secs(3600)), 0);
        assert_eq!(store.cleanup_expired_with_timeout(Duration::ZERO), 1);
        assert!(store.is_empty());
    }
}
