//! Suggestion session persistence (append-only event streams).
//!
//! One stream per suggestion. The store also keeps the per-user index of
//! the open (proposed, not yet resolved) session and refuses to open a
//! second one, so the single-active-session rule holds even when two
//! callers race past the assistant's own check.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use reorder_core::{ExpectedVersion, SuggestionId, UserId};
use reorder_session::{SessionEvent, SuggestionSession};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("user {user_id} already has open session {suggestion_id}")]
    OpenSessionExists {
        user_id: UserId,
        suggestion_id: SuggestionId,
    },

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of session event streams.
pub trait SessionStore: Send + Sync {
    /// Append `events` to the stream of `suggestion_id`.
    ///
    /// Returns the stream version after the append.
    fn append(
        &self,
        user_id: UserId,
        suggestion_id: SuggestionId,
        events: &[SessionEvent],
        expected_version: ExpectedVersion,
    ) -> Result<u64, SessionStoreError>;

    /// Full event stream of one session (empty if unknown).
    fn load_stream(&self, suggestion_id: SuggestionId) -> Result<Vec<SessionEvent>, SessionStoreError>;

    /// The user's open session, if any. It may already be past its deadline.
    fn open_session(&self, user_id: UserId) -> Result<Option<SuggestionId>, SessionStoreError>;

    /// Every open session, across users.
    fn open_sessions(&self) -> Result<Vec<SuggestionId>, SessionStoreError>;

    /// Rehydrate a session, or `None` if the stream is empty.
    fn load(&self, suggestion_id: SuggestionId) -> Result<Option<SuggestionSession>, SessionStoreError> {
        let events = self.load_stream(suggestion_id)?;
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(SuggestionSession::from_events(suggestion_id, &events)))
    }
}

impl<S> SessionStore for Arc<S>
where
    S: SessionStore + ?Sized,
{
    fn append(
        &self,
        user_id: UserId,
        suggestion_id: SuggestionId,
        events: &[SessionEvent],
        expected_version: ExpectedVersion,
    ) -> Result<u64, SessionStoreError> {
        (**self).append(user_id, suggestion_id, events, expected_version)
    }

    fn load_stream(&self, suggestion_id: SuggestionId) -> Result<Vec<SessionEvent>, SessionStoreError> {
        (**self).load_stream(suggestion_id)
    }

    fn open_session(&self, user_id: UserId) -> Result<Option<SuggestionId>, SessionStoreError> {
        (**self).open_session(user_id)
    }

    fn open_sessions(&self) -> Result<Vec<SuggestionId>, SessionStoreError> {
        (**self).open_sessions()
    }
}

#[derive(Debug)]
struct Stream {
    user_id: UserId,
    events: Vec<SessionEvent>,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<SuggestionId, Stream>,
    open: HashMap<UserId, SuggestionId>,
}

/// In-memory session store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions ever stored.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.streams.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn append(
        &self,
        user_id: UserId,
        suggestion_id: SuggestionId,
        events: &[SessionEvent],
        expected_version: ExpectedVersion,
    ) -> Result<u64, SessionStoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| SessionStoreError::Unavailable("lock poisoned".to_string()))?;
        let Inner { streams, open } = &mut *inner;

        let current = streams
            .get(&suggestion_id)
            .map(|s| s.events.len() as u64)
            .unwrap_or(0);

        if events.is_empty() {
            return Ok(current);
        }

        if !expected_version.matches(current) {
            return Err(SessionStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(stream) = streams.get(&suggestion_id) {
            if stream.user_id != user_id {
                return Err(SessionStoreError::InvalidAppend(format!(
                    "session {suggestion_id} belongs to another user"
                )));
            }
        }

        let opens = events
            .iter()
            .any(|e| matches!(e, SessionEvent::SuggestionProposed(_)));
        if opens {
            if let Some(existing) = open.get(&user_id) {
                if *existing != suggestion_id {
                    return Err(SessionStoreError::OpenSessionExists {
                        user_id,
                        suggestion_id: *existing,
                    });
                }
            }
        }

        let stream = streams.entry(suggestion_id).or_insert_with(|| Stream {
            user_id,
            events: Vec::new(),
        });
        stream.events.extend_from_slice(events);

        // The last event decides whether the session is still open.
        match events.last() {
            Some(SessionEvent::SuggestionProposed(_)) => {
                open.insert(user_id, suggestion_id);
            }
            Some(_) => {
                if open.get(&user_id) == Some(&suggestion_id) {
                    open.remove(&user_id);
                }
            }
            None => {}
        }

        Ok(stream.events.len() as u64)
    }

    fn load_stream(&self, suggestion_id: SuggestionId) -> Result<Vec<SessionEvent>, SessionStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| SessionStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(inner
            .streams
            .get(&suggestion_id)
            .map(|s| s.events.clone())
            .unwrap_or_default())
    }

    fn open_session(&self, user_id: UserId) -> Result<Option<SuggestionId>, SessionStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| SessionStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(inner.open.get(&user_id).copied())
    }

    fn open_sessions(&self) -> Result<Vec<SuggestionId>, SessionStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| SessionStoreError::Unavailable("lock poisoned".to_string()))?;
        let mut ids: Vec<SuggestionId> = inner.open.values().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
