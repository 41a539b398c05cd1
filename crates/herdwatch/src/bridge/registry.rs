//! Session Registry
//!
//! Concurrent set of open sessions. Broadcasts iterate a snapshot so a
//! session is visited at most once per frame and removals racing with a
//! broadcast are harmless.

use std::sync::Arc;

use dashmap::DashMap;

use super::session::{LiveViewSession, SessionId};

/// Open sessions indexed by id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<LiveViewSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub fn insert(&self, session: Arc<LiveViewSession>) {
        self.sessions.insert(session.id(), session);
    }

    /// Unregister a session, returning it if it was present
    pub fn remove(&self, id: &SessionId) -> Option<Arc<LiveViewSession>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Clone out the currently registered sessions
    pub fn snapshot(&self) -> Vec<Arc<LiveViewSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Remove and return every session
    pub fn drain(&self) -> Vec<Arc<LiveViewSession>> {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.iter().filter_map(|id| self.remove(id)).collect()
    }
}
