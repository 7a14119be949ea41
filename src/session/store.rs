//! Session store trait and the in-process implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::state::{SessionPatch, SessionState};
use crate::error::DatabaseError;

/// Identifies one conversation: the remote party's transport identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Keyed storage for session state.
///
/// `get` returns a default state for unknown keys. `merge` applies a
/// field-wise overwrite and returns the resulting state. Keys never
/// affect each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &SessionKey) -> Result<SessionState, DatabaseError>;

    async fn merge(
        &self,
        key: &SessionKey,
        patch: SessionPatch,
    ) -> Result<SessionState, DatabaseError>;
}

/// Process-lifetime session store backed by a map.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions that have been written at least once.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &SessionKey) -> Result<SessionState, DatabaseError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn merge(
        &self,
        key: &SessionKey,
        patch: SessionPatch,
    ) -> Result<SessionState, DatabaseError> {
        let mut sessions = self.sessions.write().await;
        let state = sessions.entry(key.clone()).or_default();
        state.apply(&patch);
        Ok(state.clone())
    }
}
