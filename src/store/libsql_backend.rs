//! libSQL backend for sessions, farmer profiles and feedback.
//!
//! Supports local file and in-memory databases. Session state is stored as
//! a JSON document per key; profiles are stored both as flat columns for
//! querying and as the full serialized profile.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::farm::FarmerProfile;
use crate::services::ProfileRepository;
use crate::session::{SessionKey, SessionLocks, SessionPatch, SessionState, SessionStore};
use crate::store::migrations;

/// A stored feedback entry.
#[derive(Debug, Clone)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub phone: String,
    pub feedback: String,
    pub acknowledgment: String,
}

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    /// Serializes read-modify-write cycles per session key.
    merge_locks: SessionLocks,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            merge_locks: SessionLocks::new(),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn load_session(&self, key: &SessionKey) -> Result<SessionState, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT state FROM sessions WHERE session_key = ?1",
                params![key.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match row {
            Some(row) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;
                serde_json::from_str(&json)
                    .map_err(|e| DatabaseError::Serialization(format!("session {key}: {e}")))
            }
            None => Ok(SessionState::default()),
        }
    }

    /// Load the stored profile for a phone number, if one was saved.
    pub async fn get_profile(&self, phone: &str) -> Result<Option<FarmerProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT profile FROM farmers WHERE phone = ?1", params![phone])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match row {
            Some(row) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;
                let profile = serde_json::from_str(&json)
                    .map_err(|e| DatabaseError::Serialization(format!("profile {phone}: {e}")))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// All feedback recorded for a phone number, oldest first.
    pub async fn list_feedback(&self, phone: &str) -> Result<Vec<FeedbackRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, phone, feedback, acknowledgment FROM feedback
                 WHERE phone = ?1 ORDER BY created_at, rowid",
                params![phone],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_feedback: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_feedback: {e}")))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_feedback: {e}")))?;
            records.push(FeedbackRecord {
                id: Uuid::parse_str(&id)
                    .map_err(|e| DatabaseError::Serialization(format!("feedback id: {e}")))?,
                phone: row
                    .get(1)
                    .map_err(|e| DatabaseError::Query(format!("list_feedback: {e}")))?,
                feedback: row
                    .get(2)
                    .map_err(|e| DatabaseError::Query(format!("list_feedback: {e}")))?,
                acknowledgment: row
                    .get(3)
                    .map_err(|e| DatabaseError::Query(format!("list_feedback: {e}")))?,
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn get(&self, key: &SessionKey) -> Result<SessionState, DatabaseError> {
        self.load_session(key).await
    }

    async fn merge(
        &self,
        key: &SessionKey,
        patch: SessionPatch,
    ) -> Result<SessionState, DatabaseError> {
        let _guard = self.merge_locks.acquire(key).await;

        let mut state = self.load_session(key).await?;
        state.apply(&patch);

        let json = serde_json::to_string(&state)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO sessions (session_key, state, conversation_state, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (session_key) DO UPDATE
                 SET state = ?2, conversation_state = ?3, updated_at = ?4",
                params![
                    key.as_str(),
                    json,
                    state.conversation_state.to_string(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("merge_session: {e}")))?;

        debug!(session = %key, state = %state.conversation_state, "Session merged");
        Ok(state)
    }
}

#[async_trait]
impl ProfileRepository for LibSqlBackend {
    async fn save_profile(&self, profile: &FarmerProfile) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(profile)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO farmers
                    (phone, name, crops, location, language, profile, registered_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (phone) DO UPDATE SET
                    name = ?2, crops = ?3, location = ?4, language = ?5,
                    profile = ?6, registered_at = ?7, updated_at = ?8",
                params![
                    profile.phone(),
                    profile.name(),
                    profile.crops_display(),
                    profile.location(),
                    profile.language(),
                    json,
                    profile.registered_at().to_rfc3339(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_profile: {e}")))?;

        info!(phone = profile.phone(), name = profile.name(), "Farmer profile saved");
        Ok(())
    }

    async fn record_feedback(
        &self,
        phone: &str,
        feedback: &str,
        acknowledgment: &str,
    ) -> Result<(), DatabaseError> {
        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO feedback (id, phone, feedback, acknowledgment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    phone,
                    feedback,
                    acknowledgment,
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_feedback: {e}")))?;

        debug!(%id, phone, "Feedback recorded");
        Ok(())
    }
}
