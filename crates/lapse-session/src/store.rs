//! Lock-guarded session records.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::timer::TimerHandle;

/// Session payload: string keys to arbitrary JSON values.
pub type SessionData = HashMap<String, serde_json::Value>;

/// A single stored session.
#[derive(Debug)]
pub struct SessionRecord {
    /// Unique identifier, fixed at creation.
    pub id: String,

    /// Current payload. Replaced wholesale on update, never mutated in place.
    pub data: Arc<SessionData>,

    /// Generation counter; 0 at creation, +1 per update.
    pub version: u64,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the payload was last replaced.
    pub updated_at: DateTime<Utc>,

    /// Timer armed for the current version.
    pub expiration: Option<TimerHandle>,
}

impl SessionRecord {
    /// Create a version-0 record with empty data.
    pub fn new(id: impl Into<String>, expiration: Option<TimerHandle>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            data: Arc::new(SessionData::new()),
            version: 0,
            created_at: now,
            updated_at: now,
            expiration,
        }
    }

    /// Build the record that supersedes this one.
    pub fn successor(&self, data: Arc<SessionData>, expiration: Option<TimerHandle>) -> Self {
        Self {
            id: self.id.clone(),
            data,
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: Utc::now(),
            expiration,
        }
    }

    /// Metadata snapshot of this record.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only metadata about a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Map of session id to record behind one reader/writer lock.
///
/// Reads take the shared lock and hand back snapshots; every mutation
/// takes the exclusive lock. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct SessionStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Insert a new record built by `build`.
    ///
    /// `build` runs under the exclusive lock and only when `session_id` is
    /// not already present, so anything it arms cannot race the insert.
    /// An error from `build` leaves the store untouched.
    pub fn insert_with<F>(&self, session_id: &str, build: F) -> Result<()>
    where
        F: FnOnce() -> Result<SessionRecord>,
    {
        let mut records = self.records.write();
        if records.contains_key(session_id) {
            return Err(Error::DuplicateId(session_id.to_string()));
        }
        let record = build()?;
        debug_assert_eq!(record.id, session_id);
        records.insert(session_id.to_string(), record);
        trace!(session_id = %session_id, size = records.len(), "Record inserted");
        Ok(())
    }

    /// Snapshot of a session's data.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionData>> {
        self.records
            .read()
            .get(session_id)
            .map(|record| Arc::clone(&record.data))
    }

    /// Metadata snapshot of a session.
    pub fn info(&self, session_id: &str) -> Option<SessionInfo> {
        self.records.read().get(session_id).map(SessionRecord::info)
    }

    /// Swap in the record computed from the current one, returning the
    /// previous record.
    ///
    /// `next` runs under the exclusive lock, so concurrent replacements of
    /// the same session are applied one after another and never lose a
    /// version. An error from `next` leaves the current record in place.
    pub fn replace_with<F>(&self, session_id: &str, next: F) -> Result<SessionRecord>
    where
        F: FnOnce(&SessionRecord) -> Result<SessionRecord>,
    {
        let mut records = self.records.write();
        let current = records
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let replacement = next(&*current)?;
        let previous = std::mem::replace(current, replacement);
        trace!(
            session_id = %session_id,
            from = previous.version,
            to = current.version,
            "Record replaced"
        );
        Ok(previous)
    }

    /// Delete the record only if it is still at `version`.
    ///
    /// A mismatch means the record was superseded; that is not an error.
    pub fn delete_if_version(&self, session_id: &str, version: u64) -> bool {
        let mut records = self.records.write();
        let current = records
            .get(session_id)
            .is_some_and(|record| record.version == version);
        if current {
            records.remove(session_id);
        }
        current
    }

    /// Take every armed expiration handle out of the store.
    pub fn take_expirations(&self) -> Vec<TimerHandle> {
        self.records
            .write()
            .values_mut()
            .filter_map(|record| record.expiration.take())
            .collect()
    }
}
