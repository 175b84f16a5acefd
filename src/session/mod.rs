//! Persistent pipeline sessions
//!
//! A session holds the serialized state of one pipeline run. Stores are
//! keyed by opaque identifiers; `update` is the per-session critical section
//! so read-modify-write cycles on the same id never interleave.

use crate::developer::{Phase, PipelineSnapshot, PipelineStatus};
use crate::llm::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub mod file;
pub mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

/// Stored state of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub status: PipelineStatus,
    pub phase: Option<Phase>,
    pub cursor: usize,
    /// Latest snapshot emitted by the controller
    pub snapshot: Option<PipelineSnapshot>,
    /// Conversation as of the latest snapshot
    #[serde(default)]
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new<S: Into<String>>(id: S) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: PipelineStatus::InProgress,
            phase: None,
            cursor: 0,
            snapshot: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Session store errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Invalid session id: {0}")]
    InvalidId(String),
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Mutation applied inside [`SessionStore::update`]
pub type RecordUpdate = Box<dyn FnOnce(&mut SessionRecord) + Send>;

/// Per-session async locks
///
/// An id's entry lives only while some task holds or waits on its lock.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    /// Wait for exclusive access to one session id
    pub async fn acquire(&self, id: &str) -> SessionGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        SessionGuard {
            locks: self,
            id: id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of ids with a live lock entry
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entry for `id` once only the map still references it
    fn release(&self, id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(id);
        }
    }
}

/// Exclusive access to one session id, released on drop
#[derive(Debug)]
pub struct SessionGuard<'a> {
    locks: &'a SessionLocks,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // unlock first so the entry's Arc count reflects only waiters
        drop(self.guard.take());
        self.locks.release(&self.id);
    }
}

/// Session ids double as file names, so they are restricted (pure function)
pub fn validate_session_id(id: &str) -> Result<(), SessionError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidId(id.to_string()))
    }
}

/// Storage for session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a record
    async fn load(&self, id: &str) -> Result<SessionRecord, SessionError>;

    /// Write a record unconditionally; use [`SessionStore::update`] for
    /// read-modify-write
    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError>;

    /// Locks serializing updates per session id
    fn locks(&self) -> &SessionLocks;

    /// Create a record with a fresh id
    async fn create(&self) -> Result<SessionRecord, SessionError> {
        let record = SessionRecord::new(uuid::Uuid::new_v4().to_string());
        self.save(&record).await?;
        Ok(record)
    }

    /// Load a record, creating it under the given id if it does not exist
    async fn open(&self, id: &str) -> Result<SessionRecord, SessionError> {
        validate_session_id(id)?;
        let _guard = self.locks().acquire(id).await;
        match self.load(id).await {
            Ok(record) => Ok(record),
            Err(SessionError::NotFound(_)) => {
                let record = SessionRecord::new(id);
                self.save(&record).await?;
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply a mutation under the session's lock and persist the result
    async fn update(&self, id: &str, apply: RecordUpdate) -> Result<SessionRecord, SessionError> {
        let _guard = self.locks().acquire(id).await;
        let mut record = self.load(id).await?;
        apply(&mut record);
        record.updated_at = Utc::now();
        self.save(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_validation() {
        assert!(validate_session_id("3f2a-b_c").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_new_record_defaults() {
        let record = SessionRecord::new("abc");
        assert_eq!(record.status, PipelineStatus::InProgress);
        assert!(record.phase.is_none());
        assert!(record.history.is_empty());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn test_locks_serialize_same_id() {
        let locks = Arc::new(SessionLocks::default());
        let guard = locks.acquire("s1").await;

        let other = locks.clone();
        let contender = tokio::spawn(async move {
            let _g = other.acquire("s1").await;
        });

        // a different id is not blocked
        let _unrelated = locks.acquire("s2").await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_entries_are_removed_after_release() {
        let locks = SessionLocks::default();

        let first = locks.acquire("s1").await;
        let second = locks.acquire("s2").await;
        assert_eq!(locks.len(), 2);

        drop(first);
        assert_eq!(locks.len(), 1);
        drop(second);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_remains() {
        let locks = Arc::new(SessionLocks::default());
        let guard = locks.acquire("s1").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.acquire("s1").await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        drop(guard);
        // the waiter still holds the Arc, so the entry stays
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
