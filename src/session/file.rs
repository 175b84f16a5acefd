//! File-backed session store, one JSON document per session

use crate::session::{validate_session_id, SessionError, SessionLocks, SessionRecord, SessionStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
    locks: SessionLocks,
}

impl FileSessionStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open_dir<P: AsRef<Path>>(dir: P) -> Result<Self, SessionError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            locks: SessionLocks::default(),
        })
    }

    fn record_path(&self, id: &str) -> Result<PathBuf, SessionError> {
        validate_session_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> Result<SessionRecord, SessionError> {
        let path = self.record_path(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let path = self.record_path(&record.id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;

        // write-then-rename so readers never see a partial document
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(session_id = %record.id, "Saved session");
        Ok(())
    }

    fn locks(&self) -> &SessionLocks {
        &self.locks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::developer::{Phase, PipelineStatus};
    use crate::llm::Message;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open_dir(dir.path().join("sessions"))
            .await
            .unwrap();

        let record = store.open("run-7").await.unwrap();
        let updated = store
            .update(
                &record.id,
                Box::new(|r| {
                    r.status = PipelineStatus::Completed;
                    r.phase = Some(Phase::Done);
                    r.history = vec![Message::system("sys")];
                }),
            )
            .await
            .unwrap();
        assert!(updated.updated_at >= record.updated_at);

        let reopened = FileSessionStore::open_dir(dir.path().join("sessions"))
            .await
            .unwrap();
        let loaded = reopened.load("run-7").await.unwrap();
        assert_eq!(loaded.status, PipelineStatus::Completed);
        assert_eq!(loaded.phase, Some(Phase::Done));
        assert_eq!(loaded.history, updated.history);
        assert!(dir.path().join("sessions/run-7.json").exists());
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open_dir(dir.path()).await.unwrap();
        assert!(matches!(store.load("ghost").await, Err(SessionError::NotFound(_))));
        assert!(matches!(
            store.load("../escape").await,
            Err(SessionError::InvalidId(_))
        ));
    }
}
