//! File-backed persistence of interactive sessions.
//!
//! One pretty-printed JSON file per session: `<dir>/<session_id>.json`.
//! Writes go to a temp file in the same directory and are renamed into place.
//! There is no locking; concurrent steps on one session race.

use etl_core::{PipelineState, SessionId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, Result};

const SESSION_EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session_path(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, SESSION_EXT))
    }

    pub async fn exists(&self, id: &SessionId) -> bool {
        fs::try_exists(self.session_path(id)).await.unwrap_or(false)
    }

    pub async fn load(&self, id: &SessionId) -> Result<PipelineState> {
        let path = self.session_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OrchestratorError::SessionNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let state = PipelineState::from_session(&content)?;
        debug!(session_id = %id, "Session loaded");
        Ok(state)
    }

    /// Persist `state` under `id`, replacing any previous snapshot.
    ///
    /// Returns the fields that were written as text because their values
    /// have no plain-data form.
    pub async fn save(&self, id: &SessionId, state: &PipelineState) -> Result<Vec<&'static str>> {
        fs::create_dir_all(&self.dir).await?;

        let coerced = state.coerced_fields();
        for field in &coerced {
            warn!(session_id = %id, field = %field, "Non-serializable value saved as text");
        }

        let content = state.to_snapshot()?;
        let path = self.session_path(id);
        let temp_path = self.dir.join(format!(".{}.tmp", id));

        fs::write(&temp_path, content).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(session_id = %id, path = %path.display(), "Session saved");
        Ok(coerced)
    }

    pub async fn delete(&self, id: &SessionId) -> Result<()> {
        match fs::remove_file(self.session_path(id)).await {
            Ok(()) => {
                info!(session_id = %id, "Session deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(OrchestratorError::SessionNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of all stored sessions. Files that are not sessions are skipped.
    pub async fn list(&self) -> Result<Vec<SessionId>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = SessionId::parse(stem) {
                ids.push(id);
            }
        }
        ids.sort_by_key(|id| id.to_string());
        Ok(ids)
    }
}
