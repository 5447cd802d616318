use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::io::Storage;
use crate::core::state::{InterviewSession, SessionState};

/// Durable record of concluded sessions, one JSON file per session.
pub struct SessionStore {
    storage: Arc<dyn Storage>,
    folder: String,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>, folder: &str) -> Self {
        Self {
            storage,
            folder: folder.to_string(),
        }
    }

    /// Only session UUIDs map to record paths, so ids cannot escape the folder.
    fn path_for(&self, id: &str) -> Result<String> {
        let id = Uuid::parse_str(id).with_context(|| format!("Invalid session id '{}'", id))?;
        Ok(Path::new(&self.folder)
            .join(format!("{}.json", id))
            .to_string_lossy()
            .to_string())
    }

    pub async fn save(&self, session: &InterviewSession) -> Result<String> {
        if session.state != SessionState::Concluded {
            bail!("Session {} must be concluded before saving", session.id);
        }
        let path = self.path_for(&session.id.to_string())?;
        let content = serde_json::to_string_pretty(session)?;
        self.storage.write(&path, content.as_bytes()).await?;
        info!("Saved session {} to {}", session.id, path);
        Ok(path)
    }

    pub async fn load(&self, id: &str) -> Result<Option<InterviewSession>> {
        let path = self.path_for(id)?;
        if !self.storage.exists(&path).await? {
            return Ok(None);
        }
        let bytes = self.storage.read(&path).await?;
        let content = String::from_utf8(bytes)?;
        let session = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session record {}", path))?;
        Ok(Some(session))
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let entries = self.storage.list(&self.folder).await?;
        Ok(entries
            .iter()
            .filter_map(|e| {
                let path = Path::new(e);
                match path.extension() {
                    Some(ext) if ext == "json" => {
                        path.file_stem().map(|s| s.to_string_lossy().to_string())
                    }
                    _ => None,
                }
            })
            .collect())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.storage.delete(&self.path_for(id)?).await
    }
}
