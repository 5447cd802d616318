use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

/// Byte-level persistence used by the session record store and draft export.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    /// Replaces the whole file; readers never observe a partial record.
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    /// Removing a missing file is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Regular files directly under `folder`, sorted. A missing folder lists empty.
    async fn list(&self, folder: &str) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

const TEMP_SUFFIX: &str = ".tmp";

#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let temp_path = format!("{}{}", path, TEMP_SUFFIX);
        tokio::fs::write(&temp_path, content)
            .await
            .with_context(|| format!("Failed to write {}", temp_path))?;

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to replace {}", path));
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn list(&self, folder: &str) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(folder).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to list {}", folder)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.file_type().await?.is_file() || name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            entries.push(entry.path().to_string_lossy().to_string());
        }

        entries.sort();
        Ok(entries)
    }
}
