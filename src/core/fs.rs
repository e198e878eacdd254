//! Filesystem access used by the driver scan and restart monitor

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::Result;

/// Suspend-capable filesystem queries
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether `path` exists, following symlinks
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Entries of a directory, as full paths
    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Whether `path` itself is a symlink
    async fn is_symlink(&self, path: &Path) -> Result<bool>;

    /// Whether `path` is a directory, without following symlinks
    async fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Final target of a symlink
    async fn resolve_link(&self, path: &Path) -> Result<PathBuf>;
}

/// The real filesystem, through `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

async fn file_type(path: &Path) -> Result<Option<std::fs::FileType>> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => Ok(Some(meta.file_type())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FileSystem for HostFs {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        Ok(paths)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn is_symlink(&self, path: &Path) -> Result<bool> {
        Ok(file_type(path).await?.is_some_and(|t| t.is_symlink()))
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(file_type(path).await?.is_some_and(|t| t.is_dir()))
    }

    async fn resolve_link(&self, path: &Path) -> Result<PathBuf> {
        Ok(tokio::fs::canonicalize(path).await?)
    }
}
