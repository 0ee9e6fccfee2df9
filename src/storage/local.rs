/*!
 * Local Directory Backend
 * Maps the virtual tree onto a host directory via tokio::fs
 */

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use super::traits::{BackendKind, StorageBackend};
use super::types::*;
use crate::path::AbsPath;

/// Backend rooted at a host directory.
///
/// Virtual paths are appended to the root segment by segment. [`AbsPath`]
/// is normalized at parse time and can never contain `..`, so resolved
/// paths cannot escape the root.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Wrap an existing host directory
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Wrap a host directory, creating it if missing
    pub async fn open<P: Into<PathBuf>>(root: P) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| io_error(e, format!("create root {}", root.display())))?;
        Ok(Self { root })
    }

    /// Host path backing the virtual root
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, path: &AbsPath) -> PathBuf {
        let mut out = self.root.clone();
        for segment in path.segments() {
            out.push(segment);
        }
        out
    }

    /// Verify the parent of `path` exists and is a directory
    async fn ensure_parent(&self, path: &AbsPath) -> StoreResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let host = self.resolve(&parent);
        match fs::metadata(&host).await {
            Ok(md) if md.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::NotADirectory(parent.into_string())),
            Err(_) => Err(StoreError::NotFound(format!(
                "parent directory not found: {parent}"
            ))),
        }
    }
}

/// Map an I/O failure onto the backend error taxonomy
pub(crate) fn io_error(e: std::io::Error, context: impl Into<String>) -> StoreError {
    use std::io::ErrorKind;
    let context = context.into();
    match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound(context),
        ErrorKind::PermissionDenied => StoreError::PermissionDenied(context),
        ErrorKind::AlreadyExists => StoreError::AlreadyExists(context),
        _ => StoreError::Io(format!("{}: {}", context, e)),
    }
}

#[async_trait]
impl StorageBackend for LocalDirStore {
    async fn stat(&self, path: &AbsPath) -> StoreResult<Stat> {
        let host = self.resolve(path);
        let md = fs::metadata(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))?;
        if md.is_dir() {
            Ok(Stat::dir())
        } else if md.is_file() {
            Ok(Stat::file())
        } else {
            Err(StoreError::NotSupported(format!(
                "unsupported node type at {path}"
            )))
        }
    }

    async fn read_file(&self, path: &AbsPath) -> StoreResult<FileData> {
        let host = self.resolve(path);
        let md = fs::metadata(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))?;
        if md.is_dir() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }
        let bytes = fs::read(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))?;
        Ok(FileData::Bytes(bytes))
    }

    async fn write_file(&self, path: &AbsPath, data: &FileData) -> StoreResult<()> {
        if path.is_root() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }
        self.ensure_parent(path).await?;
        let host = self.resolve(path);
        if let Ok(md) = fs::metadata(&host).await {
            if md.is_dir() {
                return Err(StoreError::IsADirectory(path.to_string()));
            }
        }
        fs::write(&host, data.as_bytes())
            .await
            .map_err(|e| io_error(e, path.to_string()))
    }

    async fn unlink(&self, path: &AbsPath) -> StoreResult<()> {
        if path.is_root() {
            return Err(StoreError::InvalidPath("cannot remove the root".into()));
        }
        let host = self.resolve(path);
        let md = fs::metadata(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))?;
        if md.is_dir() {
            fs::remove_dir_all(&host)
                .await
                .map_err(|e| io_error(e, path.to_string()))
        } else {
            fs::remove_file(&host)
                .await
                .map_err(|e| io_error(e, path.to_string()))
        }
    }

    async fn rename(&self, from: &AbsPath, to: &AbsPath) -> StoreResult<()> {
        if from == to {
            return Ok(());
        }
        if from.is_root() || to.is_root() {
            return Err(StoreError::InvalidPath("cannot move the root".into()));
        }
        if from.is_ancestor_of(to) {
            return Err(StoreError::InvalidPath(format!(
                "cannot move {from} into its own subtree"
            )));
        }
        let from_host = self.resolve(from);
        fs::metadata(&from_host)
            .await
            .map_err(|e| io_error(e, from.to_string()))?;
        self.ensure_parent(to).await?;
        let to_host = self.resolve(to);
        if fs::metadata(&to_host).await.is_ok() {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        fs::rename(&from_host, &to_host)
            .await
            .map_err(|e| io_error(e, format!("{from} -> {to}")))
    }

    async fn read_dir(&self, path: &AbsPath) -> StoreResult<Vec<DirEntry>> {
        let host = self.resolve(path);
        let md = fs::metadata(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))?;
        if !md.is_dir() {
            return Err(StoreError::NotADirectory(path.to_string()));
        }

        let mut reader = fs::read_dir(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_error(e, path.to_string()))?
        {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!(path = %path, name = ?raw, "skipping non-utf8 entry");
                    continue;
                }
            };
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| io_error(e, path.to_string()))?;
            let kind = if file_type.is_dir() {
                NodeKind::Dir
            } else if file_type.is_file() {
                NodeKind::File
            } else {
                debug!(path = %path, name = %name, "skipping unsupported entry type");
                continue;
            };
            entries.push(DirEntry::new_unchecked(name, kind));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn mkdir_recursive(&self, path: &AbsPath) -> StoreResult<()> {
        let host = self.resolve(path);
        if let Ok(md) = fs::metadata(&host).await {
            return if md.is_dir() {
                Ok(())
            } else {
                Err(StoreError::NotADirectory(path.to_string()))
            };
        }
        fs::create_dir_all(&host)
            .await
            .map_err(|e| io_error(e, path.to_string()))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::LocalDir
    }
}
