/*!
 * Disk Operations
 * Create, write, rename, copy, delete, trash, virtual nodes
 *
 * Every mutation follows the same shape: change the backend, re-index,
 * announce once. Batch variants are best-effort per item and announce
 * the whole batch with a single trigger carrying every change.
 */

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::events::{DiskEvent, IndexTrigger, RenameRecord};
use super::remote::RemotePayload;
use super::Disk;
use crate::errors::{DiskError, DiskResult};
use crate::index::TreeNode;
use crate::path::{reduce_lineage, AbsPath};
use crate::storage::{FileData, NodeKind, Stat, StorageBackend, StoreResult};

/// Soft-deleted entries are parked here until restored or purged. The
/// trash is an ordinary directory in the tree; hosts that hide it prune
/// it when rendering.
pub const TRASH_DIR: &str = "/.trash";

fn trash_dir() -> AbsPath {
    AbsPath::new_unchecked(TRASH_DIR)
}

/// How a copy resolves a destination name that is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Number the copy past the occupied name
    #[default]
    Unique,
    /// Replace whatever occupies the name
    Overwrite,
}

/// Request for one file in a create call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileSpec {
    pub path: AbsPath,
    #[serde(default)]
    pub data: FileData,
}

impl NewFileSpec {
    /// Empty file at `path`
    pub fn new(path: AbsPath) -> Self {
        Self {
            path,
            data: FileData::empty(),
        }
    }

    pub fn with_data(mut self, data: impl Into<FileData>) -> Self {
        self.data = data.into();
        self
    }
}

impl Disk {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a file, renaming it past any occupied name.
    ///
    /// Missing ancestor directories are created. Returns the path the
    /// file actually landed on, which differs from the requested one
    /// whenever the name had to be numbered.
    pub async fn new_file(&self, spec: NewFileSpec) -> DiskResult<AbsPath> {
        let created = self.inner_new_file(spec).await?;
        self.signal(IndexTrigger::Create {
            paths: vec![created.clone()],
        })
        .await?;
        Ok(created)
    }

    /// Create several files with one announcement.
    ///
    /// Failures are skipped with a warning; the create trigger carries
    /// only the files that landed. When nothing lands, the first
    /// failure is returned and no event fires.
    pub async fn new_files(&self, specs: Vec<NewFileSpec>) -> DiskResult<Vec<AbsPath>> {
        let mut created = Vec::with_capacity(specs.len());
        let mut first_err = None;
        for spec in specs {
            let path = spec.path.clone();
            match self.inner_new_file(spec).await {
                Ok(landed) => created.push(landed),
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping failed create in batch");
                    first_err.get_or_insert(e);
                }
            }
        }
        if created.is_empty() {
            return match first_err {
                Some(e) => Err(e),
                None => Ok(created),
            };
        }
        self.signal(IndexTrigger::Create {
            paths: created.clone(),
        })
        .await?;
        Ok(created)
    }

    /// Create a directory, renaming it past any occupied name
    pub async fn new_dir(&self, desired: &AbsPath) -> DiskResult<AbsPath> {
        if desired.is_root() {
            return Err(DiskError::BadRequest("cannot create the root".to_string()));
        }
        self.ensure_ancestors(desired)
            .await
            .map_err(|e| DiskError::from_store(e, desired))?;
        let resolved = self.resolve_unique(desired).await?;
        self.backend()
            .mkdir_recursive(&resolved)
            .await
            .map_err(|e| DiskError::from_store(e, &resolved))?;
        self.signal(IndexTrigger::Create {
            paths: vec![resolved.clone()],
        })
        .await?;
        Ok(resolved)
    }

    async fn inner_new_file(&self, spec: NewFileSpec) -> DiskResult<AbsPath> {
        if spec.path.is_root() {
            return Err(DiskError::BadRequest("cannot create the root".to_string()));
        }
        self.ensure_ancestors(&spec.path)
            .await
            .map_err(|e| DiskError::from_store(e, &spec.path))?;
        let resolved = self.resolve_unique(&spec.path).await?;
        self.backend()
            .write_file(&resolved, &spec.data)
            .await
            .map_err(|e| DiskError::from_store(e, &resolved))?;
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Write file contents, creating the file and its ancestors when
    /// missing.
    ///
    /// A write that creates the file announces the creation first, so
    /// listeners see the node before its content change. The content
    /// change itself fires locally as [`DiskEvent::InsideWrite`] and is
    /// published to other contexts, where it surfaces as
    /// [`DiskEvent::OutsideWrite`].
    pub async fn write_file(&self, path: &AbsPath, data: impl Into<FileData>) -> DiskResult<()> {
        if path.is_root() {
            return Err(DiskError::BadRequest("cannot write the root".to_string()));
        }
        let existed = self.backend().exists(path).await;
        self.ensure_ancestors(path)
            .await
            .map_err(|e| DiskError::from_store(e, path))?;
        self.backend()
            .write_file(path, &data.into())
            .await
            .map_err(|e| DiskError::from_store(e, path))?;
        if !existed {
            self.signal(IndexTrigger::Create {
                paths: vec![path.clone()],
            })
            .await?;
        }
        self.emit_local(&DiskEvent::InsideWrite { path: path.clone() });
        self.publish_remote(RemotePayload::Write { path: path.clone() });
        Ok(())
    }

    /// Read entire file contents
    pub async fn read_file(&self, path: &AbsPath) -> DiskResult<FileData> {
        self.backend()
            .read_file(path)
            .await
            .map_err(|e| DiskError::from_store(e, path))
    }

    /// What kind of node lives at `path`, straight from the backend
    pub async fn stat(&self, path: &AbsPath) -> DiskResult<Stat> {
        self.backend()
            .stat(path)
            .await
            .map_err(|e| DiskError::from_store(e, path))
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove a node; directories go together with their subtree
    pub async fn remove_file(&self, path: &AbsPath) -> DiskResult<()> {
        if path.is_root() {
            return Err(DiskError::BadRequest("cannot remove the root".to_string()));
        }
        self.backend()
            .unlink(path)
            .await
            .map_err(|e| DiskError::from_store(e, path))?;
        self.signal(IndexTrigger::Delete {
            paths: vec![path.clone()],
        })
        .await
    }

    /// Remove several nodes with one announcement.
    ///
    /// Descendants of another listed path are not unlinked separately:
    /// deleting a directory already deletes everything under it. The
    /// delete trigger still carries the caller's full list, so listeners
    /// tracking individual paths see every one of them announced; the
    /// returned vector holds only the subtree roots actually unlinked.
    /// Failures are skipped with a warning.
    pub async fn remove_multiple_files(&self, paths: &[AbsPath]) -> DiskResult<Vec<AbsPath>> {
        let mut removed = Vec::new();
        let mut first_err = None;
        for path in reduce_lineage(paths) {
            if path.is_root() {
                let e = DiskError::BadRequest("cannot remove the root".to_string());
                warn!(error = %e, "Skipping failed delete in batch");
                first_err.get_or_insert(e);
                continue;
            }
            match self.backend().unlink(&path).await {
                Ok(()) => removed.push(path),
                Err(e) => {
                    let e = DiskError::from_store(e, &path);
                    warn!(path = %path, error = %e, "Skipping failed delete in batch");
                    first_err.get_or_insert(e);
                }
            }
        }
        if removed.is_empty() {
            return match first_err {
                Some(e) => Err(e),
                None => Ok(removed),
            };
        }
        self.signal(IndexTrigger::Delete {
            paths: paths.to_vec(),
        })
        .await?;
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Rename
    // ------------------------------------------------------------------

    /// Rename or move a file.
    ///
    /// `to` is either a bare name, resolved against the source's parent
    /// directory, or an absolute path for a move. Renaming a file onto
    /// its own path is a no-op: the returned record reports it and no
    /// event fires.
    pub async fn rename_file(&self, from: &AbsPath, to: &str) -> DiskResult<RenameRecord> {
        let record = self.inner_rename(from, to, Some(NodeKind::File)).await?;
        if !record.is_noop() {
            self.signal(IndexTrigger::Rename {
                records: vec![record.clone()],
            })
            .await?;
        }
        Ok(record)
    }

    /// Rename or move a directory together with its subtree
    pub async fn rename_dir(&self, from: &AbsPath, to: &str) -> DiskResult<RenameRecord> {
        let record = self.inner_rename(from, to, Some(NodeKind::Dir)).await?;
        if !record.is_noop() {
            self.signal(IndexTrigger::Rename {
                records: vec![record.clone()],
            })
            .await?;
        }
        Ok(record)
    }

    /// Rename several nodes with one announcement.
    ///
    /// The rename trigger carries a record per attempted rename that
    /// succeeded, no-ops included so listeners can correlate the full
    /// batch; the event is skipped only when every record is a no-op.
    pub async fn rename_multiple(
        &self,
        renames: &[(AbsPath, String)],
    ) -> DiskResult<Vec<RenameRecord>> {
        let mut records = Vec::with_capacity(renames.len());
        let mut first_err = None;
        for (from, to) in renames {
            match self.inner_rename(from, to, None).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(from = %from, error = %e, "Skipping failed rename in batch");
                    first_err.get_or_insert(e);
                }
            }
        }
        if records.is_empty() {
            return match first_err {
                Some(e) => Err(e),
                None => Ok(records),
            };
        }
        if records.iter().any(|r| !r.is_noop()) {
            self.signal(IndexTrigger::Rename {
                records: records.clone(),
            })
            .await?;
        }
        Ok(records)
    }

    async fn inner_rename(
        &self,
        from: &AbsPath,
        to: &str,
        expect: Option<NodeKind>,
    ) -> DiskResult<RenameRecord> {
        let target = rename_target(from, to)?;
        let stat = self
            .backend()
            .stat(from)
            .await
            .map_err(|e| DiskError::from_store(e, from))?;
        if let Some(kind) = expect {
            if stat.kind != kind {
                let label = match kind {
                    NodeKind::File => "file",
                    NodeKind::Dir => "directory",
                };
                return Err(DiskError::BadRequest(format!("{} is not a {}", from, label)));
            }
        }
        let record = RenameRecord::new(stat.kind, from.clone(), target.clone());
        if record.is_noop() {
            return Ok(record);
        }
        self.backend()
            .rename(from, &target)
            .await
            .map_err(|e| DiskError::from_store(e, from))?;
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Copy
    // ------------------------------------------------------------------

    /// Copy a file into a directory. The destination directory is
    /// created when missing; `mode` decides what happens when the name
    /// is taken.
    pub async fn copy_file(
        &self,
        source: &AbsPath,
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<AbsPath> {
        let copied = self.inner_copy_file(source, dest_dir, mode).await?;
        self.signal(IndexTrigger::Create {
            paths: vec![copied.clone()],
        })
        .await?;
        Ok(copied)
    }

    /// Copy a directory and its subtree into another directory
    pub async fn copy_dir(
        &self,
        source: &AbsPath,
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<AbsPath> {
        let copied = self.inner_copy_dir(source, dest_dir, mode).await?;
        self.signal(IndexTrigger::Create {
            paths: vec![copied.clone()],
        })
        .await?;
        Ok(copied)
    }

    /// Copy several nodes into a directory with one announcement.
    ///
    /// Descendants of another listed source are dropped up front, then
    /// every surviving source is copied best-effort by its own kind.
    pub async fn copy_multiple(
        &self,
        sources: &[AbsPath],
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<Vec<AbsPath>> {
        let mut created = Vec::new();
        let mut first_err = None;
        for source in reduce_lineage(sources) {
            let result = match self.backend().stat(&source).await {
                Ok(stat) if stat.is_dir() => self.inner_copy_dir(&source, dest_dir, mode).await,
                Ok(_) => self.inner_copy_file(&source, dest_dir, mode).await,
                Err(e) => Err(DiskError::from_store(e, &source)),
            };
            match result {
                Ok(copied) => created.push(copied),
                Err(e) => {
                    warn!(source = %source, error = %e, "Skipping failed copy in batch");
                    first_err.get_or_insert(e);
                }
            }
        }
        if created.is_empty() {
            return match first_err {
                Some(e) => Err(e),
                None => Ok(created),
            };
        }
        self.signal(IndexTrigger::Create {
            paths: created.clone(),
        })
        .await?;
        Ok(created)
    }

    /// Copy index nodes into a directory with one announcement.
    ///
    /// Structure comes from the nodes themselves rather than a backend
    /// walk, so virtual nodes copy too: a file node reads its content
    /// from its `source` path when one is recorded, falling back to the
    /// node's own path.
    pub async fn copy_multiple_source_nodes(
        &self,
        nodes: &[Arc<TreeNode>],
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<Vec<AbsPath>> {
        let paths: Vec<AbsPath> = nodes.iter().map(|n| n.path.clone()).collect();
        let keep: std::collections::HashSet<AbsPath> =
            reduce_lineage(&paths).into_iter().collect();

        let mut created = Vec::new();
        let mut first_err = None;
        for node in nodes {
            if !keep.contains(&node.path) || node.path.is_root() {
                continue;
            }
            let result = self.inner_copy_node(node, dest_dir, mode).await;
            match result {
                Ok(copied) => created.push(copied),
                Err(e) => {
                    warn!(source = %node.path, error = %e, "Skipping failed copy in batch");
                    first_err.get_or_insert(e);
                }
            }
        }
        if created.is_empty() {
            return match first_err {
                Some(e) => Err(e),
                None => Ok(created),
            };
        }
        self.signal(IndexTrigger::Create {
            paths: created.clone(),
        })
        .await?;
        Ok(created)
    }

    async fn inner_copy_file(
        &self,
        source: &AbsPath,
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<AbsPath> {
        if source.is_root() {
            return Err(DiskError::BadRequest("cannot copy the root".to_string()));
        }
        let stat = self
            .backend()
            .stat(source)
            .await
            .map_err(|e| DiskError::from_store(e, source))?;
        if stat.kind != NodeKind::File {
            return Err(DiskError::BadRequest(format!("{} is not a file", source)));
        }
        let resolved = self.resolve_copy_target(source, dest_dir, mode).await?;
        let data = self
            .backend()
            .read_file(source)
            .await
            .map_err(|e| DiskError::from_store(e, source))?;
        self.backend()
            .write_file(&resolved, &data)
            .await
            .map_err(|e| DiskError::from_store(e, &resolved))?;
        Ok(resolved)
    }

    async fn inner_copy_dir(
        &self,
        source: &AbsPath,
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<AbsPath> {
        if source.is_root() {
            return Err(DiskError::BadRequest("cannot copy the root".to_string()));
        }
        if source == dest_dir || source.is_ancestor_of(dest_dir) {
            return Err(DiskError::BadRequest(format!(
                "cannot copy {} into itself",
                source
            )));
        }
        let resolved = self.resolve_copy_target(source, dest_dir, mode).await?;
        copy_tree(self.backend(), source.clone(), resolved.clone())
            .await
            .map_err(|e| DiskError::from_store(e, source))?;
        Ok(resolved)
    }

    async fn inner_copy_node(
        &self,
        node: &Arc<TreeNode>,
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<AbsPath> {
        let resolved = self.resolve_copy_target(&node.path, dest_dir, mode).await?;
        copy_node_tree(self, node.clone(), resolved.clone()).await?;
        Ok(resolved)
    }

    /// Ensure `dest_dir` exists and resolve the name a copy of `source`
    /// lands on: a numbered free name, or the occupant's own name after
    /// unlinking it
    async fn resolve_copy_target(
        &self,
        source: &AbsPath,
        dest_dir: &AbsPath,
        mode: CopyMode,
    ) -> DiskResult<AbsPath> {
        self.backend()
            .mkdir_recursive(dest_dir)
            .await
            .map_err(|e| DiskError::from_store(e, dest_dir))?;
        let desired = dest_dir.child(source.basename())?;
        match mode {
            CopyMode::Unique => self.resolve_unique(&desired).await,
            CopyMode::Overwrite => {
                if desired == *source {
                    return Err(DiskError::BadRequest(format!(
                        "cannot copy {} onto itself",
                        source
                    )));
                }
                if self.backend().exists(&desired).await {
                    self.backend()
                        .unlink(&desired)
                        .await
                        .map_err(|e| DiskError::from_store(e, &desired))?;
                }
                Ok(desired)
            }
        }
    }

    // ------------------------------------------------------------------
    // Trash
    // ------------------------------------------------------------------

    /// Move a node into the trash directory and announce it as deleted.
    ///
    /// Returns where the node was parked; keep it to restore the node
    /// later with [`Disk::untrash_file`].
    pub async fn trash_file(&self, path: &AbsPath) -> DiskResult<AbsPath> {
        if path.is_root() {
            return Err(DiskError::BadRequest("cannot trash the root".to_string()));
        }
        let trash = trash_dir();
        if *path == trash || trash.is_ancestor_of(path) {
            return Err(DiskError::BadRequest(format!(
                "{} is already in the trash",
                path
            )));
        }
        self.backend()
            .mkdir_recursive(&trash)
            .await
            .map_err(|e| DiskError::from_store(e, &trash))?;
        let parked = self.resolve_unique(&trash.child(path.basename())?).await?;
        self.backend()
            .rename(path, &parked)
            .await
            .map_err(|e| DiskError::from_store(e, path))?;
        self.signal(IndexTrigger::Delete {
            paths: vec![path.clone()],
        })
        .await?;
        Ok(parked)
    }

    /// Move a trashed node back and announce it as created.
    ///
    /// The restored node lands on `original` when that name is still
    /// free, otherwise on the nearest numbered variant.
    pub async fn untrash_file(
        &self,
        trashed: &AbsPath,
        original: &AbsPath,
    ) -> DiskResult<AbsPath> {
        if !trash_dir().is_ancestor_of(trashed) {
            return Err(DiskError::BadRequest(format!(
                "{} is not in the trash",
                trashed
            )));
        }
        if original.is_root() {
            return Err(DiskError::BadRequest(
                "cannot restore over the root".to_string(),
            ));
        }
        self.ensure_ancestors(original)
            .await
            .map_err(|e| DiskError::from_store(e, original))?;
        let restored = self.resolve_unique(original).await?;
        self.backend()
            .rename(trashed, &restored)
            .await
            .map_err(|e| DiskError::from_store(e, trashed))?;
        self.signal(IndexTrigger::Create {
            paths: vec![restored.clone()],
        })
        .await?;
        Ok(restored)
    }

    // ------------------------------------------------------------------
    // Virtual nodes
    // ------------------------------------------------------------------

    /// Overlay an index-only node that has no backend presence.
    ///
    /// Virtual nodes occupy their name, participate in iteration and
    /// unique-name resolution, and vanish on the next full scan. Only a
    /// refresh fires, and only locally.
    pub fn add_virtual_file(
        &self,
        path: &AbsPath,
        kind: NodeKind,
        source: Option<AbsPath>,
    ) -> DiskResult<()> {
        if !self.tree().insert_virtual(path, kind, source) {
            return Err(DiskError::BadRequest(format!(
                "cannot add virtual node at {}",
                path
            )));
        }
        self.signal_local_refresh();
        Ok(())
    }

    /// Drop a node from the index view without touching the backend.
    /// Real nodes reappear on the next full scan.
    pub fn remove_virtual_file(&self, path: &AbsPath) -> DiskResult<()> {
        if !self.tree().remove_node(path) {
            return Err(DiskError::NotFound(path.to_string()));
        }
        self.signal_local_refresh();
        Ok(())
    }
}

/// Resolve a rename destination: absolute paths move, bare names rename
/// within the source's parent
fn rename_target(from: &AbsPath, to: &str) -> DiskResult<AbsPath> {
    if to.starts_with('/') {
        return Ok(AbsPath::parse(to)?);
    }
    let parent = from
        .parent()
        .ok_or_else(|| DiskError::BadRequest("cannot rename the root".to_string()))?;
    Ok(parent.child(to)?)
}

/// Recursively copy a backend subtree; `to` must not overlap `from`
fn copy_tree(
    backend: &Arc<dyn StorageBackend>,
    from: AbsPath,
    to: AbsPath,
) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
    Box::pin(async move {
        backend.mkdir_recursive(&to).await?;
        for entry in backend.read_dir(&from).await? {
            let (src, dst) = match (from.child(&entry.name), to.child(&entry.name)) {
                (Ok(src), Ok(dst)) => (src, dst),
                _ => continue,
            };
            match entry.kind {
                NodeKind::File => {
                    let data = backend.read_file(&src).await?;
                    backend.write_file(&dst, &data).await?;
                }
                NodeKind::Dir => copy_tree(backend, src, dst).await?,
            }
        }
        Ok(())
    })
}

/// Recursively copy an index subtree, reading file content from each
/// node's recorded source when present
fn copy_node_tree(
    disk: &Disk,
    node: Arc<TreeNode>,
    to: AbsPath,
) -> Pin<Box<dyn Future<Output = DiskResult<()>> + Send + '_>> {
    Box::pin(async move {
        if node.is_file() {
            let origin = node.source.clone().unwrap_or_else(|| node.path.clone());
            let data = disk
                .backend()
                .read_file(&origin)
                .await
                .map_err(|e| DiskError::from_store(e, &origin))?;
            disk.backend()
                .write_file(&to, &data)
                .await
                .map_err(|e| DiskError::from_store(e, &to))?;
            return Ok(());
        }
        disk.backend()
            .mkdir_recursive(&to)
            .await
            .map_err(|e| DiskError::from_store(e, &to))?;
        for child in node.children.values() {
            let dst = match to.child(&child.basename) {
                Ok(dst) => dst,
                Err(_) => continue,
            };
            copy_node_tree(disk, child.clone(), dst).await?;
        }
        Ok(())
    })
}
