/*!
 * Content Sweep
 * Workspace-wide text replacement
 */

use std::sync::Arc;

use tracing::warn;

use super::events::DiskEvent;
use super::ops::TRASH_DIR;
use super::remote::RemotePayload;
use super::Disk;
use crate::errors::{DiskError, DiskResult};
use crate::index::TreeNode;
use crate::path::AbsPath;
use crate::storage::FileData;

impl Disk {
    /// Replace every occurrence of `needle` in every indexed text file.
    ///
    /// The sweep walks the current index under the scan lock, so no
    /// rescan can move files underneath it. Virtual nodes, trashed
    /// files and binary content are left alone, and unreadable or
    /// unwritable files are skipped with a warning. Returns the files
    /// that changed; each one fires a content event exactly like a
    /// direct write.
    pub async fn replace_across_files(
        &self,
        needle: &str,
        replacement: &str,
    ) -> DiskResult<Vec<AbsPath>> {
        if needle.is_empty() {
            return Err(DiskError::BadRequest("empty search pattern".to_string()));
        }

        let trash = AbsPath::new_unchecked(TRASH_DIR);
        let mut changed = Vec::new();
        {
            let _guard = self.core.scan_lock.lock().await;
            let targets: Vec<Arc<TreeNode>> = self
                .core
                .index
                .iter()
                .filter(|node| {
                    node.is_file() && node.source.is_none() && !trash.is_ancestor_of(&node.path)
                })
                .collect();

            for node in targets {
                let data = match self.core.backend.read_file(&node.path).await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(path = %node.path, error = %e, "Skipping unreadable file in sweep");
                        continue;
                    }
                };
                let Some(text) = data.as_text() else {
                    continue;
                };
                if !text.contains(needle) {
                    continue;
                }
                let rewritten = FileData::Text(text.replace(needle, replacement));
                if let Err(e) = self.core.backend.write_file(&node.path, &rewritten).await {
                    warn!(path = %node.path, error = %e, "Skipping unwritable file in sweep");
                    continue;
                }
                changed.push(node.path.clone());
            }
        }

        for path in &changed {
            self.emit_local(&DiskEvent::InsideWrite { path: path.clone() });
            self.publish_remote(RemotePayload::Write { path: path.clone() });
        }
        Ok(changed)
    }
}
