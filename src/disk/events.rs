/*!
 * Disk Events
 * What a disk announces after its state changes
 */

use serde::{Deserialize, Serialize};

use crate::events::EmitterEvent;
use crate::path::AbsPath;
use crate::storage::NodeKind;

/// One structural change as carried by rename events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRecord {
    pub kind: NodeKind,
    pub old_path: AbsPath,
    pub new_path: AbsPath,
}

impl RenameRecord {
    pub fn new(kind: NodeKind, old_path: AbsPath, new_path: AbsPath) -> Self {
        Self {
            kind,
            old_path,
            new_path,
        }
    }

    /// Marker for a rename that resolved to its own source: nothing
    /// moved and no event was emitted for it
    pub fn is_noop(&self) -> bool {
        self.old_path == self.new_path
    }

    pub fn old_name(&self) -> &str {
        self.old_path.basename()
    }

    pub fn new_name(&self) -> &str {
        self.new_path.basename()
    }
}

/// Why an index was rebuilt.
///
/// Emitted exactly once per mutating operation, after the rebuild, so a
/// listener reading the tree inside its callback always observes the
/// post-mutation state. Batch operations carry the full detail list of
/// the batch in one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "trigger", content = "detail")]
pub enum IndexTrigger {
    Create { paths: Vec<AbsPath> },
    Delete { paths: Vec<AbsPath> },
    Rename { records: Vec<RenameRecord> },
    /// Re-index with no structural detail (hydration, virtual nodes)
    Refresh,
}

/// Everything a disk emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DiskEvent {
    /// The index was rebuilt; the trigger says why
    Index(IndexTrigger),
    /// File content changed through this very disk instance
    InsideWrite { path: AbsPath },
    /// File content changed in another context of the same disk
    OutsideWrite { path: AbsPath },
}

impl DiskEvent {
    pub const INDEX: &'static str = "index";
    pub const INSIDE_WRITE: &'static str = "inside-write";
    pub const OUTSIDE_WRITE: &'static str = "outside-write";
}

impl EmitterEvent for DiskEvent {
    fn kind(&self) -> &'static str {
        match self {
            DiskEvent::Index(_) => Self::INDEX,
            DiskEvent::InsideWrite { .. } => Self::INSIDE_WRITE,
            DiskEvent::OutsideWrite { .. } => Self::OUTSIDE_WRITE,
        }
    }
}
