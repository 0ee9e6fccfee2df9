/*!
 * Crate Error Types
 * The taxonomy every disk operation resolves to
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::{AbsPath, PathError};
use crate::storage::StoreError;

/// Disk operation result
///
/// # Must Use
/// Disk operations can fail and must be handled to prevent data loss
#[must_use = "disk operations can fail and must be handled"]
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors surfaced by disk operations.
///
/// Backend failures are translated at the disk boundary: a missing
/// target becomes [`DiskError::NotFound`], malformed requests become
/// [`DiskError::BadRequest`], a disk whose storage cannot even be
/// scanned reports [`DiskError::ServiceUnavailable`], and any other
/// backend failure passes through typed as [`DiskError::Backend`].
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum DiskError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl DiskError {
    /// Translate a backend failure for an operation targeting `path`
    pub(crate) fn from_store(err: StoreError, path: &AbsPath) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(path.to_string()),
            other => Self::Backend(other),
        }
    }
}

impl From<PathError> for DiskError {
    fn from(err: PathError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
