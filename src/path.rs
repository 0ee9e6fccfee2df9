/*!
 * Virtual Path Utilities
 * Normalized absolute/relative path newtypes shared by every layer
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Path parsing result
#[must_use = "path parsing can fail and must be handled"]
pub type PathResult<T> = Result<T, PathError>;

/// Errors produced while parsing or combining virtual paths
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum PathError {
    #[error("Empty path")]
    Empty,

    #[error("Path must be absolute (start with /): {0}")]
    NotAbsolute(String),

    #[error("Path escapes root directory: {0}")]
    EscapesRoot(String),

    #[error("Invalid path segment: {0}")]
    InvalidSegment(String),
}

// ============================================================================
// Absolute Paths
// ============================================================================

/// Normalized absolute virtual path.
///
/// Always starts with `/`, never ends with one (except the root itself),
/// contains no empty, `.` or `..` segments. Paths are plain `/`-separated
/// strings independent of any host filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsPath(String);

impl AbsPath {
    /// The root path `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Wrap a string that is already in normalized form.
    ///
    /// Only for compile-time constants; everything else goes through
    /// [`AbsPath::parse`].
    pub(crate) fn new_unchecked(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Parse and normalize an absolute path.
    ///
    /// Redundant slashes and `.` segments are dropped, `..` segments are
    /// resolved, and a `..` that would climb above the root is rejected.
    pub fn parse(raw: &str) -> PathResult<Self> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if !raw.starts_with('/') {
            return Err(PathError::NotAbsolute(raw.to_string()));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PathError::EscapesRoot(raw.to_string()));
                    }
                }
                s => {
                    validate_segment(s)?;
                    segments.push(s);
                }
            }
        }

        Ok(Self::from_segments(segments.into_iter()))
    }

    fn from_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Self {
        let mut out = String::new();
        for segment in segments {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments in order, empty for the root
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments (the root has depth 0)
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Final segment, empty for the root
    pub fn basename(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => "",
        }
    }

    /// Containing directory, `None` for the root
    pub fn parent(&self) -> Option<AbsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// Append a single validated segment
    pub fn child(&self, name: &str) -> PathResult<AbsPath> {
        validate_segment(name)?;
        if name == "." || name == ".." {
            return Err(PathError::InvalidSegment(name.to_string()));
        }
        let mut out = self.0.clone();
        if !self.is_root() {
            out.push('/');
        }
        out.push_str(name);
        Ok(Self(out))
    }

    /// Append a relative path (already validated, so this cannot fail)
    pub fn join(&self, rel: &RelPath) -> AbsPath {
        if rel.is_empty() {
            return self.clone();
        }
        let mut out = if self.is_root() { String::new() } else { self.0.clone() };
        for segment in rel.segments() {
            out.push('/');
            out.push_str(segment);
        }
        Self(out)
    }

    /// Strict ancestry test: `/a` contains `/a/b` but not itself or `/ab`
    pub fn is_ancestor_of(&self, other: &AbsPath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// Segments of `self` below `base`, `None` when `self` is not under it.
    ///
    /// A path is considered under itself, yielding the empty relative path.
    pub fn relative_to(&self, base: &AbsPath) -> Option<RelPath> {
        if self == base {
            return Some(RelPath(String::new()));
        }
        if !base.is_ancestor_of(self) {
            return None;
        }
        let tail = if base.is_root() {
            &self.0[1..]
        } else {
            &self.0[base.0.len() + 1..]
        };
        Some(RelPath(tail.to_string()))
    }

    /// Basename split into stem and extension.
    ///
    /// The extension is everything after the final dot, with dotfiles
    /// (`.gitignore`) treated as having none.
    pub fn split_extension(&self) -> (&str, Option<&str>) {
        let base = self.basename();
        match base.rfind('.') {
            Some(0) | None => (base, None),
            Some(pos) => (&base[..pos], Some(&base[pos + 1..])),
        }
    }

    /// Nth uniqueness candidate for this path.
    ///
    /// The counter lands before the final extension when one exists:
    /// `/a.txt` becomes `/a-1.txt`, `/a` becomes `/a-1`.
    pub fn numbered(&self, n: u32) -> AbsPath {
        let (stem, ext) = self.split_extension();
        let numbered = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        match self.parent() {
            Some(parent) => {
                let mut out = if parent.is_root() { String::new() } else { parent.0 };
                out.push('/');
                out.push_str(&numbered);
                Self(out)
            }
            None => Self::root(),
        }
    }
}

fn validate_segment(segment: &str) -> PathResult<()> {
    if segment.is_empty() || segment.contains('/') || segment.contains('\0') {
        return Err(PathError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

impl fmt::Display for AbsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AbsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AbsPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for AbsPath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AbsPath> for String {
    fn from(path: AbsPath) -> Self {
        path.0
    }
}

// ============================================================================
// Relative Paths
// ============================================================================

/// Normalized relative path: zero or more `/`-separated segments.
///
/// Never starts with `/` and never contains `.` or `..`, so joining one
/// onto an [`AbsPath`] can only descend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelPath(String);

impl RelPath {
    /// The empty relative path (joining it is the identity)
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn parse(raw: &str) -> PathResult<Self> {
        if raw.starts_with('/') {
            return Err(PathError::InvalidSegment(raw.to_string()));
        }
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(PathError::EscapesRoot(raw.to_string())),
                s => {
                    validate_segment(s)?;
                    segments.push(s);
                }
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// A relative path made of one validated segment
    pub fn segment(name: &str) -> PathResult<Self> {
        validate_segment(name)?;
        if name == "." || name == ".." {
            return Err(PathError::InvalidSegment(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelPath> for String {
    fn from(path: RelPath) -> Self {
        path.0
    }
}

// ============================================================================
// Lineage Reduction
// ============================================================================

/// Drop every path that is covered by an ancestor elsewhere in the list.
///
/// Deleting `/a` already deletes `/a/b`, so a delete batch of
/// `[/a, /a/b, /c]` reduces to `[/a, /c]`. Input order is preserved and
/// duplicates collapse to their first occurrence.
pub fn reduce_lineage(paths: &[AbsPath]) -> Vec<AbsPath> {
    let mut kept: Vec<AbsPath> = Vec::with_capacity(paths.len());
    for path in paths {
        if kept.contains(path) {
            continue;
        }
        if paths.iter().any(|other| other.is_ancestor_of(path)) {
            continue;
        }
        kept.push(path.clone());
    }
    kept
}
