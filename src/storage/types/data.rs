/*!
 * File Payloads
 * Text or binary content carried through backend reads and writes
 */

use serde::{Deserialize, Serialize};

/// Content of a file, preserving the text/binary distinction where the
/// backend can (the in-memory store keeps it, the local-disk store
/// always reads back bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileData {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileData {
    /// Empty text payload
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }

    /// View as text; `Bytes` payloads qualify only when valid UTF-8
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Bytes(b) => b,
        }
    }
}

impl From<&str> for FileData {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FileData {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for FileData {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl Default for FileData {
    fn default() -> Self {
        Self::empty()
    }
}
