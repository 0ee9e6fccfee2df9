/*!
 * Identity Keys
 * Opaque class and instance handles compared by identity, not by label
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

fn next_key_id() -> u64 {
    NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
struct KeyCore {
    id: u64,
    label: String,
}

/// Identity of a *category* of emitters (for example "disk").
///
/// Equality is by identity: two keys created with the same label are
/// different keys, and cloning is the only way to obtain an equal one.
/// The label exists purely for logs and debugging.
#[derive(Clone)]
pub struct ClassKey(Arc<KeyCore>);

impl ClassKey {
    pub fn new(label: impl Into<String>) -> Self {
        Self(Arc::new(KeyCore {
            id: next_key_id(),
            label: label.into(),
        }))
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }
}

impl PartialEq for ClassKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ClassKey {}

impl std::hash::Hash for ClassKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassKey({}#{})", self.0.label, self.0.id)
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.label)
    }
}

/// Identity of one concrete emitter registered on a bus.
///
/// Same identity semantics as [`ClassKey`]; the two are separate types
/// so a class can never be used where an instance is expected.
#[derive(Clone)]
pub struct InstanceKey(Arc<KeyCore>);

impl InstanceKey {
    pub fn new(label: impl Into<String>) -> Self {
        Self(Arc::new(KeyCore {
            id: next_key_id(),
            label: label.into(),
        }))
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }
}

impl PartialEq for InstanceKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for InstanceKey {}

impl std::hash::Hash for InstanceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceKey({}#{})", self.0.label, self.0.id)
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.label)
    }
}
