/*!
 * Typed Event Emitter
 * Synchronous per-kind and wildcard fan-out with RAII subscriptions
 */

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::keys::InstanceKey;

/// Payload type carried by an [`Emitter`].
///
/// `kind` returns the stable tag used for per-kind subscription; every
/// variant of an event enum maps to exactly one tag.
pub trait EmitterEvent: Clone + Send + Sync + 'static {
    fn kind(&self) -> &'static str;
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: u64,
    once: bool,
    cb: Callback<E>,
}

impl<E> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            cb: self.cb.clone(),
        }
    }
}

/// Listener storage shared by every handle of one emitter.
///
/// The table is the emitter's identity: handles are interchangeable and
/// the emitter is alive as long as any handle (or registry reference)
/// keeps the table alive.
pub(crate) struct ListenerTable<E> {
    by_kind: DashMap<&'static str, Vec<Entry<E>>, RandomState>,
    wildcard: RwLock<Vec<Entry<E>>>,
    identity: RwLock<Option<InstanceKey>>,
    next_id: AtomicU64,
}

impl<E> ListenerTable<E> {
    fn new() -> Self {
        Self {
            by_kind: DashMap::with_hasher(RandomState::new()),
            wildcard: RwLock::new(Vec::new()),
            identity: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Typed event emitter.
///
/// Dispatch is synchronous: every listener runs before [`Emitter::emit`]
/// returns, per-kind listeners first and wildcard listeners after, each
/// group in registration order. The listener list is snapshotted at the
/// start of a dispatch, so subscribing during dispatch never fires for
/// the current event and unsubscribing during dispatch never suppresses
/// an already-snapshotted delivery.
pub struct Emitter<E: EmitterEvent> {
    table: Arc<ListenerTable<E>>,
}

impl<E: EmitterEvent> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<E: EmitterEvent> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EmitterEvent> Emitter<E> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(ListenerTable::new()),
        }
    }

    pub(crate) fn from_table(table: Arc<ListenerTable<E>>) -> Self {
        Self { table }
    }

    pub(crate) fn table(&self) -> &Arc<ListenerTable<E>> {
        &self.table
    }

    /// Attach the identity a bus falls back to when this emitter is
    /// connected without an explicit instance key.
    ///
    /// Shared by every handle of the emitter; a later call replaces the
    /// earlier key.
    pub fn set_instance_key(&self, key: InstanceKey) {
        *self.table.identity.write() = Some(key);
    }

    /// Identity attached with [`Emitter::set_instance_key`], if any
    pub fn instance_key(&self) -> Option<InstanceKey> {
        self.table.identity.read().clone()
    }

    /// Listen for one event kind
    pub fn on(
        &self,
        kind: &'static str,
        cb: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(vec![kind], false, cb)
    }

    /// Listen for several event kinds with a single callback
    pub fn on_kinds(
        &self,
        kinds: &[&'static str],
        cb: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        self.register(kinds.to_vec(), false, cb)
    }

    /// Listen for every event regardless of kind
    pub fn on_any(&self, cb: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.table.next_id();
        self.table.wildcard.write().push(Entry {
            id,
            once: false,
            cb: Arc::new(cb),
        });

        let weak = Arc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = weak.upgrade() {
                table.wildcard.write().retain(|e| e.id != id);
            }
        })
    }

    /// Await the next event of one kind.
    ///
    /// The registration is consumed by the first matching emit; dropping
    /// the returned handle before that cancels it.
    pub fn once(&self, kind: &'static str) -> OnceEvent<E> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let sub = self.register(vec![kind], true, move |event: &E| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(event.clone());
            }
        });
        OnceEvent { rx, _sub: sub }
    }

    /// Deliver an event to every matching listener before returning
    pub fn emit(&self, event: &E) {
        let kind = event.kind();

        let targeted: Vec<Entry<E>> = match self.table.by_kind.get(kind) {
            Some(entries) => entries.clone(),
            None => Vec::new(),
        };
        let broad: Vec<Entry<E>> = self.table.wildcard.read().clone();

        let mut fired_once: Vec<u64> = Vec::new();
        for entry in &targeted {
            (entry.cb)(event);
            if entry.once {
                fired_once.push(entry.id);
            }
        }
        for entry in &broad {
            (entry.cb)(event);
        }

        if !fired_once.is_empty() {
            if let Some(mut entries) = self.table.by_kind.get_mut(kind) {
                entries.retain(|e| !fired_once.contains(&e.id));
            }
        }
    }

    /// Drop every listener, targeted and wildcard alike
    pub fn clear(&self) {
        self.table.by_kind.clear();
        self.table.wildcard.write().clear();
    }

    /// Number of live registrations across all kinds
    pub fn listener_count(&self) -> usize {
        let targeted: usize = self.table.by_kind.iter().map(|e| e.value().len()).sum();
        targeted + self.table.wildcard.read().len()
    }

    fn register(
        &self,
        kinds: Vec<&'static str>,
        once: bool,
        cb: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.table.next_id();
        let cb: Callback<E> = Arc::new(cb);
        for kind in &kinds {
            self.table.by_kind.entry(kind).or_default().push(Entry {
                id,
                once,
                cb: cb.clone(),
            });
        }

        let weak = Arc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = weak.upgrade() {
                for kind in &kinds {
                    if let Some(mut entries) = table.by_kind.get_mut(kind) {
                        entries.retain(|e| e.id != id);
                    }
                }
            }
        })
    }
}

impl<E: EmitterEvent> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Guard for one listener registration.
///
/// Dropping it detaches the listener; [`Subscription::forget`] keeps the
/// listener attached for the emitter's remaining lifetime. Detaching
/// holds only a weak reference, so a subscription never keeps its
/// emitter alive.
#[must_use = "dropping a subscription detaches the listener"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detach the listener now
    pub fn unsubscribe(mut self) {
        self.run();
    }

    /// Leave the listener attached forever
    pub fn forget(mut self) {
        self.detach = None;
    }

    fn run(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

/// Pending one-shot delivery returned by [`Emitter::once`]
pub struct OnceEvent<E> {
    rx: oneshot::Receiver<E>,
    _sub: Subscription,
}

impl<E> OnceEvent<E> {
    /// Resolve to the next matching event, or `None` if every emitter
    /// handle was dropped first
    pub async fn wait(self) -> Option<E> {
        self.rx.await.ok()
    }
}
