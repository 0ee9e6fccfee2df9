/*!
 * Cross-Emitter Event Bus
 * Weak registry of emitters with class- and instance-scoped listeners
 */

use ahash::RandomState;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

use super::emitter::{Emitter, EmitterEvent, ListenerTable, Subscription};
use super::keys::{ClassKey, InstanceKey};

/// One event as seen through the bus: the payload plus the identity of
/// the emitter it came from.
#[derive(Clone)]
pub struct BusEnvelope<E> {
    pub kind: &'static str,
    pub class: ClassKey,
    pub instance: InstanceKey,
    pub event: E,
}

impl<E: fmt::Debug> fmt::Debug for BusEnvelope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusEnvelope")
            .field("kind", &self.kind)
            .field("class", &self.class)
            .field("instance", &self.instance)
            .field("event", &self.event)
            .finish()
    }
}

type BusCallback<E> = Arc<dyn Fn(&BusEnvelope<E>) + Send + Sync>;

struct BusEntry<E> {
    id: u64,
    kinds: Option<Vec<&'static str>>,
    cb: BusCallback<E>,
}

impl<E> BusEntry<E> {
    fn matches(&self, kind: &'static str) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

impl<E> Clone for BusEntry<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kinds: self.kinds.clone(),
            cb: self.cb.clone(),
        }
    }
}

/// A connected emitter: its class, a weak handle to it, and the forward
/// subscription that re-emits its events onto the bus.
struct Registered<E> {
    class: ClassKey,
    table: Weak<ListenerTable<E>>,
    _forward: Subscription,
}

struct BusInner<E: EmitterEvent> {
    registry: DashMap<InstanceKey, Registered<E>, RandomState>,
    by_class: DashMap<ClassKey, Vec<InstanceKey>, RandomState>,
    class_listeners: DashMap<ClassKey, Vec<BusEntry<E>>, RandomState>,
    instance_listeners: DashMap<InstanceKey, Vec<BusEntry<E>>, RandomState>,
    next_id: AtomicU64,
}

impl<E: EmitterEvent> BusInner<E> {
    fn dispatch(&self, envelope: &BusEnvelope<E>) {
        let scoped: Vec<BusCallback<E>> = match self.class_listeners.get(&envelope.class) {
            Some(entries) => entries
                .iter()
                .filter(|e| e.matches(envelope.kind))
                .map(|e| e.cb.clone())
                .collect(),
            None => Vec::new(),
        };
        let targeted: Vec<BusCallback<E>> = match self.instance_listeners.get(&envelope.instance) {
            Some(entries) => entries
                .iter()
                .filter(|e| e.matches(envelope.kind))
                .map(|e| e.cb.clone())
                .collect(),
            None => Vec::new(),
        };

        for cb in scoped.iter().chain(targeted.iter()) {
            cb(envelope);
        }
    }

    fn remove_registration(&self, instance: &InstanceKey) -> bool {
        let Some((_, registered)) = self.registry.remove(instance) else {
            return false;
        };
        if let Some(mut members) = self.by_class.get_mut(&registered.class) {
            members.retain(|key| key != instance);
        }
        // Dropping `registered` detaches the forward subscription from
        // the emitter, when the emitter is still alive.
        true
    }
}

/// Shared bus over every emitter of one event type.
///
/// Connecting registers an emitter under a class and instance key and
/// forwards each of its events to bus listeners synchronously, in the
/// same dispatch pass as the emitter's own listeners. The registry holds
/// emitters weakly: an emitter that is dropped without being
/// disconnected simply disappears, and its stale registration is pruned
/// on the next lookup.
pub struct EventBus<E: EmitterEvent> {
    inner: Arc<BusInner<E>>,
}

impl<E: EmitterEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: EmitterEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EmitterEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: DashMap::with_hasher(RandomState::new()),
                by_class: DashMap::with_hasher(RandomState::new()),
                class_listeners: DashMap::with_hasher(RandomState::new()),
                instance_listeners: DashMap::with_hasher(RandomState::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register an emitter under a class, optionally under a caller-chosen
    /// instance key.
    ///
    /// Without an explicit key the emitter's own attached key (see
    /// [`Emitter::set_instance_key`]) is used; if the emitter carries
    /// none either, a fresh key is minted from the class label.
    /// Connecting again under an already-registered instance key
    /// replaces the previous registration.
    pub fn connect(
        &self,
        class: &ClassKey,
        emitter: &Emitter<E>,
        instance: Option<InstanceKey>,
    ) -> BusConnection<E> {
        let instance = instance
            .or_else(|| emitter.instance_key())
            .unwrap_or_else(|| InstanceKey::new(class.label()));
        self.inner.remove_registration(&instance);

        let weak_inner = Arc::downgrade(&self.inner);
        let fwd_class = class.clone();
        let fwd_instance = instance.clone();
        let forward = emitter.on_any(move |event: &E| {
            if let Some(inner) = weak_inner.upgrade() {
                inner.dispatch(&BusEnvelope {
                    kind: event.kind(),
                    class: fwd_class.clone(),
                    instance: fwd_instance.clone(),
                    event: event.clone(),
                });
            }
        });

        self.inner.registry.insert(
            instance.clone(),
            Registered {
                class: class.clone(),
                table: Arc::downgrade(emitter.table()),
                _forward: forward,
            },
        );
        self.inner
            .by_class
            .entry(class.clone())
            .or_default()
            .push(instance.clone());

        trace!(class = %class, instance = %instance, "emitter connected");
        BusConnection {
            bus: Arc::downgrade(&self.inner),
            instance,
        }
    }

    /// Listen to every connected (and future-connected) emitter of a class
    pub fn on_class(
        &self,
        class: &ClassKey,
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register_class(class, None, cb)
    }

    /// Listen to one event kind across a class
    pub fn on_kind(
        &self,
        class: &ClassKey,
        kind: &'static str,
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register_class(class, Some(vec![kind]), cb)
    }

    /// Listen to several event kinds across a class
    pub fn on_kinds(
        &self,
        class: &ClassKey,
        kinds: &[&'static str],
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register_class(class, Some(kinds.to_vec()), cb)
    }

    /// Listen to everything one instance emits.
    ///
    /// The registration is keyed by instance identity and survives
    /// disconnection: if the key is later connected again, the listener
    /// fires again.
    pub fn on_instance(
        &self,
        instance: &InstanceKey,
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register_instance(instance, None, cb)
    }

    /// Listen to one event kind from one instance
    pub fn on_instance_kind(
        &self,
        instance: &InstanceKey,
        kind: &'static str,
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register_instance(instance, Some(vec![kind]), cb)
    }

    /// Listen to several event kinds from one instance
    pub fn on_instance_kinds(
        &self,
        instance: &InstanceKey,
        kinds: &[&'static str],
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        self.register_instance(instance, Some(kinds.to_vec()), cb)
    }

    /// Live emitter registered under an instance key.
    ///
    /// Stale registrations left behind by dropped emitters are pruned
    /// here instead of returned.
    pub fn get(&self, instance: &InstanceKey) -> Option<Emitter<E>> {
        let table = {
            let registered = self.inner.registry.get(instance)?;
            registered.table.upgrade()
        };
        match table {
            Some(table) => Some(Emitter::from_table(table)),
            None => {
                self.inner.remove_registration(instance);
                None
            }
        }
    }

    /// Every live emitter of a class, pruning dead registrations
    pub fn get_by_class(&self, class: &ClassKey) -> Vec<Emitter<E>> {
        let members: Vec<InstanceKey> = match self.inner.by_class.get(class) {
            Some(members) => members.clone(),
            None => return Vec::new(),
        };
        members
            .iter()
            .filter_map(|instance| self.get(instance))
            .collect()
    }

    /// Deterministically unregister an instance; idempotent
    pub fn disconnect(&self, instance: &InstanceKey) -> bool {
        let removed = self.inner.remove_registration(instance);
        if removed {
            trace!(instance = %instance, "emitter disconnected");
        }
        removed
    }

    /// Unregister every instance of a class, returning how many
    pub fn disconnect_class(&self, class: &ClassKey) -> usize {
        let members: Vec<InstanceKey> = match self.inner.by_class.remove(class) {
            Some((_, members)) => members,
            None => return 0,
        };
        let mut count = 0;
        for instance in &members {
            if self.inner.registry.remove(instance).is_some() {
                count += 1;
            }
        }
        trace!(class = %class, count, "class disconnected");
        count
    }

    /// Number of registrations currently held, live or stale
    pub fn connected_count(&self) -> usize {
        self.inner.registry.len()
    }

    fn register_class(
        &self,
        class: &ClassKey,
        kinds: Option<Vec<&'static str>>,
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .class_listeners
            .entry(class.clone())
            .or_default()
            .push(BusEntry {
                id,
                kinds,
                cb: Arc::new(cb),
            });

        let weak = Arc::downgrade(&self.inner);
        let key = class.clone();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Some(mut entries) = inner.class_listeners.get_mut(&key) {
                    entries.retain(|e| e.id != id);
                }
            }
        })
    }

    fn register_instance(
        &self,
        instance: &InstanceKey,
        kinds: Option<Vec<&'static str>>,
        cb: impl Fn(&BusEnvelope<E>) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .instance_listeners
            .entry(instance.clone())
            .or_default()
            .push(BusEntry {
                id,
                kinds,
                cb: Arc::new(cb),
            });

        let weak = Arc::downgrade(&self.inner);
        let key = instance.clone();
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Some(mut entries) = inner.instance_listeners.get_mut(&key) {
                    entries.retain(|e| e.id != id);
                }
            }
        })
    }
}

impl<E: EmitterEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("connected", &self.connected_count())
            .finish()
    }
}

/// Handle for one `connect` registration.
///
/// Holds the instance key and a weak reference to the bus; dropping the
/// handle does nothing (the registration stays until an explicit
/// disconnect or until the emitter itself goes away).
pub struct BusConnection<E: EmitterEvent> {
    bus: Weak<BusInner<E>>,
    instance: InstanceKey,
}

impl<E: EmitterEvent> BusConnection<E> {
    pub fn instance(&self) -> &InstanceKey {
        &self.instance
    }

    /// Unregister this connection from the bus
    pub fn disconnect(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.remove_registration(&self.instance),
            None => false,
        }
    }
}

impl<E: EmitterEvent> fmt::Debug for BusConnection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConnection")
            .field("instance", &self.instance)
            .finish()
    }
}
