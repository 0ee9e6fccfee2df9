/*!
 * Bus Lifecycle Tests
 * Weak registry behavior: drops, disconnects, sweeps
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use atelier_core::events::{ClassKey, Emitter, EmitterEvent, EventBus};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tick(u32);

impl EmitterEvent for Tick {
    fn kind(&self) -> &'static str {
        "tick"
    }
}

#[test]
fn test_dropped_emitter_vanishes_without_disconnect() {
    let bus: EventBus<Tick> = EventBus::new();
    let class = ClassKey::new("clock");

    let kept = Emitter::new();
    bus.connect(&class, &kept, None);
    let doomed_instance = {
        let doomed = Emitter::new();
        let connection = bus.connect(&class, &doomed, None);
        connection.instance().clone()
    };

    assert_eq!(bus.connected_count(), 2);

    // The doomed emitter is gone; lookup prunes its stale registration
    assert!(bus.get(&doomed_instance).is_none());
    assert_eq!(bus.connected_count(), 1);
    assert_eq!(bus.get_by_class(&class).len(), 1);
}

#[test]
fn test_disconnect_stops_forwarding_but_not_the_emitter() {
    let bus: EventBus<Tick> = EventBus::new();
    let class = ClassKey::new("clock");
    let emitter = Emitter::new();
    let connection = bus.connect(&class, &emitter, None);

    let bus_hits = Arc::new(AtomicUsize::new(0));
    let local_hits = Arc::new(AtomicUsize::new(0));
    let bus_sink = bus_hits.clone();
    let local_sink = local_hits.clone();
    bus.on_class(&class, move |_| {
        bus_sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();
    emitter
        .on("tick", move |_| {
            local_sink.fetch_add(1, Ordering::SeqCst);
        })
        .forget();

    emitter.emit(&Tick(1));
    assert!(connection.disconnect());
    emitter.emit(&Tick(2));

    // The bus heard only the first tick; local listeners heard both
    assert_eq!(bus_hits.load(Ordering::SeqCst), 1);
    assert_eq!(local_hits.load(Ordering::SeqCst), 2);
    assert_eq!(bus.connected_count(), 0);
}

#[test]
fn test_disconnect_is_idempotent() {
    let bus: EventBus<Tick> = EventBus::new();
    let class = ClassKey::new("clock");
    let emitter = Emitter::new();
    let connection = bus.connect(&class, &emitter, None);
    let instance = connection.instance().clone();

    assert!(bus.disconnect(&instance));
    assert!(!bus.disconnect(&instance));
    assert!(!connection.disconnect());
}

#[test]
fn test_disconnect_class_sweeps_every_member() {
    let bus: EventBus<Tick> = EventBus::new();
    let clocks = ClassKey::new("clock");
    let timers = ClassKey::new("timer");

    let a = Emitter::new();
    let b = Emitter::new();
    let c = Emitter::new();
    bus.connect(&clocks, &a, None);
    bus.connect(&clocks, &b, None);
    bus.connect(&timers, &c, None);

    assert_eq!(bus.disconnect_class(&clocks), 2);
    assert_eq!(bus.connected_count(), 1);
    assert!(bus.get_by_class(&clocks).is_empty());
    assert_eq!(bus.get_by_class(&timers).len(), 1);
}

#[test]
fn test_bus_does_not_keep_emitters_alive() {
    struct DropFlag(Arc<AtomicUsize>);
    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let bus: EventBus<Tick> = EventBus::new();
    let class = ClassKey::new("clock");

    let dropped = Arc::new(AtomicUsize::new(0));
    let emitter = Emitter::new();
    let guard = DropFlag(dropped.clone());
    emitter
        .on("tick", move |_| {
            let _ = &guard;
        })
        .forget();
    bus.connect(&class, &emitter, None);

    // Dropping the last handle tears the listener table down even
    // though the bus still has a registration for it
    drop(emitter);
    assert_eq!(
        dropped.load(Ordering::SeqCst),
        1,
        "registry must hold emitters weakly"
    );
}
