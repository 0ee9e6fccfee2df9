/*!
 * Bus Routing Tests
 * Class- and instance-scoped delivery across many emitters
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use atelier_core::events::{BusEnvelope, ClassKey, Emitter, EmitterEvent, EventBus, InstanceKey};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SensorEvent {
    Reading { value: i64 },
    Fault { code: u16 },
}

impl EmitterEvent for SensorEvent {
    fn kind(&self) -> &'static str {
        match self {
            SensorEvent::Reading { .. } => "reading",
            SensorEvent::Fault { .. } => "fault",
        }
    }
}

fn sensor() -> Emitter<SensorEvent> {
    Emitter::new()
}

#[test]
fn test_class_listener_spans_every_member() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");

    let first = sensor();
    let second = sensor();
    bus.connect(&class, &first, None);
    bus.connect(&class, &second, None);

    let values = Arc::new(Mutex::new(Vec::new()));
    let sink = values.clone();
    bus.on_class(&class, move |envelope| {
        if let SensorEvent::Reading { value } = envelope.event {
            sink.lock().push(value);
        }
    })
    .forget();

    first.emit(&SensorEvent::Reading { value: 1 });
    second.emit(&SensorEvent::Reading { value: 2 });

    // Members connected after the listener report too
    let third = sensor();
    bus.connect(&class, &third, None);
    third.emit(&SensorEvent::Reading { value: 3 });

    assert_eq!(values.lock().as_slice(), &[1, 2, 3]);
}

#[test]
fn test_kind_filter_and_envelope_identity() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");
    let emitter = sensor();
    let connection = bus.connect(&class, &emitter, None);
    let me = connection.instance().clone();

    let seen: Arc<Mutex<Vec<(&'static str, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let expected_class = class.clone();
    bus.on_kind(&class, "fault", move |envelope: &BusEnvelope<SensorEvent>| {
        sink.lock()
            .push((envelope.kind, envelope.class == expected_class && envelope.instance == me));
    })
    .forget();

    emitter.emit(&SensorEvent::Reading { value: 9 });
    emitter.emit(&SensorEvent::Fault { code: 7 });

    assert_eq!(seen.lock().as_slice(), &[("fault", true)]);
}

#[test]
fn test_instance_listener_targets_one_member() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");

    let left = sensor();
    let right = sensor();
    let left_conn = bus.connect(&class, &left, None);
    bus.connect(&class, &right, None);

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    bus.on_instance(left_conn.instance(), move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();

    left.emit(&SensorEvent::Reading { value: 1 });
    right.emit(&SensorEvent::Reading { value: 2 });
    right.emit(&SensorEvent::Fault { code: 3 });

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_instance_kind_filter_targets_one_member_and_kind() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");

    let left = sensor();
    let right = sensor();
    let left_conn = bus.connect(&class, &left, None);
    bus.connect(&class, &right, None);

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    bus.on_instance_kind(left_conn.instance(), "fault", move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();

    left.emit(&SensorEvent::Fault { code: 1 });
    left.emit(&SensorEvent::Reading { value: 2 });
    right.emit(&SensorEvent::Fault { code: 3 });

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_emitter_attached_key_names_the_connection() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");

    let emitter = sensor();
    let key = InstanceKey::new("probe-7");
    emitter.set_instance_key(key.clone());

    let connection = bus.connect(&class, &emitter, None);
    assert_eq!(connection.instance(), &key);

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    bus.on_instance(&key, move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();
    emitter.emit(&SensorEvent::Reading { value: 1 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_same_label_classes_stay_separate() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class_a = ClassKey::new("sensor");
    let class_b = ClassKey::new("sensor");

    let emitter = sensor();
    bus.connect(&class_a, &emitter, None);

    let a_hits = Arc::new(AtomicUsize::new(0));
    let b_hits = Arc::new(AtomicUsize::new(0));
    let a_sink = a_hits.clone();
    let b_sink = b_hits.clone();
    bus.on_class(&class_a, move |_| {
        a_sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();
    bus.on_class(&class_b, move |_| {
        b_sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();

    emitter.emit(&SensorEvent::Reading { value: 1 });

    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    assert_eq!(b_hits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_explicit_instance_keys_allow_reconnect_targeting() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");
    let stable = InstanceKey::new("sensor-42");

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    bus.on_instance(&stable, move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();

    let first = sensor();
    bus.connect(&class, &first, Some(stable.clone()));
    first.emit(&SensorEvent::Reading { value: 1 });

    // A replacement emitter under the same instance key keeps the
    // instance listener working
    let second = sensor();
    bus.connect(&class, &second, Some(stable.clone()));
    second.emit(&SensorEvent::Reading { value: 2 });

    // The replaced emitter no longer reaches the bus
    first.emit(&SensorEvent::Reading { value: 3 });

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_get_returns_a_live_handle() {
    let bus: EventBus<SensorEvent> = EventBus::new();
    let class = ClassKey::new("sensor");
    let emitter = sensor();
    let connection = bus.connect(&class, &emitter, None);

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    emitter
        .on("reading", move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .forget();

    // Emitting through the looked-up handle reaches the original's
    // listeners: both are views of the same listener table
    let handle = bus.get(connection.instance()).expect("registered emitter");
    handle.emit(&SensorEvent::Reading { value: 5 });
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert_eq!(bus.get_by_class(&class).len(), 1);
}
