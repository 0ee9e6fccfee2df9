/*!
 * Event Layer
 * Typed emitters plus the cross-emitter bus
 *
 * [`Emitter`] is the local surface: synchronous callbacks on one typed
 * event stream. [`EventBus`] federates many emitters behind opaque
 * [`ClassKey`]/[`InstanceKey`] identities so consumers can listen across
 * a whole category of producers without holding any of them.
 */

mod bus;
mod emitter;
mod keys;

pub use bus::{BusConnection, BusEnvelope, EventBus};
pub use emitter::{Emitter, EmitterEvent, OnceEvent, Subscription};
pub use keys::{ClassKey, InstanceKey};
