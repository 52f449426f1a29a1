//! Events and their payloads.
//!
//! Payloads are plain serializable structs behind a [`EventData`] trait
//! object: the engine moves them around without knowing their type, and a
//! handler recovers the concrete type by downcasting (see
//! [`cast!`](crate::cast!)). Serializability is required so events can be
//! rendered in trace logs.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

use crate::component::Id;

/// Event identifier, used as a handle for cancellation.
///
/// Identifiers are assigned sequentially, so comparing them orders events
/// by scheduling time.
pub type EventId = u64;

/// Marker trait for event payloads, implemented automatically for any
/// serializable static type.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl<T: Serialize + 'static> EventData for T {}

impl_downcast!(EventData);
erased_serde::serialize_trait_object!(EventData);

/// A scheduled event, owned by the engine from scheduling until dispatch
/// or cancellation.
pub struct Event {
    /// Unique event identifier, assigned in scheduling order.
    pub id: EventId,
    /// Time at which the event fires.
    pub time: f64,
    /// Component which scheduled the event.
    pub src: Id,
    /// Component the event is delivered to.
    pub dest: Id,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Ord for Event {
    // Inverted so that BinaryHeap, a max-heap, pops the earliest event
    // first. Ties on time are broken by id, i.e. by scheduling order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
