//! Domain events and their distribution.
//!
//! Aggregates return typed events; infrastructure wraps them in an
//! [`EventEnvelope`] and publishes them on an [`EventBus`] for external
//! collaborators (e.g. order placement).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
