//! `stockplan-events` — lifecycle event distribution.
//!
//! The engine emits lifecycle events (job approved, inventory reserved, ...)
//! to an external sink. This crate provides the sink abstraction: a typed
//! `Event` trait plus a transport-agnostic pub/sub `EventBus`.
//!
//! Emission is fire-and-forget from the domain's perspective: a publish
//! failure must never roll back the operation that produced the event.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
