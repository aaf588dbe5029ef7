//! Outbound event hooks.
//!
//! Financial flows never call notification or analytics code directly. They publish an event
//! after their transaction commits, and interested parties (push notifications, e-mail, metrics)
//! subscribe through [`EventHooks`]. A slow or broken subscriber can therefore never roll back a
//! payment.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
