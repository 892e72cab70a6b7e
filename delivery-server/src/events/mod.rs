//! Lifecycle event publishing and consumption
//!
//! Events are published after the originating transaction commits and are
//! best-effort: a failed publish is logged and never fails the business
//! operation. Delivery to consumers is at-least-once; handlers must be
//! idempotent.

mod consumer;
mod producer;

pub use consumer::{dispatch, EventConsumer, EventHandler};
pub use producer::EventProducer;
