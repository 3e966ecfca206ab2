//! In-process event bus for the operations console.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`ConsoleEvent`]: a change notification about one node or the whole hierarchy.
//! - [`event_types`]: names of the events screens exchange about locations.

pub mod bus;

pub use bus::{event_types, EventBus, ConsoleEvent};
