//! Domain types and pure algorithms for the ISP operations console.
//!
//! This crate has no internal dependencies and performs no I/O, so it can be
//! shared by the persistence layer, the orchestration layer, and the HTTP
//! surface alike.

pub mod error;
pub mod hierarchy;
pub mod types;
