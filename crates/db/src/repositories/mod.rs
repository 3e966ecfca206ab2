//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod location_repo;

pub use location_repo::{DeleteOutcome, LocationRepo};
