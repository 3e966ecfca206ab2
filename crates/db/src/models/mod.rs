//! Row types for the location tables.

pub mod location;
