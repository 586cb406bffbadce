//! Test utilities for CacheLite integration tests
//!
//! Loaders with observable behaviour plus fixtures that wire components to a
//! manually advanced clock.

pub mod fixtures;
pub mod loaders;
