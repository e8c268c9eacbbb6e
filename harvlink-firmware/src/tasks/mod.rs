//! Long-running tasks
//!
//! The board crate spawns these on its executor; they are plain async
//! functions so this crate does not depend on a particular executor.

pub mod link;

pub use link::{link_manager, LinkRunner, TICK_INTERVAL_MS};
