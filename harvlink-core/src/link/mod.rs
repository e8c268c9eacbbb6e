//! Link lifecycle
//!
//! Drives scanning, connection, configuration and monitoring of the BLE
//! link to the vehicle controller.

pub mod manager;
pub mod stats;
pub mod watchdog;

pub use manager::{ConnectionManager, LinkError};
pub use stats::LinkStats;
pub use watchdog::TelemetryWatchdog;
