//! HarvLink firmware runtime
//!
//! Glue between a board's BLE host stack and the board-agnostic link logic
//! in `harvlink-core`:
//!
//! - Bounded channels carrying transport events and user commands
//! - The link task driving the connection manager
//! - The shared telemetry snapshot read by the display
//! - `link.toml` loading
//!
//! The board crate implements [`BleTransport`](harvlink_core::traits::BleTransport),
//! hands an [`EventSender`] to its stack callbacks and spawns
//! [`LinkRunner::run`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod channels;
pub mod config;
pub mod input;
pub mod snapshot;
pub mod tasks;

pub use channels::{EventSender, LinkChannels, LinkCommand};
pub use config::{load_config, parse_config, ParsedConfig};
pub use input::Button;
pub use snapshot::{SharedSnapshot, SnapshotSink, TelemetrySnapshot};
pub use tasks::{link_manager, LinkRunner};
