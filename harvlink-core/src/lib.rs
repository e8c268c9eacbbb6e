//! Board-agnostic connection logic for the HarvLink telemetry display
//!
//! This crate contains all application logic that does not depend on a
//! particular BLE host stack:
//!
//! - Transport abstraction trait (scan, connect, write, subscribe)
//! - Connection state machine
//! - Connection manager (handshake sequencing, reconnect, watchdog)
//! - Reading dispatch to the display layer
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod dispatch;
pub mod link;
pub mod state;
pub mod traits;

pub use dispatch::{DispatchError, ReadingDispatcher, ReadingSink};
pub use link::{ConnectionManager, LinkError, LinkStats};
pub use state::{ConnectionState, LinkEvent};
