//! Connection state machine
//!
//! Defines the authoritative lifecycle of the BLE link.
//! The state machine is explicit, finite, and deterministic.

pub mod events;
pub mod machine;

pub use events::LinkEvent;
pub use machine::ConnectionState;
