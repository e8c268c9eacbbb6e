//! Configuration types
//!
//! Board-agnostic link parameters: which advertisers to connect to and the
//! timing the controller firmware needs between commands.

pub mod types;

pub use types::*;
