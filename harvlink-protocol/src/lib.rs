//! Vehicle-controller BLE telemetry protocol
//!
//! This crate encodes the register writes used to configure the controller
//! and decodes the address-tagged telemetry notifications it streams back.
//!
//! # Protocol Overview
//!
//! Both directions share one addressing convention:
//! ```text
//! ┌─────────┬──────────────────┬─────────────┐
//! │ ADDR_LO │ ADDR_HI (5 bits) │ PAYLOAD     │
//! │ 1B      │ 1B, flags masked │ 1–4B        │
//! └─────────┴──────────────────┴─────────────┘
//! ```
//!
//! Outbound commands write to the control register (11) or the channel
//! configuration register (12). Inbound notifications carry one calibrated
//! channel each, described by the [`FieldRegistry`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod command;
pub mod fields;
pub mod packet;

pub use command::{
    build_channel_setup_command, build_control_command, handshake_steps, Command, ControlCommand,
    HandshakeStep, ADDR_CONTROL, ADDR_TIME_CHANNEL,
};
pub use fields::{
    FieldConfig, FieldRegistry, FieldWidth, RegistryError, Signedness, DEFAULT_FIELDS, MAX_FIELDS,
};
pub use packet::{decode_packet, parse_packet, DecodedReading, PacketError};

/// GATT service exposing the telemetry characteristics
pub const SERVICE_UUID: &str = "0000FFE0-0000-1000-8000-00805F9B34FB";

/// Characteristic receiving command writes
pub const WRITE_CHAR_UUID: &str = "0000FFE1-0000-1000-8000-00805F9B34FB";

/// Characteristic emitting telemetry notifications
pub const NOTIFY_CHAR_UUID: &str = "0000FFE2-0000-1000-8000-00805F9B34FB";
