//! Outbound command encoding
//!
//! Commands are plain register writes:
//!
//! ```text
//! ┌──────────┬───────────────────┬────────────┐
//! │ ADDR_LO  │ ADDR_HI & 0x1F    │ PAYLOAD    │
//! │ 1B       │ 1B                │ 1–3B       │
//! └──────────┴───────────────────┴────────────┘
//! ```
//!
//! The top three bits of the high address byte are flag bits on other
//! framings and must always be cleared when writing.

use heapless::Vec;

use crate::fields::{FieldConfig, FieldRegistry};

/// Upload control register
pub const ADDR_CONTROL: u16 = 11;

/// Time-data channel configuration register
pub const ADDR_TIME_CHANNEL: u16 = 12;

/// Mask applied to the high address byte
pub const ADDR_HIGH_MASK: u8 = 0x1F;

/// Longest command we ever build (channel setup)
pub const MAX_COMMAND_SIZE: usize = 5;

/// Sub-commands written to [`ADDR_CONTROL`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ControlCommand {
    /// Stop streaming telemetry
    StopUpload = 0,
    /// Start streaming the configured channels
    StartUpload = 1,
    /// Drop every configured channel
    ClearData = 255,
}

impl ControlCommand {
    /// Get the raw sub-command byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a raw sub-command byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ControlCommand::StopUpload),
            1 => Some(ControlCommand::StartUpload),
            255 => Some(ControlCommand::ClearData),
            _ => None,
        }
    }
}

/// An encoded command, ready to hand to the write characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    bytes: Vec<u8, MAX_COMMAND_SIZE>,
}

impl Command {
    /// Start a write to `address`
    fn write_to(address: u16) -> Self {
        let mut bytes = Vec::new();
        let [low, high] = encode_address(address);
        // Capacity is at least 2
        let _ = bytes.push(low);
        let _ = bytes.push(high);
        Self { bytes }
    }

    fn with_payload(mut self, payload: &[u8]) -> Self {
        // Callers never exceed MAX_COMMAND_SIZE
        let _ = self.bytes.extend_from_slice(payload);
        self
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Target register
    pub fn address(&self) -> u16 {
        decode_address(self.bytes[0], self.bytes[1])
    }

    /// Bytes after the 2-byte address header
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..]
    }
}

impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encode an address as `[low, high & 0x1F]`
pub fn encode_address(address: u16) -> [u8; 2] {
    let [low, high] = address.to_le_bytes();
    [low, high & ADDR_HIGH_MASK]
}

/// Recover an address from its two header bytes, ignoring flag bits
pub fn decode_address(low: u8, high: u8) -> u16 {
    (((high & ADDR_HIGH_MASK) as u16) << 8) | low as u16
}

/// Build a write of `sub_command` to the control register
pub fn build_control_command(sub_command: u8) -> Command {
    Command::write_to(ADDR_CONTROL).with_payload(&[sub_command])
}

/// Build the command enabling one telemetry channel.
///
/// The outer write targets [`ADDR_TIME_CHANNEL`]; the payload is itself an
/// address descriptor `[lo, hi & 0x1F, size]` for the channel to stream.
pub fn build_channel_setup_command(address: u16, size: u8) -> Command {
    let [low, high] = encode_address(address);
    Command::write_to(ADDR_TIME_CHANNEL).with_payload(&[low, high, size])
}

/// Step of the configuration handshake
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeStep<'a> {
    /// Control register write
    Control(ControlCommand),
    /// Enable one channel
    ChannelSetup(&'a FieldConfig),
}

impl HandshakeStep<'_> {
    /// Encode this step
    pub fn command(&self) -> Command {
        match self {
            HandshakeStep::Control(cmd) => build_control_command(cmd.as_u8()),
            HandshakeStep::ChannelSetup(field) => {
                build_channel_setup_command(field.address, field.width.bytes() as u8)
            }
        }
    }
}

/// Ordered configuration handshake for a registry:
/// stop, clear, one setup per field in table order, start.
pub fn handshake_steps(registry: &FieldRegistry) -> impl Iterator<Item = HandshakeStep<'_>> {
    [
        HandshakeStep::Control(ControlCommand::StopUpload),
        HandshakeStep::Control(ControlCommand::ClearData),
    ]
    .into_iter()
    .chain(registry.iter().map(HandshakeStep::ChannelSetup))
    .chain(core::iter::once(HandshakeStep::Control(
        ControlCommand::StartUpload,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ADDR_SPEED, ADDR_TEMPERATURE};

    #[test]
    fn test_control_command_start() {
        let cmd = build_control_command(ControlCommand::StartUpload.as_u8());
        assert_eq!(cmd.as_bytes(), &[0x0B, 0x00, 0x01]);
    }

    #[test]
    fn test_control_command_clear() {
        let cmd = build_control_command(ControlCommand::ClearData.as_u8());
        assert_eq!(cmd.as_bytes(), &[0x0B, 0x00, 0xFF]);
        assert_eq!(cmd.address(), ADDR_CONTROL);
        assert_eq!(cmd.payload(), &[0xFF]);
    }

    #[test]
    fn test_channel_setup_command() {
        let cmd = build_channel_setup_command(ADDR_SPEED, 2);
        assert_eq!(cmd.as_bytes(), &[0x0C, 0x00, 24, 0x00, 2]);
    }

    #[test]
    fn test_channel_setup_masks_both_addresses() {
        // 0xE5AB has flag bits set in the high byte
        let cmd = build_channel_setup_command(0xE5AB, 4);
        assert_eq!(cmd.as_bytes(), &[0x0C, 0x00, 0xAB, 0x05, 4]);
    }

    #[test]
    fn test_encode_address_masks_flags() {
        assert_eq!(encode_address(0xFFFF), [0xFF, 0x1F]);
        assert_eq!(decode_address(0xFF, 0xFF), 0x1FFF);
        assert_eq!(decode_address(0x34, 0x92), 0x1234);
    }

    #[test]
    fn test_control_from_u8() {
        assert_eq!(ControlCommand::from_u8(0), Some(ControlCommand::StopUpload));
        assert_eq!(ControlCommand::from_u8(255), Some(ControlCommand::ClearData));
        assert_eq!(ControlCommand::from_u8(2), None);
    }

    #[test]
    fn test_handshake_order() {
        let registry = FieldRegistry::builtin();
        let steps: heapless::Vec<HandshakeStep<'_>, 16> = handshake_steps(&registry).collect();

        assert_eq!(steps.len(), registry.len() + 3);
        assert_eq!(steps[0], HandshakeStep::Control(ControlCommand::StopUpload));
        assert_eq!(steps[1], HandshakeStep::Control(ControlCommand::ClearData));
        assert_eq!(
            steps[steps.len() - 1],
            HandshakeStep::Control(ControlCommand::StartUpload)
        );

        for (step, field) in steps[2..steps.len() - 1].iter().zip(registry.iter()) {
            assert_eq!(*step, HandshakeStep::ChannelSetup(field));
        }
    }

    #[test]
    fn test_handshake_setup_uses_field_width() {
        let registry = FieldRegistry::builtin();
        let temp = registry.lookup(ADDR_TEMPERATURE).unwrap();
        let cmd = HandshakeStep::ChannelSetup(temp).command();
        assert_eq!(cmd.as_bytes(), &[0x0C, 0x00, 222, 0x00, 1]);
    }
}
