//! Inbound notification decoding
//!
//! Notification format:
//! - ADDR_LO (1 byte)
//! - ADDR_HI | FLAGS (1 byte): top 3 bits are flags, masked off
//! - PAYLOAD (width bytes): little-endian sample, width from the registry
//!
//! A single notify characteristic multiplexes every channel, so one decoder
//! handles all of them through the registry.

use crate::command::decode_address;
use crate::fields::{FieldRegistry, FieldWidth, Signedness};

/// Size of the address header
pub const HEADER_SIZE: usize = 2;

/// Shortest notification that can carry a sample
pub const MIN_PACKET_SIZE: usize = HEADER_SIZE + 1;

/// Why a notification could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Fewer than [`MIN_PACKET_SIZE`] bytes
    TooShort,
    /// Address has no registry entry
    UnknownAddress(u16),
    /// Payload shorter than the field width
    Truncated { address: u16, needed: usize, got: usize },
}

impl PacketError {
    /// Address carried by the rejected packet, if a header was present
    pub fn address(&self) -> Option<u16> {
        match self {
            PacketError::TooShort => None,
            PacketError::UnknownAddress(address) => Some(*address),
            PacketError::Truncated { address, .. } => Some(*address),
        }
    }
}

/// A calibrated sample
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedReading {
    /// Telemetry address
    pub address: u16,
    /// Calibrated value (0.0 when invalid)
    pub value: f32,
    /// False when the packet was dropped
    pub valid: bool,
}

impl DecodedReading {
    /// A dropped packet
    pub const fn invalid(address: u16) -> Self {
        Self {
            address,
            value: 0.0,
            valid: false,
        }
    }
}

/// Read the raw sample for a field, honoring its signedness
fn read_raw(payload: &[u8], width: FieldWidth, signedness: Signedness) -> i64 {
    match (width, signedness) {
        (FieldWidth::One, Signedness::Signed) => payload[0] as i8 as i64,
        (FieldWidth::One, Signedness::Unsigned) => payload[0] as i64,
        (FieldWidth::Two, Signedness::Signed) => {
            i16::from_le_bytes([payload[0], payload[1]]) as i64
        }
        (FieldWidth::Two, Signedness::Unsigned) => {
            u16::from_le_bytes([payload[0], payload[1]]) as i64
        }
        (FieldWidth::Four, Signedness::Signed) => {
            i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as i64
        }
        (FieldWidth::Four, Signedness::Unsigned) => {
            u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as i64
        }
    }
}

/// Decode a notification, reporting why it was rejected
pub fn decode_packet(registry: &FieldRegistry, bytes: &[u8]) -> Result<DecodedReading, PacketError> {
    if bytes.len() < MIN_PACKET_SIZE {
        return Err(PacketError::TooShort);
    }

    let address = decode_address(bytes[0], bytes[1]);
    let field = registry
        .lookup(address)
        .ok_or(PacketError::UnknownAddress(address))?;

    let needed = field.width.bytes();
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() < needed {
        return Err(PacketError::Truncated {
            address,
            needed,
            got: payload.len(),
        });
    }

    let raw = read_raw(payload, field.width, field.signedness);

    Ok(DecodedReading {
        address,
        value: field.calibrate(raw),
        valid: true,
    })
}

/// Decode a notification, failing soft.
///
/// Malformed packets yield `valid == false` and a zero value; the address is
/// kept when the header was readable.
pub fn parse_packet(registry: &FieldRegistry, bytes: &[u8]) -> DecodedReading {
    decode_packet(registry, bytes)
        .unwrap_or_else(|e| DecodedReading::invalid(e.address().unwrap_or(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::*;
    use proptest::prelude::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-4 * b.abs().max(1.0)
    }

    /// Synthesize a notification carrying `raw` for `field`
    fn notification(field: &FieldConfig, raw: i64) -> heapless::Vec<u8, 8> {
        let mut bytes = heapless::Vec::new();
        bytes.extend_from_slice(&field.address.to_le_bytes()).unwrap();
        let le = raw.to_le_bytes();
        bytes.extend_from_slice(&le[..field.width.bytes()]).unwrap();
        bytes
    }

    #[test]
    fn test_speed_calibration() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[24, 0x00, 0x25, 0x03]); // 805
        assert!(reading.valid);
        assert_eq!(reading.address, 24);
        assert!(approx(reading.value, 80.5));
    }

    #[test]
    fn test_every_builtin_field_decodes() {
        let registry = FieldRegistry::builtin();
        for field in registry.iter() {
            let raw = 100;
            let bytes = notification(field, raw);
            let reading = parse_packet(&registry, &bytes);
            assert!(reading.valid, "address {}", field.address);
            assert_eq!(reading.address, field.address);
            assert!(approx(reading.value, (raw as f32 - field.offset) / field.scale));
        }
    }

    #[test]
    fn test_temperature_is_unsigned_byte() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[222, 0x00, 0x28]);
        assert!(reading.valid);
        assert_eq!(reading.value, 0.0);

        // 0xC8 = 200, must not be read as -56
        let hot = parse_packet(&registry, &[222, 0x00, 0xC8]);
        assert_eq!(hot.value, 160.0);
    }

    #[test]
    fn test_generic_byte_is_signed() {
        let registry = FieldRegistry::from_fields(&[FieldConfig::signed(
            300,
            FieldWidth::One,
            1.0,
            "Motor",
            "C",
        )])
        .unwrap();
        let [lo, hi] = 300u16.to_le_bytes();
        let reading = parse_packet(&registry, &[lo, hi, 0xFF]);
        assert!(reading.valid);
        assert_eq!(reading.value, -1.0);
    }

    #[test]
    fn test_voltage_is_unsigned_word() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[113, 0x00, 0xE8, 0x03]);
        assert!(reading.valid);
        assert!(approx(reading.value, 100.0));

        // High bit set stays positive
        let high = parse_packet(&registry, &[113, 0x00, 0xFF, 0xFF]);
        assert!(approx(high.value, 6553.5));
    }

    #[test]
    fn test_current_is_signed_word() {
        let registry = FieldRegistry::builtin();
        // -25 as i16 = 0xFFE7
        let reading = parse_packet(&registry, &[119, 0x00, 0xE7, 0xFF]);
        assert!(reading.valid);
        assert!(approx(reading.value, -2.5));
    }

    #[test]
    fn test_four_byte_fields() {
        let registry = FieldRegistry::from_fields(&[
            FieldConfig::signed(40, FieldWidth::Four, 100.0, "Odo", "km"),
            FieldConfig::unsigned(41, FieldWidth::Four, 1.0, "Hours", "s"),
        ])
        .unwrap();

        let odo = parse_packet(&registry, &[40, 0x00, 0x00, 0xFF, 0xFF, 0xFF]);
        assert!(approx(odo.value, -(256 as f32) / 100.0));

        let hours = parse_packet(&registry, &[41, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(approx(hours.value, u32::MAX as f32));
    }

    #[test]
    fn test_flag_bits_are_masked() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[26, 0xE0, 75, 0x00]);
        assert!(reading.valid);
        assert_eq!(reading.address, ADDR_SOC);
        assert_eq!(reading.value, 75.0);
    }

    #[test]
    fn test_short_packet_invalid() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[24, 0x00]);
        assert!(!reading.valid);
        assert_eq!(reading.value, 0.0);
        assert_eq!(decode_packet(&registry, &[]), Err(PacketError::TooShort));
    }

    #[test]
    fn test_unknown_address_invalid() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[0x99, 0x00, 0x01, 0x02]);
        assert!(!reading.valid);
        assert_eq!(reading.address, 0x99);
        assert_eq!(
            decode_packet(&registry, &[0x99, 0x00, 0x01]),
            Err(PacketError::UnknownAddress(0x99))
        );
    }

    #[test]
    fn test_truncated_payload_invalid() {
        let registry = FieldRegistry::builtin();
        assert_eq!(
            decode_packet(&registry, &[24, 0x00, 0x25]),
            Err(PacketError::Truncated {
                address: 24,
                needed: 2,
                got: 1
            })
        );
        assert!(!parse_packet(&registry, &[24, 0x00, 0x25]).valid);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let registry = FieldRegistry::builtin();
        let reading = parse_packet(&registry, &[222, 0x00, 65, 0xAA, 0xBB]);
        assert!(reading.valid);
        assert_eq!(reading.value, 25.0);
    }

    proptest! {
        #[test]
        fn prop_two_byte_packets_never_valid(a in any::<u8>(), b in any::<u8>()) {
            let registry = FieldRegistry::builtin();
            prop_assert!(!parse_packet(&registry, &[a, b]).valid);
        }

        #[test]
        fn prop_parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..24)) {
            let registry = FieldRegistry::builtin();
            let reading = parse_packet(&registry, &bytes);
            if !reading.valid {
                prop_assert_eq!(reading.value, 0.0);
            }
        }

        #[test]
        fn prop_unsigned_words_never_negative(raw in any::<u16>()) {
            let registry = FieldRegistry::builtin();
            let [lo, hi] = raw.to_le_bytes();
            for address in [ADDR_SPEED, ADDR_SOC, ADDR_VOLTAGE, ADDR_THROTTLE] {
                let reading = parse_packet(&registry, &[address as u8, 0x00, lo, hi]);
                prop_assert!(reading.valid);
                prop_assert!(reading.value >= 0.0);
            }
        }

        #[test]
        fn prop_signed_word_calibration(raw in any::<i16>()) {
            let registry = FieldRegistry::builtin();
            let [lo, hi] = raw.to_le_bytes();
            let reading = parse_packet(&registry, &[ADDR_CURRENT as u8, 0x00, lo, hi]);
            prop_assert!(approx(reading.value, raw as f32 / 10.0));
        }
    }
}
