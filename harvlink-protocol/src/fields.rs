//! Telemetry field registry
//!
//! Every telemetry channel the controller can stream is identified by a
//! 13-bit address. The registry maps that address to the rule used to turn
//! the raw little-endian sample into a physical value:
//!
//! ```text
//! value = (raw - offset) / scale
//! ```
//!
//! Signedness is carried per entry. The wire format is not consistent about
//! it (most 2-byte channels are two's complement, a handful are not), so it
//! must never be derived from the field width.

use heapless::Vec;

/// Maximum number of fields a registry can hold
pub const MAX_FIELDS: usize = 16;

/// Largest address representable with the 5-bit high byte
pub const MAX_ADDRESS: u16 = 0x1FFF;

/// Speed (0.1 km/h)
pub const ADDR_SPEED: u16 = 24;
/// State of charge (%)
pub const ADDR_SOC: u16 = 26;
/// Motor RPM
pub const ADDR_RPM: u16 = 105;
/// Battery voltage (0.1 V)
pub const ADDR_VOLTAGE: u16 = 113;
/// Power (W, shown as kW)
pub const ADDR_POWER: u16 = 115;
/// Battery current (0.1 A)
pub const ADDR_CURRENT: u16 = 119;
/// Throttle voltage
pub const ADDR_THROTTLE: u16 = 220;
/// Controller temperature (°C + 40)
pub const ADDR_TEMPERATURE: u16 = 222;

/// Interpretation of the raw sample bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signedness {
    /// Two's complement
    Signed,
    /// Plain unsigned
    Unsigned,
}

/// Sample width on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FieldWidth {
    One = 1,
    Two = 2,
    Four = 4,
}

impl FieldWidth {
    /// Number of payload bytes
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Parse a byte count
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(FieldWidth::One),
            2 => Some(FieldWidth::Two),
            4 => Some(FieldWidth::Four),
            _ => None,
        }
    }
}

/// Decode and calibration rule for one telemetry address
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldConfig {
    /// Telemetry address (13 bits)
    pub address: u16,
    /// Sample width
    pub width: FieldWidth,
    /// Calibration divisor `k`
    pub scale: f32,
    /// Calibration offset `b`, subtracted before scaling
    pub offset: f32,
    /// Short label
    pub name: &'static str,
    /// Physical unit
    pub unit: &'static str,
    /// How the raw bits are interpreted
    pub signedness: Signedness,
}

impl FieldConfig {
    /// Signed field with no offset
    pub const fn signed(
        address: u16,
        width: FieldWidth,
        scale: f32,
        name: &'static str,
        unit: &'static str,
    ) -> Self {
        Self {
            address,
            width,
            scale,
            offset: 0.0,
            name,
            unit,
            signedness: Signedness::Signed,
        }
    }

    /// Unsigned field with no offset
    pub const fn unsigned(
        address: u16,
        width: FieldWidth,
        scale: f32,
        name: &'static str,
        unit: &'static str,
    ) -> Self {
        Self {
            address,
            width,
            scale,
            offset: 0.0,
            name,
            unit,
            signedness: Signedness::Unsigned,
        }
    }

    /// Replace the calibration offset
    pub const fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    /// Apply the linear calibration to a raw sample
    pub fn calibrate(&self, raw: i64) -> f32 {
        (raw as f32 - self.offset) / self.scale
    }
}

/// Channels streamed by default.
///
/// Unsigned entries: 24, 26, 113, 220 (2-byte) and 222 (1-byte). Everything
/// else is two's complement.
pub const DEFAULT_FIELDS: [FieldConfig; 8] = [
    FieldConfig::unsigned(ADDR_SPEED, FieldWidth::Two, 10.0, "Speed", "km/h"),
    FieldConfig::unsigned(ADDR_SOC, FieldWidth::Two, 1.0, "SoC", "%"),
    FieldConfig::signed(ADDR_RPM, FieldWidth::Two, 1.0, "RPM", "rpm"),
    FieldConfig::unsigned(ADDR_VOLTAGE, FieldWidth::Two, 10.0, "Volt", "V"),
    FieldConfig::signed(ADDR_POWER, FieldWidth::Two, 1000.0, "Power", "KW"),
    FieldConfig::signed(ADDR_CURRENT, FieldWidth::Two, 10.0, "Current", "A"),
    FieldConfig::unsigned(ADDR_THROTTLE, FieldWidth::Two, 744.3, "Throt", "V"),
    FieldConfig::unsigned(ADDR_TEMPERATURE, FieldWidth::One, 1.0, "Temp", "C").with_offset(40.0),
];

/// Errors raised while building a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// More than [`MAX_FIELDS`] entries
    TooManyFields,
    /// Two entries share an address
    DuplicateAddress(u16),
    /// Address does not fit in 13 bits
    AddressOutOfRange(u16),
    /// Scale is zero or not finite
    InvalidScale(u16),
}

/// Immutable address → rule table
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldConfig, MAX_FIELDS>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldRegistry {
    /// Registry holding [`DEFAULT_FIELDS`]
    pub fn builtin() -> Self {
        let mut fields = Vec::new();
        for field in DEFAULT_FIELDS {
            // DEFAULT_FIELDS.len() < MAX_FIELDS
            let _ = fields.push(field);
        }
        Self { fields }
    }

    /// Build a registry from an arbitrary table, checking its invariants
    pub fn from_fields(entries: &[FieldConfig]) -> Result<Self, RegistryError> {
        let mut fields: Vec<FieldConfig, MAX_FIELDS> = Vec::new();

        for entry in entries {
            if entry.address > MAX_ADDRESS {
                return Err(RegistryError::AddressOutOfRange(entry.address));
            }
            if entry.scale == 0.0 || !entry.scale.is_finite() {
                return Err(RegistryError::InvalidScale(entry.address));
            }
            if fields.iter().any(|f| f.address == entry.address) {
                return Err(RegistryError::DuplicateAddress(entry.address));
            }
            fields
                .push(*entry)
                .map_err(|_| RegistryError::TooManyFields)?;
        }

        Ok(Self { fields })
    }

    /// Find the rule for an address
    pub fn lookup(&self, address: u16) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.address == address)
    }

    /// Entries in table order
    pub fn iter(&self) -> impl Iterator<Item = &FieldConfig> {
        self.fields.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_by_address() {
        let registry = FieldRegistry::builtin();
        assert_eq!(registry.len(), 8);

        let speed = registry.lookup(ADDR_SPEED).unwrap();
        assert_eq!(speed.name, "Speed");
        assert_eq!(speed.width, FieldWidth::Two);
        assert_eq!(speed.scale, 10.0);

        assert!(registry.lookup(0).is_none());
        assert!(registry.lookup(25).is_none());
    }

    #[test]
    fn test_builtin_signedness_table() {
        let registry = FieldRegistry::builtin();
        let unsigned = [
            ADDR_SPEED,
            ADDR_SOC,
            ADDR_VOLTAGE,
            ADDR_THROTTLE,
            ADDR_TEMPERATURE,
        ];

        for field in registry.iter() {
            let expected = if unsigned.contains(&field.address) {
                Signedness::Unsigned
            } else {
                Signedness::Signed
            };
            assert_eq!(field.signedness, expected, "address {}", field.address);
        }
    }

    #[test]
    fn test_builtin_addresses_unique() {
        assert!(FieldRegistry::from_fields(&DEFAULT_FIELDS).is_ok());
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let fields = [
            FieldConfig::signed(105, FieldWidth::Two, 1.0, "RPM", "rpm"),
            FieldConfig::unsigned(105, FieldWidth::One, 1.0, "Dup", "?"),
        ];
        assert_eq!(
            FieldRegistry::from_fields(&fields).unwrap_err(),
            RegistryError::DuplicateAddress(105)
        );
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let too_high = [FieldConfig::signed(0x2000, FieldWidth::One, 1.0, "X", "")];
        assert_eq!(
            FieldRegistry::from_fields(&too_high).unwrap_err(),
            RegistryError::AddressOutOfRange(0x2000)
        );

        let zero_scale = [FieldConfig::signed(7, FieldWidth::One, 0.0, "X", "")];
        assert_eq!(
            FieldRegistry::from_fields(&zero_scale).unwrap_err(),
            RegistryError::InvalidScale(7)
        );
    }

    #[test]
    fn test_too_many_fields() {
        let mut entries = [FieldConfig::signed(0, FieldWidth::One, 1.0, "X", ""); MAX_FIELDS + 1];
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.address = i as u16;
        }
        assert_eq!(
            FieldRegistry::from_fields(&entries).unwrap_err(),
            RegistryError::TooManyFields
        );
    }

    #[test]
    fn test_calibrate() {
        let temp = FieldRegistry::builtin().lookup(ADDR_TEMPERATURE).copied().unwrap();
        assert_eq!(temp.calibrate(40), 0.0);
        assert_eq!(temp.calibrate(65), 25.0);
    }

    #[test]
    fn test_width_from_bytes() {
        assert_eq!(FieldWidth::from_bytes(4), Some(FieldWidth::Four));
        assert_eq!(FieldWidth::from_bytes(3), None);
        assert_eq!(FieldWidth::Two.bytes(), 2);
    }
}
