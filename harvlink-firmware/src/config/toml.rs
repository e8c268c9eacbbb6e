//! Simple TOML parser for link configuration
//!
//! This is a minimal TOML parser that handles only the subset used by
//! `link.toml`. It does NOT support the full TOML spec.
//!
//! Supported features:
//! - Key = value pairs (string, integer, float, boolean)
//! - Single-line string arrays: names = ["a", "b"]
//! - [section] and [field.<name>] headers
//! - Comments (# ...)
//!
//! NOT supported:
//! - Multi-line strings or arrays
//! - Inline tables
//! - Escapes inside strings
//!
//! Strings in the result borrow from the input, which is why the input must
//! be `'static` (normally the embedded `link.toml`).

use heapless::Vec;

use harvlink_core::config::{ConfigError, LinkConfig, LinkTiming, MAX_NAME_FILTERS};
use harvlink_protocol::{FieldConfig, FieldRegistry, FieldWidth, RegistryError, Signedness, MAX_FIELDS};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid section header
    InvalidSection,
    /// Key not valid in its section
    UnknownKey,
    /// Invalid value type
    InvalidValue,
    /// Required key absent from a [field.*] section
    MissingKey,
    /// Too many items (exceeded heapless capacity)
    TooManyItems,
    /// Name filters rejected
    Link(ConfigError),
    /// Field table rejected
    Registry(RegistryError),
}

/// Link parameters and field table loaded from TOML
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub link: LinkConfig,
    pub fields: FieldRegistry,
}

impl Default for ParsedConfig {
    fn default() -> Self {
        Self {
            link: LinkConfig::default(),
            fields: FieldRegistry::builtin(),
        }
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy)]
enum Section {
    Root,
    Device,
    Timing,
    Field,
}

/// A [field.*] section being filled in
struct FieldDraft {
    name: &'static str,
    address: Option<u16>,
    width: Option<FieldWidth>,
    scale: Option<f32>,
    offset: f32,
    unit: &'static str,
    unsigned: bool,
}

impl FieldDraft {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            address: None,
            width: None,
            scale: None,
            offset: 0.0,
            unit: "",
            unsigned: false,
        }
    }

    fn finish(self) -> Result<FieldConfig, ParseError> {
        let (Some(address), Some(width), Some(scale)) = (self.address, self.width, self.scale)
        else {
            return Err(ParseError::MissingKey);
        };

        Ok(FieldConfig {
            address,
            width,
            scale,
            offset: self.offset,
            name: self.name,
            unit: self.unit,
            signedness: if self.unsigned {
                Signedness::Unsigned
            } else {
                Signedness::Signed
            },
        })
    }
}

/// Parse TOML configuration.
///
/// Without any [field.*] section the built-in field table is used. Keys
/// missing from [device] and [timing] keep their defaults.
pub fn parse_config(input: &'static str) -> Result<ParsedConfig, ParseError> {
    let mut link = LinkConfig::default();
    let mut fields: Vec<FieldConfig, MAX_FIELDS> = Vec::new();
    let mut section = Section::Root;
    let mut current_field: Option<FieldDraft> = None;

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            save_field(&mut current_field, &mut fields)?;

            let header = line[1..line.len() - 1].trim();
            section = match header {
                "device" => Section::Device,
                "timing" => Section::Timing,
                _ => {
                    let name = header
                        .strip_prefix("field.")
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .ok_or(ParseError::InvalidSection)?;
                    current_field = Some(FieldDraft::new(name));
                    Section::Field
                }
            };
            continue;
        }

        let Some((key, value)) = parse_key_value(line) else {
            return Err(ParseError::InvalidValue);
        };

        match section {
            Section::Root => return Err(ParseError::UnknownKey),
            Section::Device => apply_device(&mut link, key, value)?,
            Section::Timing => apply_timing(&mut link.timing, key, value)?,
            Section::Field => {
                if let Some(draft) = current_field.as_mut() {
                    apply_field(draft, key, value)?;
                }
            }
        }
    }

    save_field(&mut current_field, &mut fields)?;

    let fields = if fields.is_empty() {
        FieldRegistry::builtin()
    } else {
        FieldRegistry::from_fields(&fields).map_err(ParseError::Registry)?
    };

    Ok(ParsedConfig { link, fields })
}

/// Parse key = value line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a string value (removes quotes)
fn parse_string(value: &str) -> Result<&str, ParseError> {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        Ok(&value[1..value.len() - 1])
    } else {
        Err(ParseError::InvalidValue)
    }
}

/// Parse an integer value
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

/// Parse a float value (integers accepted)
fn parse_float(value: &str) -> Result<f32, ParseError> {
    let parsed: f32 = value.parse().map_err(|_| ParseError::InvalidValue)?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ParseError::InvalidValue)
    }
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

/// Parse a string array like `["speed", "cjpower"]`
fn parse_string_array(value: &str) -> Result<Vec<&str, MAX_NAME_FILTERS>, ParseError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(ParseError::InvalidValue)?;

    let mut items = Vec::new();
    for item in inner.split(',') {
        let item = item.trim();
        // Trailing comma
        if item.is_empty() {
            continue;
        }
        items
            .push(parse_string(item)?)
            .map_err(|_| ParseError::TooManyItems)?;
    }
    Ok(items)
}

fn apply_device(link: &mut LinkConfig, key: &str, value: &'static str) -> Result<(), ParseError> {
    match key {
        "names" => {
            let names = parse_string_array(value)?;
            *link = core::mem::take(link)
                .with_name_filters(&names)
                .map_err(ParseError::Link)?;
        }
        "subscribe_on_connect" => link.subscribe_on_connect = parse_bool(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn apply_timing(timing: &mut LinkTiming, key: &str, value: &str) -> Result<(), ParseError> {
    let ms: u32 = parse_int(value)?;
    match key {
        "settle_ms" => timing.settle_ms = ms,
        "channel_interval_ms" => timing.channel_interval_ms = ms,
        "post_setup_ms" => timing.post_setup_ms = ms,
        "post_connect_ms" => timing.post_connect_ms = ms,
        "connect_retry_ms" => timing.connect_retry_ms = ms,
        "reconnect_delay_ms" => timing.reconnect_delay_ms = ms,
        "telemetry_timeout_ms" => timing.telemetry_timeout_ms = ms,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

fn apply_field(draft: &mut FieldDraft, key: &str, value: &'static str) -> Result<(), ParseError> {
    match key {
        "address" => draft.address = Some(parse_int(value)?),
        "width" => {
            let bytes: u8 = parse_int(value)?;
            draft.width = Some(FieldWidth::from_bytes(bytes).ok_or(ParseError::InvalidValue)?);
        }
        "scale" => draft.scale = Some(parse_float(value)?),
        "offset" => draft.offset = parse_float(value)?,
        "unit" => draft.unit = parse_string(value)?,
        "unsigned" => draft.unsigned = parse_bool(value)?,
        _ => return Err(ParseError::UnknownKey),
    }
    Ok(())
}

/// Close the current [field.*] section, if any
fn save_field(
    current: &mut Option<FieldDraft>,
    fields: &mut Vec<FieldConfig, MAX_FIELDS>,
) -> Result<(), ParseError> {
    if let Some(draft) = current.take() {
        fields
            .push(draft.finish()?)
            .map_err(|_| ParseError::TooManyItems)?;
    }
    Ok(())
}
