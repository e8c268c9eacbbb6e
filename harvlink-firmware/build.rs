//! Build script for harvlink-firmware
//!
//! Validates link.toml at compile time so a broken field table never reaches
//! the device.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Must match harvlink_protocol::MAX_FIELDS
const MAX_FIELDS: usize = 16;

/// Must match harvlink_core::config::MAX_NAME_FILTERS
const MAX_NAME_FILTERS: usize = 4;

/// Largest 13-bit telemetry address
const MAX_ADDRESS: i64 = 0x1FFF;

const TIMING_KEYS: [&str; 7] = [
    "settle_ms",
    "channel_interval_ms",
    "post_setup_ms",
    "post_connect_ms",
    "connect_retry_ms",
    "reconnect_delay_ms",
    "telemetry_timeout_ms",
];

fn main() {
    validate_config();
}

/// Validate link.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=link.toml");
    println!("cargo:rerun-if-changed=build.rs");

    let config_path = Path::new("link.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: link.toml not found!                                     ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds link.toml from the harvlink-firmware        ║\n\
            ║  directory. Restore it or create one with a [device] section.    ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read link.toml                                 ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in link.toml                         ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    report("device", validate_device(&config));
    report("timing", validate_timing(&config));
    report("field", validate_fields(&config));

    println!("cargo:warning=link.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abort the build if a section produced errors
fn report(section: &str, errors: Vec<String>) {
    if errors.is_empty() {
        return;
    }

    let title = format!("ERROR: Invalid {} configuration", section);
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  {:<64} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Validate the [device] section
fn validate_device(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();

    let device = match config.get("device") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => return vec!["[device] must be a table".to_string()],
        None => return vec!["Missing [device] section".to_string()],
    };

    match device.get("names") {
        Some(toml::Value::Array(names)) => {
            if names.is_empty() {
                errors.push("[device] names cannot be empty".to_string());
            }
            if names.len() > MAX_NAME_FILTERS {
                errors.push(format!(
                    "[device] at most {} names are supported",
                    MAX_NAME_FILTERS
                ));
            }
            for (i, name) in names.iter().enumerate() {
                match name.as_str() {
                    Some("") => errors.push(format!("[device] names[{}] is empty", i)),
                    Some(_) => {}
                    None => errors.push(format!("[device] names[{}] must be a string", i)),
                }
            }
        }
        Some(_) => errors.push("[device] names must be an array".to_string()),
        None => errors.push("[device] missing 'names'".to_string()),
    }

    if let Some(value) = device.get("subscribe_on_connect") {
        if !value.is_bool() {
            errors.push("[device] subscribe_on_connect must be true or false".to_string());
        }
    }

    errors
}

/// Validate the optional [timing] section
fn validate_timing(config: &toml::Value) -> Vec<String> {
    let timing = match config.get("timing") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => return vec!["[timing] must be a table".to_string()],
        None => return Vec::new(),
    };

    let mut errors = Vec::new();
    for (key, value) in timing {
        if !TIMING_KEYS.contains(&key.as_str()) {
            errors.push(format!("[timing] unknown key '{}'", key));
            continue;
        }
        match value.as_integer() {
            Some(ms) if (0..=i64::from(u32::MAX)).contains(&ms) => {}
            Some(_) => errors.push(format!("[timing] {} out of range", key)),
            None => errors.push(format!("[timing] {} must be an integer", key)),
        }
    }
    errors
}

/// Validate the optional [field.*] sections
fn validate_fields(config: &toml::Value) -> Vec<String> {
    let fields = match config.get("field") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => return vec!["[field] must contain [field.<name>] tables".to_string()],
        None => return Vec::new(),
    };

    let mut errors = Vec::new();
    let mut addresses = HashSet::new();

    if fields.len() > MAX_FIELDS {
        errors.push(format!("at most {} fields are supported", MAX_FIELDS));
    }

    for (name, field) in fields {
        let field = match field {
            toml::Value::Table(t) => t,
            _ => {
                errors.push(format!("[field.{}] must be a table", name));
                continue;
            }
        };

        match field.get("address").and_then(|a| a.as_integer()) {
            Some(address) if (0..=MAX_ADDRESS).contains(&address) => {
                if !addresses.insert(address) {
                    errors.push(format!("[field.{}] duplicate address {}", name, address));
                }
            }
            Some(_) => errors.push(format!("[field.{}] address must be 0-8191", name)),
            None => errors.push(format!("[field.{}] missing integer 'address'", name)),
        }

        match field.get("width").and_then(|w| w.as_integer()) {
            Some(1 | 2 | 4) => {}
            Some(_) => errors.push(format!("[field.{}] width must be 1, 2 or 4", name)),
            None => errors.push(format!("[field.{}] missing integer 'width'", name)),
        }

        match field.get("scale").and_then(as_number) {
            Some(scale) if scale != 0.0 && scale.is_finite() => {}
            Some(_) => errors.push(format!("[field.{}] scale must be non-zero", name)),
            None => errors.push(format!("[field.{}] missing numeric 'scale'", name)),
        }

        if let Some(offset) = field.get("offset") {
            if as_number(offset).is_none() {
                errors.push(format!("[field.{}] offset must be a number", name));
            }
        }

        if let Some(unsigned) = field.get("unsigned") {
            if !unsigned.is_bool() {
                errors.push(format!("[field.{}] unsigned must be true or false", name));
            }
        }
    }

    errors
}

/// Accept both `10` and `10.0`
fn as_number(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Float(f) => Some(*f),
        toml::Value::Integer(i) => Some(*i as f64),
        _ => None,
    }
}
