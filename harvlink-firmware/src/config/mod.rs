//! Configuration loading and parsing
//!
//! The link configuration is embedded from `link.toml` at build time.
//! Uses TOML format parsed by a custom no_std parser.

pub mod toml;

pub use toml::{parse_config, ParseError, ParsedConfig};

/// Contents of `link.toml`, validated by build.rs
pub const EMBEDDED_CONFIG: &str = include_str!("../../link.toml");

/// Parse a configuration, falling back to the built-in defaults if it is
/// rejected.
pub fn load_config(input: &'static str) -> ParsedConfig {
    match parse_config(input) {
        Ok(config) => {
            info!(
                "Loaded link config: {} fields, {} name filters",
                config.fields.len(),
                config.link.name_filters.len()
            );
            config
        }
        Err(e) => {
            warn!("Link config rejected ({:?}), using defaults", e);
            ParsedConfig::default()
        }
    }
}
