//! Configuration type definitions
//!
//! Defaults reproduce the behavior of the stock display firmware. The
//! firmware crate can override them from `link.toml`.

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of advertised-name filters
pub const MAX_NAME_FILTERS: usize = 4;

/// Substrings identifying a compatible controller (case-sensitive)
pub const DEFAULT_NAME_FILTERS: [&str; 3] = ["speed", "cjpower", "cj-power"];

/// Delays around the connection handshake, in milliseconds
///
/// The controller drops writes that arrive back to back, so the settle and
/// channel intervals are hard requirements, not tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkTiming {
    /// Pause after the stop-upload and clear-data commands
    pub settle_ms: u32,
    /// Pause after each channel setup command
    pub channel_interval_ms: u32,
    /// Extra pause before the start-upload command
    pub post_setup_ms: u32,
    /// Pause between connecting and starting the handshake
    pub post_connect_ms: u32,
    /// Wait before rescanning after a failed connect
    pub connect_retry_ms: u32,
    /// Wait before rescanning after the link was lost
    pub reconnect_delay_ms: u32,
    /// Drop the link if an active session stays silent this long (0 = never)
    pub telemetry_timeout_ms: u32,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            settle_ms: 200,
            channel_interval_ms: 50,
            post_setup_ms: 100,
            post_connect_ms: 500,
            connect_retry_ms: 1000,
            reconnect_delay_ms: 2000,
            telemetry_timeout_ms: 5000,
        }
    }
}

/// Errors raised while building a link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// More than [`MAX_NAME_FILTERS`] filters
    TooManyFilters,
    /// Empty filter would match every advertiser
    EmptyFilter,
}

/// Connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Advertised-name substrings, any of which selects a device
    pub name_filters: Vec<&'static str, MAX_NAME_FILTERS>,
    /// Handshake and retry timing
    pub timing: LinkTiming,
    /// Subscribe to notifications right after connecting instead of after
    /// the handshake
    pub subscribe_on_connect: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let mut name_filters = Vec::new();
        for filter in DEFAULT_NAME_FILTERS {
            // DEFAULT_NAME_FILTERS.len() < MAX_NAME_FILTERS
            let _ = name_filters.push(filter);
        }
        Self {
            name_filters,
            timing: LinkTiming::default(),
            subscribe_on_connect: true,
        }
    }
}

impl LinkConfig {
    /// Replace the name filters
    pub fn with_name_filters(mut self, filters: &[&'static str]) -> Result<Self, ConfigError> {
        if filters.iter().any(|f| f.is_empty()) {
            return Err(ConfigError::EmptyFilter);
        }
        self.name_filters =
            Vec::from_slice(filters).map_err(|_| ConfigError::TooManyFilters)?;
        Ok(self)
    }

    /// Check whether an advertised name selects this device
    pub fn matches_name(&self, name: &str) -> bool {
        !name.is_empty() && self.name_filters.iter().any(|f| name.contains(f))
    }
}
