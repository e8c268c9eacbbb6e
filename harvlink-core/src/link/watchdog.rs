//! Telemetry watchdog
//!
//! The controller never acknowledges configuration writes. The only sign a
//! handshake worked is telemetry arriving afterwards, so an active session
//! that stays silent is treated as a dead link.

/// Silence tracker for an active session
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryWatchdog {
    /// Allowed silence (0 disables the watchdog)
    timeout_ms: u32,
    /// Time since the last valid reading
    silent_ms: u32,
}

impl TelemetryWatchdog {
    /// Create a watchdog with the given timeout
    pub const fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            silent_ms: 0,
        }
    }

    /// Record a valid reading
    pub fn feed(&mut self) {
        self.silent_ms = 0;
    }

    /// Restart tracking, e.g. when a session becomes active
    pub fn reset(&mut self) {
        self.silent_ms = 0;
    }

    /// Advance time
    ///
    /// # Arguments
    /// - `delta_ms`: Time elapsed since last update
    pub fn update_time(&mut self, delta_ms: u32) {
        self.silent_ms = self.silent_ms.saturating_add(delta_ms);
    }

    /// Check whether the allowed silence was exceeded
    pub fn is_expired(&self) -> bool {
        self.timeout_ms != 0 && self.silent_ms >= self.timeout_ms
    }

    /// Time since the last valid reading
    pub fn silent_ms(&self) -> u32 {
        self.silent_ms
    }
}
