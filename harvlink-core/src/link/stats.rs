//! Session counters for the status/debug screen

/// Counters accumulated since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Scans started on the transport
    pub scans_started: u32,
    /// Connect attempts
    pub connect_attempts: u32,
    /// Connect attempts that failed
    pub connect_failures: u32,
    /// Handshakes that reached start-upload
    pub handshakes_completed: u32,
    /// Valid readings decoded
    pub packets_decoded: u32,
    /// Notifications dropped as malformed or unknown
    pub packets_dropped: u32,
    /// Links lost (reported, forced, or watchdog)
    pub link_losses: u32,
}
