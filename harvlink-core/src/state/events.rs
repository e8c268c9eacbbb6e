//! Events that trigger connection state transitions

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    // Scan events
    /// Scan started (user request, retry, or recovery)
    StartScan,
    /// A scan result matched one of the name filters
    DeviceMatched,

    // Connection events
    /// Transport connected and discovered the service
    Connected,
    /// Connect attempt failed; scanning was restarted
    ConnectFailed,
    /// Stop/clear/setup/start sequence fully sent
    HandshakeComplete,

    // Link loss
    /// Disconnect reported, forced, or a handshake write failed
    LinkLost,
}

impl LinkEvent {
    /// Check if this event originates from the transport
    pub fn is_transport_event(&self) -> bool {
        matches!(
            self,
            LinkEvent::DeviceMatched
                | LinkEvent::Connected
                | LinkEvent::ConnectFailed
                | LinkEvent::LinkLost
        )
    }

    /// Check if this event means the link went away
    pub fn is_failure(&self) -> bool {
        matches!(self, LinkEvent::ConnectFailed | LinkEvent::LinkLost)
    }
}
