//! Connection state machine definition
//!
//! The link is always in exactly one of these states. Every change goes
//! through [`ConnectionState::transition`]; events that make no sense in the
//! current state leave it unchanged.

use super::events::LinkEvent;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// Scanning for an advertiser matching the name filters
    Scanning,
    /// Scan stopped, connect in flight
    Connecting,
    /// Connected, configuration handshake running
    Configuring,
    /// Handshake done, telemetry flowing
    Active,
    /// Link lost, waiting before rescanning
    Disconnected,
}

impl ConnectionState {
    /// Check if a BLE link is up
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Configuring | ConnectionState::Active)
    }

    /// Check if a connect attempt or live link exists
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Configuring | ConnectionState::Active
        )
    }

    /// Status line for the display
    pub fn status_text(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Scanning => "Scanning...",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Configuring => "Configuring...",
            ConnectionState::Active => "Active",
            ConnectionState::Disconnected => "Disconnected",
        }
    }

    /// Process an event and return the next state
    pub fn transition(self, event: LinkEvent) -> Self {
        use ConnectionState::*;
        use LinkEvent::*;

        match (self, event) {
            // Scan start (never while a link exists)
            (Idle, StartScan) => Scanning,
            (Disconnected, StartScan) => Scanning,

            // Scanning transitions
            (Scanning, DeviceMatched) => Connecting,

            // Connecting transitions
            (Connecting, Connected) => Configuring,
            (Connecting, ConnectFailed) => Scanning,
            (Connecting, LinkLost) => Disconnected,

            // Configuring transitions
            (Configuring, HandshakeComplete) => Active,
            (Configuring, LinkLost) => Disconnected,

            // Active transitions
            (Active, LinkLost) => Disconnected,

            // Default: stay in current state
            _ => self,
        }
    }
}
