//! BLE central transport trait
//!
//! The host stack owns the radio. The connection manager only needs scan
//! control, a connect primitive, writes to the command characteristic and
//! notification subscription. Anything the stack reports asynchronously
//! (scan results, notifications, disconnects) is delivered to the main loop
//! as a [`TransportEvent`].

use core::future::Future;

use heapless::{String, Vec};

/// Longest advertised name kept from a scan result (GAP device name limit,
/// reachable with extended advertising)
pub const MAX_NAME_LEN: usize = 248;

/// Largest notification payload (default ATT MTU minus header)
pub const MAX_NOTIFICATION_LEN: usize = 20;

/// Advertised local name
pub type DeviceName = String<MAX_NAME_LEN>;

/// Raw notification bytes as delivered by the stack
pub type RawPacket = Vec<u8, MAX_NOTIFICATION_LEN>;

/// Bluetooth device address of a scan result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress(pub [u8; 6]);

/// Something the stack reported from its own execution context
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportEvent {
    /// Scan result with a local name
    Advertisement {
        device: DeviceAddress,
        name: DeviceName,
    },
    /// Notification on the telemetry characteristic
    Notification(RawPacket),
    /// Peer dropped the link
    Disconnected,
}

impl TransportEvent {
    /// Build an advertisement event, truncating overlong names
    pub fn advertisement(device: DeviceAddress, name: &str) -> Self {
        let mut stored = DeviceName::new();
        for ch in name.chars() {
            if stored.push(ch).is_err() {
                break;
            }
        }
        TransportEvent::Advertisement {
            device,
            name: stored,
        }
    }

    /// Build a notification event, or `None` if it exceeds the MTU
    pub fn notification(bytes: &[u8]) -> Option<Self> {
        RawPacket::from_slice(bytes)
            .ok()
            .map(TransportEvent::Notification)
    }
}

/// BLE central operations the connection manager drives
///
/// Every async operation must complete in bounded time; connect timeouts
/// are the stack's responsibility.
pub trait BleTransport {
    /// Error type for transport operations
    type Error;

    /// Start an active scan. Results arrive as [`TransportEvent::Advertisement`].
    fn start_scan(&mut self) -> Result<(), Self::Error>;

    /// Stop scanning
    fn stop_scan(&mut self);

    /// Connect and discover the telemetry service and characteristics
    fn connect(
        &mut self,
        device: DeviceAddress,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Write without response to the command characteristic
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;

    /// Enable notifications on the telemetry characteristic
    fn subscribe_notifications(&mut self) -> impl Future<Output = Result<(), Self::Error>>;

    /// Tear down the link
    fn disconnect(&mut self) -> impl Future<Output = ()>;

    /// Check if the stack still holds a link to the peer.
    ///
    /// Write-without-response can succeed locally after the link is gone,
    /// so the handshake polls this between steps.
    fn is_connected(&self) -> bool;
}
