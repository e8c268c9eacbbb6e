//! Transport abstraction traits
//!
//! These traits define the interface between the connection logic
//! and the BLE host stack running on a particular board.

pub mod transport;

pub use transport::{
    BleTransport, DeviceAddress, DeviceName, RawPacket, TransportEvent, MAX_NAME_LEN,
    MAX_NOTIFICATION_LEN,
};
