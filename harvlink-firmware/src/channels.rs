//! Inter-context communication channels
//!
//! The BLE stack reports scan results, notifications and disconnects from its
//! own execution context. It must never block there, so events go through a
//! bounded channel and are dropped (and counted) when the link task falls
//! behind. User requests use a second, smaller channel.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use portable_atomic::{AtomicU32, Ordering};

use harvlink_core::traits::{DeviceAddress, TransportEvent};

/// Channel capacity for transport events
pub const EVENT_CHANNEL_SIZE: usize = 16;

/// Channel capacity for user commands
pub const COMMAND_CHANNEL_SIZE: usize = 4;

/// Requests from the user interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkCommand {
    /// Start scanning (boot, or after the user dismissed an error)
    StartScan,
    /// Drop any current link and look for the controller again
    Reconnect,
}

/// Channels between the BLE stack, the user interface and the link task
///
/// Usually placed in a `static`; every producer and the link task borrow the
/// same instance.
pub struct LinkChannels {
    events: Channel<CriticalSectionRawMutex, TransportEvent, EVENT_CHANNEL_SIZE>,
    commands: Channel<CriticalSectionRawMutex, LinkCommand, COMMAND_CHANNEL_SIZE>,
    dropped_events: AtomicU32,
}

impl Default for LinkChannels {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkChannels {
    /// Create empty channels
    pub const fn new() -> Self {
        Self {
            events: Channel::new(),
            commands: Channel::new(),
            dropped_events: AtomicU32::new(0),
        }
    }

    /// Handle for the BLE stack callbacks
    pub fn event_sender(&self) -> EventSender<'_> {
        EventSender { channels: self }
    }

    /// Queue a user command. Returns false if the queue is full.
    pub fn request(&self, command: LinkCommand) -> bool {
        self.commands.try_send(command).is_ok()
    }

    /// Next queued transport event, if any
    pub fn try_receive_event(&self) -> Option<TransportEvent> {
        self.events.try_receive().ok()
    }

    /// Next queued user command, if any
    pub fn try_receive_command(&self) -> Option<LinkCommand> {
        self.commands.try_receive().ok()
    }

    /// Wait for a transport event
    pub async fn receive_event(&self) -> TransportEvent {
        self.events.receive().await
    }

    /// Wait for a user command
    pub async fn receive_command(&self) -> LinkCommand {
        self.commands.receive().await
    }

    /// Events dropped because the queue was full or the payload too long
    pub fn dropped_events(&self) -> u32 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    fn push(&self, event: TransportEvent) {
        if self.events.try_send(event).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn drop_event(&self) {
        self.dropped_events.fetch_add(1, Ordering::Relaxed);
    }
}

/// Non-blocking producer side used from the BLE stack's context
#[derive(Clone, Copy)]
pub struct EventSender<'a> {
    channels: &'a LinkChannels,
}

impl EventSender<'_> {
    /// Scan result with a local name
    pub fn advertisement(&self, device: DeviceAddress, name: &str) {
        self.channels
            .push(TransportEvent::advertisement(device, name));
    }

    /// Notification on the telemetry characteristic
    pub fn notification(&self, bytes: &[u8]) {
        match TransportEvent::notification(bytes) {
            Some(event) => self.channels.push(event),
            None => self.channels.drop_event(),
        }
    }

    /// Peer dropped the link
    pub fn disconnected(&self) {
        self.channels.push(TransportEvent::Disconnected);
    }
}
