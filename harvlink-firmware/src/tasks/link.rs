//! Link task
//!
//! Single owner of the connection manager. Waits for transport events, user
//! commands or the tick, handles whatever is queued, and feeds elapsed time
//! to the manager for the watchdog and rescan retries.

use embassy_futures::select::{select3, Either3};
use embassy_time::{Delay, Duration, Instant, Ticker};
use embedded_hal_async::delay::DelayNs;

use harvlink_core::dispatch::ReadingSink;
use harvlink_core::link::ConnectionManager;
use harvlink_core::traits::BleTransport;

use crate::channels::{LinkChannels, LinkCommand};
use crate::config::ParsedConfig;

/// Tick interval in milliseconds
pub const TICK_INTERVAL_MS: u32 = 100;

/// Build a manager from a loaded configuration, using embassy-time for delays
pub fn link_manager<T, S>(transport: T, config: ParsedConfig, sink: S) -> ConnectionManager<T, Delay, S>
where
    T: BleTransport,
    S: ReadingSink,
{
    ConnectionManager::new(transport, Delay, config.fields, config.link, sink)
}

/// Drives a [`ConnectionManager`] from a [`LinkChannels`] instance
pub struct LinkRunner<'a, T, D, S> {
    manager: ConnectionManager<T, D, S>,
    channels: &'a LinkChannels,
}

impl<'a, T, D, S> LinkRunner<'a, T, D, S>
where
    T: BleTransport,
    D: DelayNs,
    S: ReadingSink,
{
    /// Create a runner
    pub fn new(manager: ConnectionManager<T, D, S>, channels: &'a LinkChannels) -> Self {
        Self { manager, channels }
    }

    /// Get the manager
    pub fn manager(&self) -> &ConnectionManager<T, D, S> {
        &self.manager
    }

    /// Get the manager mutably
    pub fn manager_mut(&mut self) -> &mut ConnectionManager<T, D, S> {
        &mut self.manager
    }

    async fn apply_command(&mut self, command: LinkCommand) {
        debug!("Command: {:?}", command);
        match command {
            LinkCommand::StartScan => self.manager.start_scan(),
            LinkCommand::Reconnect => self.manager.request_reconnect().await,
        }
    }

    /// Handle everything currently queued, commands first.
    ///
    /// Returns the number of items handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;

        while let Some(command) = self.channels.try_receive_command() {
            self.apply_command(command).await;
            handled += 1;
        }

        // Events queued while a handshake was running are handled here, in
        // arrival order
        while let Some(event) = self.channels.try_receive_event() {
            self.manager.handle_event(event).await;
            handled += 1;
        }

        handled
    }

    /// Link task main loop
    pub async fn run(&mut self) -> ! {
        info!("Link task started");

        let channels = self.channels;
        let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS as u64));
        let mut last_tick = Instant::now();

        loop {
            match select3(
                channels.receive_event(),
                channels.receive_command(),
                ticker.next(),
            )
            .await
            {
                Either3::First(event) => {
                    self.manager.handle_event(event).await;
                }
                Either3::Second(command) => {
                    self.apply_command(command).await;
                }
                Either3::Third(()) => {
                    let now = Instant::now();
                    let elapsed_ms = (now - last_tick).as_millis() as u32;
                    last_tick = now;
                    self.manager.tick(elapsed_ms).await;
                }
            }

            self.drain().await;

            let dropped = channels.dropped_events();
            if dropped > 0 {
                trace!("{} transport events dropped so far", dropped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use harvlink_core::state::ConnectionState;
    use harvlink_core::traits::DeviceAddress;
    use harvlink_protocol::FieldRegistry;
    use std::vec::Vec;

    use crate::snapshot::SharedSnapshot;

    #[derive(Default)]
    struct MockTransport {
        scans: usize,
        writes: Vec<Vec<u8>>,
        disconnects: usize,
        connected: bool,
    }

    impl BleTransport for MockTransport {
        type Error = ();

        fn start_scan(&mut self) -> Result<(), ()> {
            self.scans += 1;
            Ok(())
        }

        fn stop_scan(&mut self) {}

        async fn connect(&mut self, _device: DeviceAddress) -> Result<(), ()> {
            self.connected = true;
            Ok(())
        }

        async fn write(&mut self, data: &[u8]) -> Result<(), ()> {
            self.writes.push(data.to_vec());
            Ok(())
        }

        async fn subscribe_notifications(&mut self) -> Result<(), ()> {
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.disconnects += 1;
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    fn runner<'a>(
        channels: &'a LinkChannels,
        snapshot: &'a SharedSnapshot,
    ) -> LinkRunner<'a, MockTransport, NoDelay, crate::snapshot::SnapshotSink<'a>> {
        let config = ParsedConfig::default();
        let manager = ConnectionManager::new(
            MockTransport::default(),
            NoDelay,
            config.fields,
            config.link,
            snapshot.sink(),
        );
        LinkRunner::new(manager, channels)
    }

    #[test]
    fn test_scan_connect_and_stream() {
        let channels = LinkChannels::new();
        let snapshot = SharedSnapshot::new();
        let mut runner = runner(&channels, &snapshot);
        let sender = channels.event_sender();

        assert!(channels.request(LinkCommand::StartScan));
        assert_eq!(block_on(runner.drain()), 1);
        assert_eq!(runner.manager().state(), ConnectionState::Scanning);

        sender.advertisement(DeviceAddress([1, 2, 3, 4, 5, 6]), "other-device");
        sender.advertisement(DeviceAddress([6, 5, 4, 3, 2, 1]), "cjpower");
        sender.notification(&[24, 0x00, 0x25, 0x03]);
        sender.notification(&[113, 0x00, 0xE8, 0x03]);
        assert_eq!(block_on(runner.drain()), 4);

        assert_eq!(runner.manager().state(), ConnectionState::Active);
        let expected = 2 + FieldRegistry::builtin().len() + 1;
        assert_eq!(runner.manager().transport().writes.len(), expected);
        assert_eq!(snapshot.value(113), Some(100.0));
        assert!((snapshot.value(24).unwrap() - 80.5).abs() < 1e-4);
    }

    #[test]
    fn test_disconnect_marks_snapshot_stale() {
        let channels = LinkChannels::new();
        let snapshot = SharedSnapshot::new();
        let mut runner = runner(&channels, &snapshot);
        let sender = channels.event_sender();

        channels.request(LinkCommand::StartScan);
        sender.advertisement(DeviceAddress::default(), "speed");
        sender.notification(&[26, 0x00, 50, 0x00]);
        sender.disconnected();
        block_on(runner.drain());

        assert_eq!(runner.manager().state(), ConnectionState::Scanning);
        let copy = snapshot.snapshot();
        assert!(copy.is_stale());
        assert_eq!(copy.get(26), None);
        assert_eq!(snapshot.value(26), None);
        assert_eq!(runner.manager().transport().scans, 2);
    }

    #[test]
    fn test_reconnect_command_drops_active_link() {
        let channels = LinkChannels::new();
        let snapshot = SharedSnapshot::new();
        let mut runner = runner(&channels, &snapshot);

        channels.request(LinkCommand::StartScan);
        channels.event_sender().advertisement(DeviceAddress::default(), "cj-power");
        block_on(runner.drain());
        assert_eq!(runner.manager().state(), ConnectionState::Active);

        let command = crate::input::Button::Reconnect.link_command().unwrap();
        channels.request(command);
        block_on(runner.drain());

        assert_eq!(runner.manager().state(), ConnectionState::Scanning);
        assert_eq!(runner.manager().transport().disconnects, 1);
    }

    #[test]
    fn test_drain_empty() {
        let channels = LinkChannels::new();
        let snapshot = SharedSnapshot::new();
        let mut runner = runner(&channels, &snapshot);
        assert_eq!(block_on(runner.drain()), 0);
        assert_eq!(runner.manager().state(), ConnectionState::Idle);
    }
}
