//! Connection manager
//!
//! Owns the connection state and drives the transport through scan,
//! connect, configuration handshake and monitoring. Everything here runs on
//! the main loop; the transport's own context only ever produces
//! [`TransportEvent`]s that the loop hands to [`ConnectionManager::handle_event`].

use embedded_hal_async::delay::DelayNs;

use harvlink_protocol::{
    decode_packet, handshake_steps, ControlCommand, DecodedReading, FieldRegistry, HandshakeStep,
};

use super::stats::LinkStats;
use super::watchdog::TelemetryWatchdog;
use crate::config::LinkConfig;
use crate::dispatch::{ReadingDispatcher, ReadingSink};
use crate::state::{ConnectionState, LinkEvent};
use crate::traits::{BleTransport, DeviceAddress, TransportEvent};

/// Reasons a session was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Write of handshake step `step` failed
    Write { step: u8 },
    /// Enabling notifications failed
    Subscribe,
    /// Link gone before handshake step `step`
    Dropped { step: u8 },
}

/// BLE link lifecycle owner
pub struct ConnectionManager<T, D, S> {
    transport: T,
    delay: D,
    registry: FieldRegistry,
    config: LinkConfig,
    dispatcher: ReadingDispatcher<S>,
    state: ConnectionState,
    subscribed: bool,
    watchdog: TelemetryWatchdog,
    /// First tick after activation still covers handshake time
    fresh_session: bool,
    /// Time spent in Disconnected since the last rescan attempt
    rescan_wait_ms: u32,
    stats: LinkStats,
}

impl<T, D, S> ConnectionManager<T, D, S>
where
    T: BleTransport,
    D: DelayNs,
    S: ReadingSink,
{
    /// Create a manager in the Idle state. Every registry address is routed
    /// to `sink`.
    pub fn new(transport: T, delay: D, registry: FieldRegistry, config: LinkConfig, sink: S) -> Self {
        let dispatcher = ReadingDispatcher::for_registry(&registry, sink);
        let watchdog = TelemetryWatchdog::new(config.timing.telemetry_timeout_ms);

        Self {
            transport,
            delay,
            registry,
            config,
            dispatcher,
            state: ConnectionState::Idle,
            subscribed: false,
            watchdog,
            fresh_session: false,
            rescan_wait_ms: 0,
            stats: LinkStats::default(),
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Status line for the display
    pub fn status_text(&self) -> &'static str {
        self.state.status_text()
    }

    /// Session counters
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Field table in use
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Link parameters in use
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Reading dispatcher
    pub fn dispatcher(&self) -> &ReadingDispatcher<S> {
        &self.dispatcher
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Check if notifications are enabled for the current session
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Apply an event to the state machine. Returns true if the state changed.
    fn apply(&mut self, event: LinkEvent) -> bool {
        let next = self.state.transition(event);
        if next == self.state {
            debug!("{:?} ignored in {:?}", event, self.state);
            return false;
        }

        info!("Link {:?} -> {:?} on {:?}", self.state, next, event);
        self.state = next;
        true
    }

    /// Route a transport event to its handler
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Advertisement { device, name } => {
                self.on_advertisement(device, &name).await
            }
            TransportEvent::Notification(bytes) => {
                self.on_notification(&bytes);
            }
            TransportEvent::Disconnected => self.on_disconnect().await,
        }
    }

    /// Begin scanning. A no-op while scanning or while a link exists.
    pub fn start_scan(&mut self) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Disconnected => {
                self.resume_scan(LinkEvent::StartScan)
            }
            ConnectionState::Scanning => debug!("Scan already running"),
            state => debug!("Scan request ignored while {:?}", state),
        }
    }

    /// Ask the transport to scan and apply `on_started` if it did
    fn resume_scan(&mut self, on_started: LinkEvent) {
        match self.transport.start_scan() {
            Ok(()) => {
                self.stats.scans_started = self.stats.scans_started.wrapping_add(1);
                self.rescan_wait_ms = 0;
                self.apply(on_started);
            }
            Err(_) => {
                warn!("Transport refused to start scanning");
                // A failed connect must not stay in Connecting; Disconnected
                // retries from tick()
                if self.state == ConnectionState::Connecting {
                    self.apply(LinkEvent::LinkLost);
                }
            }
        }
    }

    /// Scan result from the transport
    pub async fn on_advertisement(&mut self, device: DeviceAddress, name: &str) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        if !self.config.matches_name(name) {
            trace!("Ignoring advertiser {}", name);
            return;
        }

        info!("Found controller {}", name);
        // The radio cannot scan and connect at the same time
        self.transport.stop_scan();
        self.apply(LinkEvent::DeviceMatched);
        self.connect(device).await;
    }

    /// Connect, configure and subscribe
    async fn connect(&mut self, device: DeviceAddress) {
        let timing = self.config.timing;
        self.stats.connect_attempts = self.stats.connect_attempts.wrapping_add(1);

        if self.transport.connect(device).await.is_err() {
            self.stats.connect_failures = self.stats.connect_failures.wrapping_add(1);
            warn!("Connect failed, rescanning in {} ms", timing.connect_retry_ms);
            self.delay.delay_ms(timing.connect_retry_ms).await;
            self.resume_scan(LinkEvent::ConnectFailed);
            return;
        }

        self.apply(LinkEvent::Connected);
        self.subscribed = false;

        if let Err(e) = self.configure().await {
            warn!("Session abandoned: {:?}", e);
            self.link_lost().await;
            return;
        }

        self.apply(LinkEvent::HandshakeComplete);
        self.stats.handshakes_completed = self.stats.handshakes_completed.wrapping_add(1);
        self.watchdog.reset();
        self.fresh_session = true;
    }

    /// Configuring phase: optional early subscribe, handshake, late subscribe
    async fn configure(&mut self) -> Result<(), LinkError> {
        if self.config.subscribe_on_connect {
            self.subscribe().await?;
        }

        self.delay.delay_ms(self.config.timing.post_connect_ms).await;
        self.run_handshake().await?;

        if !self.subscribed {
            self.subscribe().await?;
        }

        let steps = handshake_steps(&self.registry).count();
        self.ensure_connected(steps)
    }

    fn ensure_connected(&self, step: usize) -> Result<(), LinkError> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(LinkError::Dropped { step: step as u8 })
        }
    }

    /// Send stop, clear, one setup per field, start. Writes are not
    /// acknowledged, only spaced out.
    async fn run_handshake(&mut self) -> Result<(), LinkError> {
        let timing = self.config.timing;

        for (index, step) in handshake_steps(&self.registry).enumerate() {
            if matches!(step, HandshakeStep::Control(ControlCommand::StartUpload)) {
                self.delay.delay_ms(timing.post_setup_ms).await;
            }

            self.ensure_connected(index)?;

            let command = step.command();
            trace!("Handshake step {}: {:?}", index, command);
            self.transport
                .write(command.as_bytes())
                .await
                .map_err(|_| LinkError::Write { step: index as u8 })?;

            let pause = match step {
                HandshakeStep::Control(ControlCommand::StopUpload)
                | HandshakeStep::Control(ControlCommand::ClearData) => timing.settle_ms,
                HandshakeStep::ChannelSetup(_) => timing.channel_interval_ms,
                HandshakeStep::Control(ControlCommand::StartUpload) => 0,
            };
            if pause > 0 {
                self.delay.delay_ms(pause).await;
            }
        }

        debug!("Handshake sent for {} channels", self.registry.len());
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), LinkError> {
        self.transport
            .subscribe_notifications()
            .await
            .map_err(|_| LinkError::Subscribe)?;
        self.subscribed = true;
        Ok(())
    }

    /// Decode a notification and forward it if valid.
    ///
    /// Malformed or unknown packets are counted and dropped.
    pub fn on_notification(&mut self, bytes: &[u8]) -> DecodedReading {
        if !self.state.is_connected() {
            trace!("Notification outside a session dropped");
            return DecodedReading::invalid(0);
        }

        match decode_packet(&self.registry, bytes) {
            Ok(reading) => {
                self.stats.packets_decoded = self.stats.packets_decoded.wrapping_add(1);
                self.watchdog.feed();
                self.dispatcher.dispatch(reading);
                reading
            }
            Err(e) => {
                self.stats.packets_dropped = self.stats.packets_dropped.wrapping_add(1);
                trace!("Dropped packet: {:?}", e);
                DecodedReading::invalid(e.address().unwrap_or(0))
            }
        }
    }

    /// Disconnect reported by the transport
    pub async fn on_disconnect(&mut self) {
        if !self.state.is_busy() {
            debug!("Disconnect ignored in {:?}", self.state);
            return;
        }

        warn!("Link lost");
        self.link_lost().await;
    }

    /// Enter Disconnected, mark values stale, then rescan after the delay
    async fn link_lost(&mut self) {
        self.apply(LinkEvent::LinkLost);
        self.subscribed = false;
        self.rescan_wait_ms = 0;
        self.stats.link_losses = self.stats.link_losses.wrapping_add(1);
        self.dispatcher.invalidate();

        self.delay
            .delay_ms(self.config.timing.reconnect_delay_ms)
            .await;
        self.resume_scan(LinkEvent::StartScan);
    }

    /// User asked to reconnect.
    ///
    /// An existing session is dropped and scanning restarts; a scan or
    /// connect already in flight is left alone.
    pub async fn request_reconnect(&mut self) {
        match self.state {
            ConnectionState::Idle | ConnectionState::Disconnected => {
                self.resume_scan(LinkEvent::StartScan)
            }
            ConnectionState::Scanning | ConnectionState::Connecting => {
                debug!("Reconnect ignored while {:?}", self.state)
            }
            ConnectionState::Configuring | ConnectionState::Active => {
                info!("Reconnect requested, dropping current link");
                self.transport.disconnect().await;
                self.link_lost().await;
            }
        }
    }

    /// Periodic housekeeping
    ///
    /// # Arguments
    /// - `elapsed_ms`: Time elapsed since last tick
    pub async fn tick(&mut self, elapsed_ms: u32) {
        match self.state {
            ConnectionState::Active if self.fresh_session => {
                // Elapsed time includes the handshake itself
                self.fresh_session = false;
            }
            ConnectionState::Active => {
                self.watchdog.update_time(elapsed_ms);
                if self.watchdog.is_expired() {
                    warn!(
                        "No telemetry for {} ms, dropping link",
                        self.watchdog.silent_ms()
                    );
                    self.transport.disconnect().await;
                    self.link_lost().await;
                }
            }
            ConnectionState::Disconnected => {
                // Scan restart was refused earlier; keep retrying
                self.rescan_wait_ms = self.rescan_wait_ms.saturating_add(elapsed_ms);
                if self.rescan_wait_ms >= self.config.timing.reconnect_delay_ms {
                    self.rescan_wait_ms = 0;
                    self.resume_scan(LinkEvent::StartScan);
                }
            }
            _ => {}
        }
    }
}
