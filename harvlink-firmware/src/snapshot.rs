//! Latest telemetry values
//!
//! The link task writes readings through [`SnapshotSink`]; the display task
//! takes copies with [`SharedSnapshot::snapshot`] whenever it redraws.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use harvlink_core::dispatch::ReadingSink;
use harvlink_protocol::MAX_FIELDS;

/// Last value received for one address
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldValue {
    pub address: u16,
    pub value: f32,
}

/// Current value of every field seen so far
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    values: Vec<FieldValue, MAX_FIELDS>,
    /// Last session ended and no reading arrived since
    stale: bool,
    /// Readings applied since boot
    updates: u32,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySnapshot {
    /// Create an empty snapshot
    pub const fn new() -> Self {
        Self {
            values: Vec::new(),
            stale: false,
            updates: 0,
        }
    }

    /// Store a fresh reading
    pub fn update(&mut self, address: u16, value: f32) {
        if let Some(entry) = self.values.iter_mut().find(|v| v.address == address) {
            entry.value = value;
        } else if self.values.push(FieldValue { address, value }).is_err() {
            // Dispatcher routes only registry addresses, so this cannot
            // happen with a consistent registry
            return;
        }
        self.stale = false;
        self.updates = self.updates.wrapping_add(1);
    }

    /// Drop the values of an ended session and flag the snapshot
    pub fn mark_stale(&mut self) {
        self.values.clear();
        self.stale = true;
    }

    /// Latest value for `address`
    pub fn get(&self, address: u16) -> Option<f32> {
        self.values
            .iter()
            .find(|v| v.address == address)
            .map(|v| v.value)
    }

    /// Values in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.values.iter()
    }

    /// Check if the link was lost since the last reading
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Readings applied since boot
    pub fn updates(&self) -> u32 {
        self.updates
    }
}

/// Snapshot shared between the link task and the display
pub struct SharedSnapshot {
    inner: Mutex<CriticalSectionRawMutex, RefCell<TelemetrySnapshot>>,
}

impl Default for SharedSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSnapshot {
    /// Create an empty shared snapshot
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(TelemetrySnapshot::new())),
        }
    }

    /// Writer handed to the connection manager
    pub fn sink(&self) -> SnapshotSink<'_> {
        SnapshotSink { shared: self }
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.lock(|cell| cell.borrow().clone())
    }

    /// Latest value for one address
    pub fn value(&self, address: u16) -> Option<f32> {
        self.inner.lock(|cell| cell.borrow().get(address))
    }

    fn with<R>(&self, f: impl FnOnce(&mut TelemetrySnapshot) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

/// [`ReadingSink`] writing into a [`SharedSnapshot`]
#[derive(Clone, Copy)]
pub struct SnapshotSink<'a> {
    shared: &'a SharedSnapshot,
}

impl ReadingSink for SnapshotSink<'_> {
    fn on_reading(&mut self, address: u16, value: f32) {
        self.shared.with(|snapshot| snapshot.update(address, value));
    }

    fn on_stale(&mut self) {
        debug!("Telemetry values cleared");
        self.shared.with(|snapshot| snapshot.mark_stale());
    }
}
