//! Reading dispatch
//!
//! Routes every valid decoded reading to the registered consumer, exactly
//! once, synchronously and in arrival order. Nothing is buffered.

use heapless::Vec;

use harvlink_protocol::{DecodedReading, FieldRegistry, MAX_FIELDS};

/// Consumer of calibrated readings (normally the display layer)
pub trait ReadingSink {
    /// A fresh value for `address`
    fn on_reading(&mut self, address: u16, value: f32);

    /// Every cached value is stale (link lost)
    fn on_stale(&mut self) {}
}

impl<F: FnMut(u16, f32)> ReadingSink for F {
    fn on_reading(&mut self, address: u16, value: f32) {
        self(address, value)
    }
}

/// Errors raised while registering routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// Address already routed
    AlreadyRouted(u16),
    /// Route table full
    TableFull,
}

/// Address-routed forwarder from decoder to consumer
#[derive(Debug)]
pub struct ReadingDispatcher<S> {
    routes: Vec<u16, MAX_FIELDS>,
    sink: S,
    unrouted: u32,
}

impl<S: ReadingSink> ReadingDispatcher<S> {
    /// Create a dispatcher with an empty route table
    pub fn new(sink: S) -> Self {
        Self {
            routes: Vec::new(),
            sink,
            unrouted: 0,
        }
    }

    /// Create a dispatcher routing every registry address to `sink`
    pub fn for_registry(registry: &FieldRegistry, sink: S) -> Self {
        let mut dispatcher = Self::new(sink);
        for field in registry.iter() {
            // Registry addresses are unique and the registry holds at most MAX_FIELDS
            let _ = dispatcher.register(field.address);
        }
        dispatcher
    }

    /// Route `address` to the sink
    pub fn register(&mut self, address: u16) -> Result<(), DispatchError> {
        if self.is_routed(address) {
            return Err(DispatchError::AlreadyRouted(address));
        }
        self.routes
            .push(address)
            .map_err(|_| DispatchError::TableFull)
    }

    /// Check if an address has a route
    pub fn is_routed(&self, address: u16) -> bool {
        self.routes.contains(&address)
    }

    /// Forward a reading. Returns true if the sink received it.
    pub fn dispatch(&mut self, reading: DecodedReading) -> bool {
        if !reading.valid {
            return false;
        }
        if !self.is_routed(reading.address) {
            self.unrouted = self.unrouted.wrapping_add(1);
            return false;
        }
        self.sink.on_reading(reading.address, reading.value);
        true
    }

    /// Tell the sink every value it holds is stale
    pub fn invalidate(&mut self) {
        self.sink.on_stale();
    }

    /// Valid readings dropped for lack of a route
    pub fn unrouted(&self) -> u32 {
        self.unrouted
    }

    /// Get the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get the sink mutably
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        readings: Vec<(u16, f32), 8>,
        stale: u8,
    }

    impl ReadingSink for Recorder {
        fn on_reading(&mut self, address: u16, value: f32) {
            self.readings.push((address, value)).unwrap();
        }

        fn on_stale(&mut self) {
            self.stale += 1;
        }
    }

    fn reading(address: u16, value: f32) -> DecodedReading {
        DecodedReading {
            address,
            value,
            valid: true,
        }
    }

    #[test]
    fn test_routes_registry_addresses_in_order() {
        let registry = FieldRegistry::builtin();
        let mut dispatcher = ReadingDispatcher::for_registry(&registry, Recorder::default());

        assert!(dispatcher.dispatch(reading(24, 80.5)));
        assert!(dispatcher.dispatch(reading(222, 25.0)));
        assert!(dispatcher.dispatch(reading(24, 81.0)));

        let expected: [(u16, f32); 3] = [(24, 80.5), (222, 25.0), (24, 81.0)];
        assert_eq!(dispatcher.sink().readings.as_slice(), &expected[..]);
    }

    #[test]
    fn test_invalid_reading_not_forwarded() {
        let registry = FieldRegistry::builtin();
        let mut dispatcher = ReadingDispatcher::for_registry(&registry, Recorder::default());
        assert!(!dispatcher.dispatch(DecodedReading::invalid(24)));
        assert!(dispatcher.sink().readings.is_empty());
    }

    #[test]
    fn test_unrouted_address_counted() {
        let mut dispatcher = ReadingDispatcher::new(Recorder::default());
        dispatcher.register(24).unwrap();
        assert!(!dispatcher.dispatch(reading(26, 50.0)));
        assert_eq!(dispatcher.unrouted(), 1);
        assert!(dispatcher.sink().readings.is_empty());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut dispatcher = ReadingDispatcher::new(Recorder::default());
        dispatcher.register(24).unwrap();
        assert_eq!(dispatcher.register(24), Err(DispatchError::AlreadyRouted(24)));
    }

    #[test]
    fn test_closure_sink() {
        let mut last = None;
        {
            let mut dispatcher =
                ReadingDispatcher::new(|address: u16, value: f32| last = Some((address, value)));
            dispatcher.register(105).unwrap();
            dispatcher.dispatch(reading(105, 3200.0));
            dispatcher.invalidate();
        }
        assert_eq!(last, Some((105, 3200.0)));
    }

    #[test]
    fn test_invalidate_reaches_sink() {
        let mut dispatcher = ReadingDispatcher::new(Recorder::default());
        dispatcher.invalidate();
        assert_eq!(dispatcher.sink().stale, 1);
    }
}
