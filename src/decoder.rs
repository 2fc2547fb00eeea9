//! Gamepad decoder
//!
//! This module owns the background read loop. A [`GamepadDecoder`] takes a
//! [`PacketSource`], starts reading 8-byte packets from it on a dedicated
//! thread, keeps the [`DeviceState`] current and raises a notification each
//! time a known button or axis actually changes value.
//!
//! # Cancellation
//! Cancellation is cooperative and checked once per iteration, before the next
//! read. If the loop is already blocked in a read when [`GamepadDecoder::dispose`]
//! runs, it stops only once that read returns, so one more packet may still be
//! decoded and dispatched after disposal. Sources that can wake a blocked read
//! from `close` (such as [`ChannelSource`](crate::joystick::ChannelSource))
//! stop immediately instead.

use crate::config::{Config, ConfigError, ControllerSettings};
use crate::dispatch::{Dispatcher, GamepadObserver, SubscriptionId};
use crate::joystick::constants::PACKET_SIZE;
use crate::joystick::packet::Packet;
use crate::joystick::source::{open_device, PacketSource};
use crate::joystick::state::{DeviceState, Snapshot};
use crate::joystick::types::{AxisChanged, ButtonChanged, ControlKind, GamepadEvent};
use crossbeam_channel::Receiver;
use log::{debug, error, info, trace, warn};
use std::collections::BTreeMap;
use std::io::{self, ErrorKind};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Read loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Reading packets
    Running,
    /// Disposal requested; waiting for the in-flight read to return
    CancelRequested,
    /// Loop has exited
    Stopped,
}

/// Reason the read loop terminated
#[derive(Debug, Error)]
pub enum ReadLoopError {
    #[error("Device read failed: {0}")]
    Io(#[from] io::Error),

    #[error("Button {address} updated before it was configured")]
    UnregisteredButton { address: u8 },

    #[error("Axis {address} updated before it was configured")]
    UnregisteredAxis { address: u8 },

    #[error("Read loop panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("Failed to start decoder: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ============================================================================
// Read Loop
// ============================================================================

/// State moved onto the read loop thread
struct ReadLoop {
    name: String,
    source: Arc<dyn PacketSource>,
    state: Arc<RwLock<DeviceState>>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
}

impl ReadLoop {
    fn run(&self) -> Result<(), ReadLoopError> {
        let mut buffer = [0u8; PACKET_SIZE];

        while !self.cancel.is_cancelled() {
            if let Err(e) = self.read_packet(&mut buffer) {
                if self.cancel.is_cancelled() {
                    debug!("[{}] Read ended after cancellation: {}", self.name, e);
                    return Ok(());
                }
                return Err(e.into());
            }

            self.process(Packet::from(buffer))?;
        }

        Ok(())
    }

    /// Fill the buffer with exactly one packet
    fn read_packet(&self, buffer: &mut [u8; PACKET_SIZE]) -> io::Result<()> {
        let mut filled = 0;
        while filled < PACKET_SIZE {
            match self.source.read(buffer, filled, PACKET_SIZE - filled) {
                Ok(0) => {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "device stream ended"));
                }
                Ok(n) => filled += n.min(PACKET_SIZE - filled),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn store(&self) -> RwLockWriteGuard<'_, DeviceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one packet. Notifications are raised after the store lock is released.
    fn process(&self, packet: Packet) -> Result<(), ReadLoopError> {
        let address = packet.address();
        trace!(
            "[{}] Packet t={} flags=0x{:02X} address={}",
            self.name,
            packet.timestamp(),
            packet.instruction(),
            address
        );

        // A newly declared control only establishes its default value
        if let (true, Some(kind)) = (packet.has_configuration_flag(), packet.kind()) {
            let discovered = match kind {
                ControlKind::Button => self.store().register_if_new_button(address),
                ControlKind::Axis => self.store().register_if_new_axis(address),
            };
            if discovered {
                debug!("[{}] Discovered {:?} {}", self.name, kind, address);
                return Ok(());
            }
        }

        match packet.kind() {
            Some(ControlKind::Button) => {
                let pressed = packet.is_button_pressed();
                let changed = {
                    let mut store = self.store();
                    let old = store
                        .get_button(address)
                        .ok_or(ReadLoopError::UnregisteredButton { address })?;
                    if old != pressed {
                        store.set_button(address, pressed);
                    }
                    old != pressed
                };
                if changed {
                    self.dispatcher.raise_button_changed(ButtonChanged { address, pressed });
                }
            }
            Some(ControlKind::Axis) => {
                let value = packet.axis_value();
                let changed = {
                    let mut store = self.store();
                    let old = store
                        .get_axis(address)
                        .ok_or(ReadLoopError::UnregisteredAxis { address })?;
                    if old != value {
                        store.set_axis(address, value);
                    }
                    old != value
                };
                if changed {
                    self.dispatcher.raise_axis_changed(AxisChanged { address, value });
                }
            }
            None => {}
        }

        Ok(())
    }
}

/// Close failures are logged; the source is abandoned either way
fn close_source(name: &str, source: &dyn PacketSource) -> bool {
    match source.close() {
        Ok(()) => true,
        Err(e) => {
            warn!("[{}] Failed to close packet source: {}", name, e);
            false
        }
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decoder for a joystick event stream.
///
/// Construction starts the read loop immediately, so packets may be decoded
/// before the caller has attached observers. Dropping the decoder disposes it.
pub struct GamepadDecoder {
    name: String,
    source: Arc<dyn PacketSource>,
    state: Arc<RwLock<DeviceState>>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    released: AtomicBool,
    lifecycle: Arc<watch::Sender<LoopState>>,
    handle: Option<JoinHandle<Result<(), ReadLoopError>>>,
}

impl GamepadDecoder {
    /// Start decoding an already-open source with default settings
    pub fn new<S: PacketSource>(source: S) -> Result<Self, DecoderError> {
        Self::with_settings(source, &ControllerSettings::default())
    }

    /// Open a device file (default `/dev/input/js0`) and start decoding it
    pub fn open(device_path: Option<&str>) -> Result<Self, DecoderError> {
        let source = open_device(device_path)?;
        Self::new(source)
    }

    /// Open the device named in the configuration and start decoding it
    pub fn from_config(config: &Config) -> Result<Self, DecoderError> {
        config.validate()?;
        let source = open_device(Some(&config.controller.device_path))?;
        Self::with_settings(source, &config.controller)
    }

    /// Start decoding an already-open source
    pub fn with_settings<S: PacketSource>(
        source: S,
        settings: &ControllerSettings,
    ) -> Result<Self, DecoderError> {
        settings.validate()?;

        let source: Arc<dyn PacketSource> = Arc::new(source);
        let state = Arc::new(RwLock::new(DeviceState::new()));
        let dispatcher = Arc::new(Dispatcher::new(settings.event_channel_capacity));
        let cancel = CancellationToken::new();
        let (lifecycle, _) = watch::channel(LoopState::Running);
        let lifecycle = Arc::new(lifecycle);

        let read_loop = ReadLoop {
            name: settings.name.clone(),
            source: Arc::clone(&source),
            state: Arc::clone(&state),
            dispatcher: Arc::clone(&dispatcher),
            cancel: cancel.clone(),
        };
        let loop_lifecycle = Arc::clone(&lifecycle);

        let spawned = thread::Builder::new()
            .name(settings.thread_name.clone())
            .spawn(move || {
                info!("[{}] Read loop started", read_loop.name);

                let result = panic::catch_unwind(AssertUnwindSafe(|| read_loop.run()))
                    .unwrap_or(Err(ReadLoopError::Panicked));

                match &result {
                    Ok(()) => info!("[{}] Read loop stopped", read_loop.name),
                    Err(e) => error!("[{}] Read loop failed: {}", read_loop.name, e),
                }
                loop_lifecycle.send_replace(LoopState::Stopped);

                result
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                close_source(&settings.name, source.as_ref());
                return Err(e.into());
            }
        };

        Ok(Self {
            name: settings.name.clone(),
            source,
            state,
            dispatcher,
            cancel,
            released: AtomicBool::new(false),
            lifecycle,
            handle: Some(handle),
        })
    }

    /// Controller name from the settings
    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Register a callback for axis changes. Runs on the read loop thread.
    pub fn on_axis_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(AxisChanged) + Send + Sync + 'static,
    {
        self.dispatcher.on_axis_changed(handler)
    }

    /// Register a callback for button changes. Runs on the read loop thread.
    pub fn on_button_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(ButtonChanged) + Send + Sync + 'static,
    {
        self.dispatcher.on_button_changed(handler)
    }

    /// Register an observer for both notification kinds
    pub fn attach<O>(&self, observer: Arc<O>) -> (SubscriptionId, SubscriptionId)
    where
        O: GamepadObserver + 'static,
    {
        self.dispatcher.attach(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Bounded channel receiving every notification
    pub fn subscribe(&self) -> Receiver<GamepadEvent> {
        self.dispatcher.subscribe()
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    fn with_state<T>(&self, f: impl FnOnce(&DeviceState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Current button map (address -> pressed)
    pub fn buttons(&self) -> BTreeMap<u8, bool> {
        self.with_state(DeviceState::buttons)
    }

    /// Current axis map (address -> value)
    pub fn axes(&self) -> BTreeMap<u8, i16> {
        self.with_state(DeviceState::axes)
    }

    pub fn button(&self, address: u8) -> Option<bool> {
        self.with_state(|state| state.get_button(address))
    }

    pub fn axis(&self, address: u8) -> Option<i16> {
        self.with_state(|state| state.get_axis(address))
    }

    /// Both maps, copied under one lock
    pub fn snapshot(&self) -> Snapshot {
        self.with_state(DeviceState::snapshot)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn state(&self) -> LoopState {
        *self.lifecycle.borrow()
    }

    /// Receiver that observes lifecycle transitions
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.lifecycle.subscribe()
    }

    /// Wait until the read loop has exited
    pub async fn stopped(&self) {
        let mut receiver = self.lifecycle.subscribe();
        let _ = receiver.wait_for(|state| *state == LoopState::Stopped).await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the read loop exits and return its outcome.
    ///
    /// The outcome is returned once; later calls return `Ok(())`. Does not
    /// cancel the loop, so call [`dispose`](Self::dispose) first to stop a
    /// healthy stream.
    pub fn join(&mut self) -> Result<(), ReadLoopError> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or(Err(ReadLoopError::Panicked)),
            None => Ok(()),
        }
    }

    /// Request cancellation and release the source.
    ///
    /// Idempotent and non-blocking. A failure to close the source is logged,
    /// never returned.
    pub fn dispose(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("[{}] Disposing decoder", self.name);
        self.cancel.cancel();
        self.lifecycle.send_if_modified(|state| {
            if *state == LoopState::Running {
                *state = LoopState::CancelRequested;
                true
            } else {
                false
            }
        });

        close_source(&self.name, self.source.as_ref());
    }

    pub fn is_disposed(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for GamepadDecoder {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joystick::source::ChannelSource;

    fn read_loop() -> ReadLoop {
        let (source, _feeder) = ChannelSource::new();
        ReadLoop {
            name: "test".to_string(),
            source: Arc::new(source),
            state: Arc::new(RwLock::new(DeviceState::new())),
            dispatcher: Arc::new(Dispatcher::new(16)),
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn test_process_configuration_then_value() {
        let read_loop = read_loop();
        let events = read_loop.dispatcher.subscribe();

        read_loop.process(Packet::axis(3, 0).configured()).unwrap();
        assert!(events.try_recv().is_err());

        read_loop.process(Packet::axis(3, 300)).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            GamepadEvent::AxisChanged(AxisChanged { address: 3, value: 300 })
        );
        assert_eq!(read_loop.state.read().unwrap().get_axis(3), Some(300));
    }

    #[test]
    fn test_new_configuration_ignores_carried_value() {
        let read_loop = read_loop();
        let events = read_loop.dispatcher.subscribe();

        // Initial state burst reports the axis already deflected
        read_loop.process(Packet::axis(1, -500).configured()).unwrap();
        assert_eq!(read_loop.state.read().unwrap().get_axis(1), Some(0));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_known_configuration_falls_through() {
        let read_loop = read_loop();
        let events = read_loop.dispatcher.subscribe();

        read_loop.process(Packet::button(2, false).configured()).unwrap();
        read_loop.process(Packet::button(2, true).configured()).unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            GamepadEvent::ButtonChanged(ButtonChanged { address: 2, pressed: true })
        );
    }

    #[test]
    fn test_button_priority_over_axis() {
        let read_loop = read_loop();

        read_loop.process(Packet::encode(0x83, 4, 1)).unwrap();
        let state = read_loop.state.read().unwrap();
        assert_eq!(state.get_button(4), Some(false));
        assert_eq!(state.get_axis(4), None);
    }

    #[test]
    fn test_button_priority_on_value_update() {
        let read_loop = read_loop();
        let events = read_loop.dispatcher.subscribe();

        // Same address declared as both a button and an axis
        read_loop.process(Packet::button(4, false).configured()).unwrap();
        read_loop.process(Packet::axis(4, 0).configured()).unwrap();
        assert!(events.try_recv().is_err());

        read_loop.process(Packet::encode(0x03, 4, 1)).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            GamepadEvent::ButtonChanged(ButtonChanged { address: 4, pressed: true })
        );
        assert!(events.try_recv().is_err());
        assert_eq!(read_loop.state.read().unwrap().get_axis(4), Some(0));

        // Known button: configuration flag falls through to the button update
        read_loop.process(Packet::encode(0x83, 4, 0)).unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            GamepadEvent::ButtonChanged(ButtonChanged { address: 4, pressed: false })
        );
        assert!(events.try_recv().is_err());

        let state = read_loop.state.read().unwrap();
        assert_eq!(state.get_button(4), Some(false));
        assert_eq!(state.get_axis(4), Some(0));
    }

    struct FailingClose {
        close_calls: std::sync::atomic::AtomicUsize,
    }

    impl PacketSource for FailingClose {
        fn read(&self, _buffer: &mut [u8], _offset: usize, _count: usize) -> io::Result<usize> {
            Ok(0)
        }

        fn close(&self) -> io::Result<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(ErrorKind::Other, "close failed"))
        }
    }

    #[test]
    fn test_close_failure_is_logged_not_propagated() {
        let source = FailingClose {
            close_calls: std::sync::atomic::AtomicUsize::new(0),
        };
        assert!(!close_source("test", &source));
        assert_eq!(source.close_calls.load(Ordering::SeqCst), 1);

        let (channel, feeder) = ChannelSource::new();
        assert!(close_source("test", &channel));
        assert_eq!(feeder.close_calls(), 1);
    }

    #[test]
    fn test_dispose_tolerates_close_failure() {
        let mut decoder = GamepadDecoder::new(FailingClose {
            close_calls: std::sync::atomic::AtomicUsize::new(0),
        })
        .unwrap();
        decoder.dispose();
        assert!(decoder.is_disposed());
        // Zero-length read ends the loop regardless of the close outcome
        let _ = decoder.join();
        assert_eq!(decoder.state(), LoopState::Stopped);
    }

    #[test]
    fn test_unregistered_addresses_are_errors() {
        let read_loop = read_loop();

        let err = read_loop.process(Packet::button(9, true)).unwrap_err();
        assert!(matches!(err, ReadLoopError::UnregisteredButton { address: 9 }));

        let err = read_loop.process(Packet::axis(7, 10)).unwrap_err();
        assert!(matches!(err, ReadLoopError::UnregisteredAxis { address: 7 }));
    }

    #[test]
    fn test_flagless_packet_is_noop() {
        let read_loop = read_loop();
        assert!(read_loop.process(Packet::encode(0x00, 1, 1)).is_ok());
        assert!(read_loop.process(Packet::encode(0x80, 1, 1)).is_ok());

        let state = read_loop.state.read().unwrap();
        assert_eq!(state.button_count(), 0);
        assert_eq!(state.axis_count(), 0);
    }
}
