//! Event dispatch
//!
//! Fan-out of change notifications to registered observers. Two kinds of
//! observer are supported:
//! - callbacks, invoked synchronously on the read loop thread
//! - channel subscribers, fed through bounded `crossbeam-channel` queues
//!
//! A notification goes to the observers registered at the moment it is
//! raised. The observer list is copied before handlers run, so handlers may
//! subscribe or unsubscribe without deadlocking the dispatcher.

pub mod logger;
pub mod recorder;

pub use logger::EventLogger;
pub use recorder::EventRecorder;

use crate::joystick::types::{AxisChanged, ButtonChanged, GamepadEvent};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Handle returned when registering an observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type AxisHandler = Arc<dyn Fn(AxisChanged) + Send + Sync>;
type ButtonHandler = Arc<dyn Fn(ButtonChanged) + Send + Sync>;

/// Observer of both notification kinds
pub trait GamepadObserver: Send + Sync {
    fn on_axis_changed(&self, event: AxisChanged);

    fn on_button_changed(&self, event: ButtonChanged);
}

/// Observer registry shared between the decoder and its read loop
pub struct Dispatcher {
    next_id: AtomicU64,
    axis_handlers: RwLock<Vec<(SubscriptionId, AxisHandler)>>,
    button_handlers: RwLock<Vec<(SubscriptionId, ButtonHandler)>>,
    channels: Mutex<Vec<Sender<GamepadEvent>>>,
    channel_capacity: usize,
}

impl Dispatcher {
    /// Create a dispatcher whose channel subscribers hold at most `channel_capacity` events
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            axis_handlers: RwLock::new(Vec::new()),
            button_handlers: RwLock::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            channel_capacity,
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register an axis change callback
    pub fn on_axis_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(AxisChanged) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.axis_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Register a button change callback
    pub fn on_button_changed<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(ButtonChanged) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.button_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Register an observer for both kinds. Returns (axis id, button id).
    pub fn attach<O>(&self, observer: Arc<O>) -> (SubscriptionId, SubscriptionId)
    where
        O: GamepadObserver + 'static,
    {
        let axis_observer = Arc::clone(&observer);
        let axis_id = self.on_axis_changed(move |event| axis_observer.on_axis_changed(event));
        let button_id = self.on_button_changed(move |event| observer.on_button_changed(event));
        (axis_id, button_id)
    }

    /// Remove a callback. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut axis = self.axis_handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = axis.len();
        axis.retain(|(handler_id, _)| *handler_id != id);
        if axis.len() != before {
            return true;
        }
        drop(axis);

        let mut buttons = self.button_handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = buttons.len();
        buttons.retain(|(handler_id, _)| *handler_id != id);
        buttons.len() != before
    }

    /// Open a bounded channel receiving every notification.
    /// Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> Receiver<GamepadEvent> {
        let (sender, receiver) = bounded(self.channel_capacity);
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Number of registered callbacks and channels
    pub fn observer_count(&self) -> usize {
        let axis = self.axis_handlers.read().unwrap_or_else(PoisonError::into_inner).len();
        let buttons = self.button_handlers.read().unwrap_or_else(PoisonError::into_inner).len();
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner).len();
        axis + buttons + channels
    }

    /// Deliver an axis change to every current observer
    pub fn raise_axis_changed(&self, event: AxisChanged) {
        trace!("AxisChanged {{ address: {}, value: {} }}", event.address, event.value);
        let handlers: Vec<AxisHandler> = self
            .axis_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
        self.forward(event.into());
    }

    /// Deliver a button change to every current observer
    pub fn raise_button_changed(&self, event: ButtonChanged) {
        trace!("ButtonChanged {{ address: {}, pressed: {} }}", event.address, event.pressed);
        let handlers: Vec<ButtonHandler> = self
            .button_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
        self.forward(event.into());
    }

    fn forward(&self, event: GamepadEvent) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|sender| match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
