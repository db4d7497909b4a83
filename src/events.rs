//! Session events and the bus that delivers them.
//!
//! The session never calls listeners directly. Everything goes through an
//! [`EventTarget`], which is injected through the [`Host`](crate::Host) so
//! callers can observe or replace dispatch. [`EventBus`] is the default
//! target.
//!
//! # Example
//!
//! ```
//! use stream_recorder::{listener, EventBus, EventKind, EventTarget, RecorderEvent};
//!
//! let bus = EventBus::new();
//! bus.add_event_listener(
//!     EventKind::Start,
//!     listener(|event| println!("got {:?}", event)),
//!     None,
//! );
//! bus.dispatch_event(RecorderEvent::Start);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::encoder::Page;
use crate::error::ErrorDetail;

/// Names of the events a session emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A device stream is available.
    StreamReady,
    /// Recording started.
    Start,
    /// Recording stopped and the encoder has emitted its last page.
    Stop,
    /// Recording paused.
    Pause,
    /// Recording resumed.
    Resume,
    /// An encoded page is available.
    DataAvailable,
    /// A recoverable error occurred.
    Error,
}

impl EventKind {
    /// Returns the event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamReady => "streamReady",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::DataAvailable => "dataAvailable",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event emitted by a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// The device stream was acquired, or reused from the cache.
    StreamReady,
    /// The session entered the recording state.
    Start,
    /// The session stopped; no further pages follow for that recording.
    Stop,
    /// The session was paused.
    Pause,
    /// The session was resumed.
    Resume,
    /// An encoded page, in encoder order.
    DataAvailable(Page),
    /// A recoverable failure. The session state is unchanged.
    Error(ErrorDetail),
}

impl RecorderEvent {
    /// Returns the kind used to route this event to listeners.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StreamReady => EventKind::StreamReady,
            Self::Start => EventKind::Start,
            Self::Stop => EventKind::Stop,
            Self::Pause => EventKind::Pause,
            Self::Resume => EventKind::Resume,
            Self::DataAvailable(_) => EventKind::DataAvailable,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// A registered event callback.
///
/// Listeners are identified by pointer, so keep a clone of the `Arc` around
/// if you intend to remove it later.
pub type Listener = Arc<dyn Fn(&RecorderEvent) + Send + Sync>;

/// Creates a [`Listener`] from a closure.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&RecorderEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Creates a listener that forwards every event it receives into a channel.
///
/// Useful for awaiting events from async code:
///
/// ```
/// use stream_recorder::{channel_listener, EventBus, EventKind, EventTarget, RecorderEvent};
///
/// let bus = EventBus::new();
/// let (on_stop, mut rx) = channel_listener();
/// bus.add_event_listener(EventKind::Stop, on_stop, None);
/// bus.dispatch_event(RecorderEvent::Stop);
/// assert_eq!(rx.try_recv().unwrap(), RecorderEvent::Stop);
/// ```
pub fn channel_listener() -> (Listener, mpsc::UnboundedReceiver<RecorderEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let forward = listener(move |event| {
        // Receiver dropped means nobody is interested anymore
        let _ = tx.send(event.clone());
    });
    (forward, rx)
}

/// Options supplied when registering a listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

/// A dispatch target for session events.
pub trait EventTarget: Send + Sync {
    /// Registers `listener` for events of `kind`.
    fn add_event_listener(&self, kind: EventKind, listener: Listener, options: Option<ListenerOptions>);

    /// Removes a previously registered `listener` for `kind`.
    fn remove_event_listener(
        &self,
        kind: EventKind,
        listener: &Listener,
        options: Option<ListenerOptions>,
    );

    /// Delivers `event` to the listeners registered for its kind.
    fn dispatch_event(&self, event: RecorderEvent);
}

struct Registration {
    listener: Listener,
    once: bool,
}

/// Synchronous, in-process [`EventTarget`].
///
/// Listeners run on the dispatching thread in registration order. The set of
/// listeners is captured when dispatch begins, so a listener may register or
/// remove listeners (including itself) while it is being called.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .get(&kind)
            .map_or(0, |registrations| registrations.len())
    }
}

impl EventTarget for EventBus {
    fn add_event_listener(&self, kind: EventKind, listener: Listener, options: Option<ListenerOptions>) {
        let mut listeners = self.listeners.lock();
        let registrations = listeners.entry(kind).or_default();

        if registrations
            .iter()
            .any(|r| Arc::ptr_eq(&r.listener, &listener))
        {
            return;
        }

        registrations.push(Registration {
            listener,
            once: options.is_some_and(|o| o.once),
        });
    }

    fn remove_event_listener(
        &self,
        kind: EventKind,
        listener: &Listener,
        _options: Option<ListenerOptions>,
    ) {
        let mut listeners = self.listeners.lock();
        if let Some(registrations) = listeners.get_mut(&kind) {
            registrations.retain(|r| !Arc::ptr_eq(&r.listener, listener));
        }
    }

    fn dispatch_event(&self, event: RecorderEvent) {
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let Some(registrations) = listeners.get_mut(&event.kind()) else {
                return;
            };
            let snapshot = registrations.iter().map(|r| r.listener.clone()).collect();
            registrations.retain(|r| !r.once);
            snapshot
        };

        for listener in snapshot {
            listener(&event);
        }
    }
}
