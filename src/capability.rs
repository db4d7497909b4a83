//! Host capabilities injected into a session.
//!
//! A session never reaches for ambient globals. Everything it needs from its
//! environment arrives through a [`Host`]:
//!
//! - `audio`: builds capture graphs ([`AudioHost`])
//! - `devices`: acquires input streams ([`MediaDevices`])
//! - `encoders`: starts background encode tasks ([`EncoderSpawner`])
//! - `events`: optional dispatch target, a fresh [`EventBus`] when unset

use std::fmt;
use std::sync::Arc;

use crate::audio::{AudioHost, MediaDevices};
use crate::encoder::EncoderSpawner;
use crate::events::{EventBus, EventTarget};

/// Capabilities a session is built from
#[derive(Clone, Default)]
pub struct Host {
    pub audio: Option<Arc<dyn AudioHost>>,
    pub devices: Option<Arc<dyn MediaDevices>>,
    pub encoders: Option<Arc<dyn EncoderSpawner>>,
    pub events: Option<Arc<dyn EventTarget>>,
}

impl Host {
    /// A host with no capabilities at all
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(mut self, audio: impl AudioHost + 'static) -> Self {
        self.audio = Some(Arc::new(audio));
        self
    }

    pub fn with_devices(mut self, devices: impl MediaDevices + 'static) -> Self {
        self.devices = Some(Arc::new(devices));
        self
    }

    pub fn with_encoders(mut self, encoders: impl EncoderSpawner + 'static) -> Self {
        self.encoders = Some(Arc::new(encoders));
        self
    }

    /// Dispatch events through `events` instead of a private bus
    pub fn with_events(mut self, events: Arc<dyn EventTarget>) -> Self {
        self.events = Some(events);
        self
    }

    /// Names of the required capabilities this host lacks
    pub fn missing_capabilities(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.audio.is_none() {
            missing.push("audio");
        }
        if self.devices.is_none() {
            missing.push("devices");
        }
        if self.encoders.is_none() {
            missing.push("encoders");
        }
        missing
    }

    pub(crate) fn event_target(&self) -> Arc<dyn EventTarget> {
        self.events
            .clone()
            .unwrap_or_else(|| Arc::new(EventBus::new()))
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("audio", &self.audio.is_some())
            .field("devices", &self.devices.is_some())
            .field("encoders", &self.encoders.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}

/// Whether `host` has everything a session needs to record
///
/// The event target is not required; sessions fall back to their own bus.
pub fn is_recording_supported(host: &Host) -> bool {
    host.audio.is_some() && host.devices.is_some() && host.encoders.is_some()
}
