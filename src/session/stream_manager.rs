//! Acquire-once cache for the device stream.
//!
//! The manager is the only place a stream is acquired or released. Callers
//! borrow the cached stream; releasing consumes it so every track is stopped
//! exactly once.

use std::sync::Arc;

use tracing::{debug, info};

use crate::audio::{MediaDevices, MediaStream, StreamConstraints};
use crate::error::DeviceError;

pub struct DeviceStreamManager {
    devices: Arc<dyn MediaDevices>,
    constraints: StreamConstraints,
    stream: Option<MediaStream>,
    acquisitions: usize,
}

impl DeviceStreamManager {
    pub fn new(devices: Arc<dyn MediaDevices>, constraints: StreamConstraints) -> Self {
        Self {
            devices,
            constraints,
            stream: None,
            acquisitions: 0,
        }
    }

    /// The cached stream, acquiring it first if needed
    ///
    /// Returns whether the stream was freshly acquired alongside it.
    pub async fn ensure(&mut self) -> Result<(&MediaStream, bool), DeviceError> {
        let fresh = self.stream.is_none();
        if fresh {
            let stream = self.devices.get_user_media(&self.constraints).await?;
            self.acquisitions += 1;
            info!(
                "Acquired input stream {} ({}Hz, {} channels, {} tracks)",
                stream.id(),
                stream.sample_rate(),
                stream.channels(),
                stream.track_count()
            );
            self.stream = Some(stream);
        }

        match self.stream.as_ref() {
            Some(stream) => Ok((stream, fresh)),
            None => Err(DeviceError::NotFound),
        }
    }

    /// Stop every track of the cached stream and forget it. Returns false
    /// when nothing was held.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(stream) => {
                let id = stream.id().to_string();
                let stopped = stream.stop();
                info!("Released input stream {} ({} tracks stopped)", id, stopped);
                true
            }
            None => {
                debug!("No input stream to release");
                false
            }
        }
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    pub fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }

    /// Successful acquisitions over the manager's lifetime
    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }
}
