//! Hand-driven host capabilities for testing without hardware.
//!
//! [`ManualHost`] builds graphs whose buffer callback is invoked by calling
//! [`ManualHost::deliver`], so a test can drive a session one buffer at a
//! time. [`ManualDevices`] hands out streams whose stops are counted and can
//! be scripted to fail.
//!
//! # Example
//!
//! ```
//! use stream_recorder::audio::{ManualHost, SampleBuffer};
//!
//! let host = ManualHost::new(48000);
//! // Nothing is connected yet, so the buffer goes nowhere
//! assert!(!host.deliver(SampleBuffer::silent(1, 4096)));
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{AudioGraph, AudioHost, BufferHandler, GraphConfig, SampleBuffer};
use super::stream::{MediaDevices, MediaStream, MediaTrack, StreamConstraints};
use crate::error::{DeviceError, GraphError};

#[derive(Default)]
struct ManualShared {
    handler: Mutex<Option<BufferHandler>>,
    graphs_created: AtomicUsize,
    connects: AtomicUsize,
    sources_attached: AtomicUsize,
    last_config: Mutex<Option<GraphConfig>>,
    monitor_gain: Mutex<f32>,
}

/// [`AudioHost`] whose graphs are driven by [`ManualHost::deliver`].
///
/// Clones share state, so keep one clone for the test and pass another to
/// the [`Host`](crate::Host).
#[derive(Clone)]
pub struct ManualHost {
    sample_rate: u32,
    shared: Arc<ManualShared>,
}

impl ManualHost {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            shared: Arc::new(ManualShared::default()),
        }
    }

    /// Invoke the connected graph's buffer callback. Returns false when no
    /// graph is connected.
    pub fn deliver(&self, buffer: SampleBuffer) -> bool {
        match self.shared.handler.lock().as_mut() {
            Some(handler) => {
                handler(buffer);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.handler.lock().is_some()
    }

    pub fn graphs_created(&self) -> usize {
        self.shared.graphs_created.load(Ordering::SeqCst)
    }

    /// How many times a buffer-callback node was connected to the destination.
    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn sources_attached(&self) -> usize {
        self.shared.sources_attached.load(Ordering::SeqCst)
    }

    /// Configuration of the most recently created graph.
    pub fn last_config(&self) -> Option<GraphConfig> {
        self.shared.last_config.lock().clone()
    }

    pub fn monitor_gain(&self) -> f32 {
        *self.shared.monitor_gain.lock()
    }
}

impl AudioHost for ManualHost {
    fn create_graph(&self, config: &GraphConfig) -> Result<Box<dyn AudioGraph>, GraphError> {
        self.shared.graphs_created.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_config.lock() = Some(config.clone());
        *self.shared.monitor_gain.lock() = config.monitor_gain;

        Ok(Box::new(ManualGraph {
            sample_rate: self.sample_rate,
            shared: self.shared.clone(),
            has_source: false,
            connected: false,
        }))
    }
}

struct ManualGraph {
    sample_rate: u32,
    shared: Arc<ManualShared>,
    has_source: bool,
    connected: bool,
}

impl AudioGraph for ManualGraph {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn monitor_gain(&self) -> f32 {
        *self.shared.monitor_gain.lock()
    }

    fn set_monitor_gain(&mut self, gain: f32) {
        *self.shared.monitor_gain.lock() = gain;
    }

    fn attach_source(&mut self, _stream: &MediaStream) -> Result<(), GraphError> {
        self.shared.sources_attached.fetch_add(1, Ordering::SeqCst);
        self.has_source = true;
        Ok(())
    }

    fn connect(&mut self, handler: BufferHandler) -> Result<(), GraphError> {
        if self.connected {
            return Err(GraphError::AlreadyConnected);
        }
        if !self.has_source {
            return Err(GraphError::NoSource);
        }
        *self.shared.handler.lock() = Some(handler);
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.shared.handler.lock().take();
            self.connected = false;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Shape of the streams handed out by [`ManualDevices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLayout {
    /// One stop handle for the whole stream
    Whole,
    /// This many independently stopped tracks
    Tracks(usize),
}

#[derive(Default)]
struct DeviceShared {
    acquisitions: AtomicUsize,
    stops: Mutex<Vec<Arc<AtomicUsize>>>,
    failures: Mutex<VecDeque<DeviceError>>,
}

/// Scripted [`MediaDevices`].
#[derive(Clone)]
pub struct ManualDevices {
    sample_rate: u32,
    layout: TrackLayout,
    shared: Arc<DeviceShared>,
}

impl ManualDevices {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            layout: TrackLayout::Whole,
            shared: Arc::new(DeviceShared::default()),
        }
    }

    pub fn with_layout(mut self, layout: TrackLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Make the next acquisition fail with `error`. Failures queue up.
    pub fn fail_next(&self, error: DeviceError) {
        self.shared.failures.lock().push_back(error);
    }

    /// Number of `get_user_media` calls, failed ones included.
    pub fn acquisitions(&self) -> usize {
        self.shared.acquisitions.load(Ordering::SeqCst)
    }

    /// Stop counts of every track handed out so far, in acquisition order.
    pub fn track_stops(&self) -> Vec<usize> {
        self.shared
            .stops
            .lock()
            .iter()
            .map(|count| count.load(Ordering::SeqCst))
            .collect()
    }

    fn counted_track(&self) -> Box<dyn MediaTrack> {
        let count = Arc::new(AtomicUsize::new(0));
        self.shared.stops.lock().push(count.clone());
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[async_trait]
impl MediaDevices for ManualDevices {
    async fn get_user_media(&self, constraints: &StreamConstraints) -> Result<MediaStream, DeviceError> {
        self.shared.acquisitions.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.shared.failures.lock().pop_front() {
            return Err(error);
        }

        let stream = match self.layout {
            TrackLayout::Whole => MediaStream::new(
                self.sample_rate,
                constraints.channel_count,
                super::stream::StreamTracks::Whole(self.counted_track()),
            ),
            TrackLayout::Tracks(n) => MediaStream::with_tracks(
                self.sample_rate,
                constraints.channel_count,
                (0..n).map(|_| self.counted_track()).collect(),
            ),
        };
        Ok(stream)
    }
}
