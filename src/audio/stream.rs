//! Device streams and the capability that acquires them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::DeviceError;

/// A handle whose `stop` releases part (or all) of a device stream.
pub trait MediaTrack: Send {
    fn stop(&mut self);
}

impl<F> MediaTrack for F
where
    F: FnMut() + Send,
{
    fn stop(&mut self) {
        self()
    }
}

/// How an acquired stream is released.
pub enum StreamTracks {
    /// The stream is stopped as a whole.
    Whole(Box<dyn MediaTrack>),
    /// The stream is a set of tracks, each stopped independently.
    Tracks(Vec<Box<dyn MediaTrack>>),
}

impl StreamTracks {
    pub fn len(&self) -> usize {
        match self {
            Self::Whole(_) => 1,
            Self::Tracks(tracks) => tracks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receives interleaved `f32` frames pushed by a device.
pub type FrameSink = Box<dyn FnMut(&[f32]) + Send>;

/// Connection point between a device and the graph consuming it.
///
/// The device pushes interleaved frames; whoever holds a sink receives
/// them. With no sink installed, frames are discarded.
#[derive(Clone, Default)]
pub struct SampleTap {
    sink: Arc<Mutex<Option<FrameSink>>>,
}

impl SampleTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver frames to the current sink. Returns whether anyone received them.
    pub fn push(&self, interleaved: &[f32]) -> bool {
        match self.sink.lock().as_mut() {
            Some(sink) => {
                sink(interleaved);
                true
            }
            None => false,
        }
    }

    pub fn set_sink(&self, sink: FrameSink) {
        *self.sink.lock() = Some(sink);
    }

    pub fn clear_sink(&self) {
        self.sink.lock().take();
    }

    pub fn has_sink(&self) -> bool {
        self.sink.lock().is_some()
    }
}

/// An acquired input device stream.
///
/// Exclusively owned by whoever acquired it. [`MediaStream::stop`] consumes
/// the stream, so every track is stopped exactly once.
pub struct MediaStream {
    id: String,
    sample_rate: u32,
    channels: u16,
    tracks: StreamTracks,
    tap: SampleTap,
}

impl MediaStream {
    pub fn new(sample_rate: u32, channels: u16, tracks: StreamTracks) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sample_rate,
            channels,
            tracks,
            tap: SampleTap::new(),
        }
    }

    /// A stream released through a single stop handle.
    pub fn with_stop(sample_rate: u32, channels: u16, stop: impl MediaTrack + 'static) -> Self {
        Self::new(sample_rate, channels, StreamTracks::Whole(Box::new(stop)))
    }

    /// A stream made of independently stopped tracks.
    pub fn with_tracks(sample_rate: u32, channels: u16, tracks: Vec<Box<dyn MediaTrack>>) -> Self {
        Self::new(sample_rate, channels, StreamTracks::Tracks(tracks))
    }

    /// Use `tap` instead of a fresh one, for devices that already push into it.
    pub fn with_tap(mut self, tap: SampleTap) -> Self {
        self.tap = tap;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn tap(&self) -> &SampleTap {
        &self.tap
    }

    /// Stop every track and disconnect the tap. Returns the number of tracks stopped.
    pub fn stop(self) -> usize {
        self.tap.clear_sink();
        match self.tracks {
            StreamTracks::Whole(mut stop) => {
                stop.stop();
                1
            }
            StreamTracks::Tracks(tracks) => {
                let count = tracks.len();
                for mut track in tracks {
                    track.stop();
                }
                count
            }
        }
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// What the session asks the device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub channel_count: u16,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self { channel_count: 1 }
    }
}

/// Device-acquisition capability.
///
/// Implementations:
/// - [`ManualDevices`](super::ManualDevices): scripted, for tests
/// - [`ToneDevices`](super::ToneDevices): synthetic sine input
/// - [`FileDevices`](super::FileDevices): replays a WAV file
/// - `CpalDevices` (feature `cpal`): the default input device
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a new input stream.
    async fn get_user_media(&self, constraints: &StreamConstraints) -> Result<MediaStream, DeviceError>;
}
