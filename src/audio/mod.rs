pub mod backend;
pub mod file;
pub mod manual;
pub mod processor;
pub mod stream;
pub mod tone;

#[cfg(feature = "cpal")]
pub mod cpal_device;

pub use backend::{AudioGraph, AudioHost, BufferHandler, GraphConfig, SampleBuffer};
pub use file::{AudioFile, FileDevices};
pub use manual::{ManualDevices, ManualHost, TrackLayout};
pub use processor::{ProcessorGraph, ProcessorHost, DEFAULT_CONTEXT_SAMPLE_RATE};
pub use stream::{FrameSink, MediaDevices, MediaStream, MediaTrack, SampleTap, StreamConstraints, StreamTracks};
pub use tone::{SineGenerator, ToneDevices};

#[cfg(feature = "cpal")]
pub use cpal_device::CpalDevices;
