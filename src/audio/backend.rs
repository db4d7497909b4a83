use crate::error::GraphError;

use super::stream::MediaStream;

/// One block delivered by the buffer-callback node
///
/// Samples are planar `f32` in `[-1.0, 1.0]`: `channels[c][i]` is frame `i`
/// of channel `c`. Every channel has the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Build from per-channel sample vectors
    ///
    /// Shorter channels are padded with silence to the longest one.
    pub fn new(mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        Self { channels }
    }

    pub fn silent(channels: u16, frames: usize) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channels as usize],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

/// Receives each buffer from the buffer-callback node
///
/// Runs on the audio callback cadence, so it must return quickly and never
/// block.
pub type BufferHandler = Box<dyn FnMut(SampleBuffer) + Send>;

/// Shape of the graph a session asks its host for
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Frames per buffer-callback invocation
    pub buffer_length: usize,
    /// Channels per buffer
    pub number_of_channels: u16,
    /// Initial gain of the monitor path
    pub monitor_gain: f32,
}

/// Audio-processing capability: builds capture graphs
///
/// A graph is `source → monitor gain → destination` plus
/// `source → buffer-callback node → destination`.
pub trait AudioHost: Send + Sync {
    fn create_graph(&self, config: &GraphConfig) -> Result<Box<dyn AudioGraph>, GraphError>;
}

/// A capture graph owned by one session
pub trait AudioGraph: Send {
    /// Rate the graph runs at; this is the rate of every delivered buffer
    fn sample_rate(&self) -> u32;

    fn monitor_gain(&self) -> f32;

    fn set_monitor_gain(&mut self, gain: f32);

    /// Feed `stream` into the monitor path and the buffer-callback node.
    /// Replaces any previously attached source.
    fn attach_source(&mut self, stream: &MediaStream) -> Result<(), GraphError>;

    /// Connect the buffer-callback node to the destination. Buffers start
    /// flowing to `handler` on the host's cadence.
    fn connect(&mut self, handler: BufferHandler) -> Result<(), GraphError>;

    /// Disconnect every node. Once this returns, the handler passed to
    /// `connect` is not called again.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}
