//! Host-agnostic buffer-callback graph.
//!
//! [`ProcessorGraph`] installs itself as the sink of the attached stream's
//! [`SampleTap`](super::SampleTap), accumulates interleaved device frames and
//! hands the session one fixed-size [`SampleBuffer`] per `buffer_length`
//! frames. It works with any device that pushes into a tap (tone, file,
//! CPAL).
//!
//! There is no playback destination here: the monitor gain is tracked so it
//! can be queried, but monitored audio is not rendered.

use tracing::debug;

use super::backend::{AudioGraph, AudioHost, BufferHandler, GraphConfig, SampleBuffer};
use super::stream::{MediaStream, SampleTap};
use crate::error::GraphError;

/// Graph rate reported before any source is attached
pub const DEFAULT_CONTEXT_SAMPLE_RATE: u32 = 48000;

/// [`AudioHost`] producing [`ProcessorGraph`]s
#[derive(Debug, Clone, Default)]
pub struct ProcessorHost;

impl ProcessorHost {
    pub fn new() -> Self {
        Self
    }
}

impl AudioHost for ProcessorHost {
    fn create_graph(&self, config: &GraphConfig) -> Result<Box<dyn AudioGraph>, GraphError> {
        if config.buffer_length == 0 || config.number_of_channels == 0 {
            return Err(GraphError::Backend(
                "buffer length and channel count must be non-zero".to_string(),
            ));
        }
        Ok(Box::new(ProcessorGraph::new(config.clone())))
    }
}

struct Source {
    tap: SampleTap,
    sample_rate: u32,
    channels: u16,
}

pub struct ProcessorGraph {
    config: GraphConfig,
    monitor_gain: f32,
    source: Option<Source>,
    connected: bool,
}

impl ProcessorGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            monitor_gain: config.monitor_gain,
            config,
            source: None,
            connected: false,
        }
    }
}

/// Regroups interleaved device frames into planar blocks of `buffer_length`
struct Blocker {
    buffer_length: usize,
    output_channels: usize,
    input_channels: usize,
    block: Vec<Vec<f32>>,
}

impl Blocker {
    fn new(buffer_length: usize, output_channels: u16, input_channels: u16) -> Self {
        let output_channels = output_channels as usize;
        Self {
            buffer_length,
            output_channels,
            input_channels: input_channels.max(1) as usize,
            block: vec![Vec::with_capacity(buffer_length); output_channels],
        }
    }

    /// Feed frames; `emit` runs once per completed block
    fn push(&mut self, interleaved: &[f32], emit: &mut dyn FnMut(SampleBuffer)) {
        for frame in interleaved.chunks_exact(self.input_channels) {
            // Missing output channels repeat the last input channel
            for (c, channel) in self.block.iter_mut().enumerate() {
                channel.push(frame[c.min(frame.len() - 1)]);
            }

            if self.block[0].len() == self.buffer_length {
                let full = std::mem::replace(
                    &mut self.block,
                    vec![Vec::with_capacity(self.buffer_length); self.output_channels],
                );
                emit(SampleBuffer::new(full));
            }
        }
    }
}

impl AudioGraph for ProcessorGraph {
    fn sample_rate(&self) -> u32 {
        self.source
            .as_ref()
            .map_or(DEFAULT_CONTEXT_SAMPLE_RATE, |s| s.sample_rate)
    }

    fn monitor_gain(&self) -> f32 {
        self.monitor_gain
    }

    fn set_monitor_gain(&mut self, gain: f32) {
        self.monitor_gain = gain;
    }

    fn attach_source(&mut self, stream: &MediaStream) -> Result<(), GraphError> {
        if self.connected {
            self.disconnect();
        }

        debug!(
            "Attaching stream {} ({}Hz, {} channels)",
            stream.id(),
            stream.sample_rate(),
            stream.channels()
        );

        self.source = Some(Source {
            tap: stream.tap().clone(),
            sample_rate: stream.sample_rate(),
            channels: stream.channels(),
        });
        Ok(())
    }

    fn connect(&mut self, mut handler: BufferHandler) -> Result<(), GraphError> {
        if self.connected {
            return Err(GraphError::AlreadyConnected);
        }
        let source = self.source.as_ref().ok_or(GraphError::NoSource)?;

        let mut blocker = Blocker::new(
            self.config.buffer_length,
            self.config.number_of_channels,
            source.channels,
        );
        source.tap.set_sink(Box::new(move |frames: &[f32]| {
            blocker.push(frames, &mut |buffer| handler(buffer));
        }));

        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(source) = &self.source {
            source.tap.clear_sink();
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Drop for ProcessorGraph {
    fn drop(&mut self) {
        self.disconnect();
    }
}
