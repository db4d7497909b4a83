//! Synthetic input device producing a sine tone.
//!
//! Frames are generated in small blocks on a tokio interval so they arrive
//! at roughly the real-time rate, like a hardware device would deliver them.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::stream::{MediaDevices, MediaStream, SampleTap, StreamConstraints};
use crate::error::DeviceError;

/// Generates a sine wave, continuing phase across calls.
#[derive(Debug, Clone)]
pub struct SineGenerator {
    sample_rate: u32,
    channels: u16,
    frequency: f64,
    amplitude: f32,
    frame_index: u64,
}

impl SineGenerator {
    pub fn new(sample_rate: u32, channels: u16, frequency: f64, amplitude: f32) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            frequency,
            amplitude,
            frame_index: 0,
        }
    }

    /// Next `frames` frames, interleaved, same value on every channel.
    pub fn next_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * self.channels as usize);
        let sample_rate = f64::from(self.sample_rate);

        for _ in 0..frames {
            let t = self.frame_index as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * self.frequency * t).sin() as f32 * self.amplitude;
            for _ in 0..self.channels {
                out.push(value);
            }
            self.frame_index += 1;
        }

        out
    }
}

/// [`MediaDevices`] whose streams carry a generated tone.
#[derive(Debug, Clone)]
pub struct ToneDevices {
    sample_rate: u32,
    frequency: f64,
    amplitude: f32,
    block: Duration,
}

impl ToneDevices {
    pub fn new(sample_rate: u32, frequency: f64) -> Self {
        Self {
            sample_rate,
            frequency,
            amplitude: 0.5,
            block: Duration::from_millis(10),
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Interval between pushed blocks.
    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block.max(Duration::from_millis(1));
        self
    }
}

#[async_trait]
impl MediaDevices for ToneDevices {
    async fn get_user_media(&self, constraints: &StreamConstraints) -> Result<MediaStream, DeviceError> {
        if self.sample_rate == 0 {
            return Err(DeviceError::Unsupported("sample rate must be non-zero".to_string()));
        }

        let channels = constraints.channel_count.max(1);
        let frames_per_block =
            ((u64::from(self.sample_rate) * self.block.as_millis() as u64) / 1000).max(1) as usize;
        let mut generator = SineGenerator::new(self.sample_rate, channels, self.frequency, self.amplitude);

        let tap = SampleTap::new();
        let feed = tap.clone();
        let period = self.block;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                feed.push(&generator.next_frames(frames_per_block));
            }
        });

        info!(
            "Tone device opened: {:.0}Hz at {}Hz, {} channels",
            self.frequency, self.sample_rate, channels
        );

        let stream = MediaStream::with_stop(self.sample_rate, channels, move || task.abort());
        Ok(stream.with_tap(tap))
    }
}
