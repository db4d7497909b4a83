//! Codec boundary used by the page worker.
//!
//! The perceptual codec itself lives outside this crate. A [`Codec`] turns
//! planar `f32` capture buffers into encoded bytes; the worker decides where
//! page boundaries fall. [`PcmCodec`] is the reference implementation: it
//! resamples to the encoder rate and emits interleaved 16-bit little-endian
//! PCM.

use std::sync::Arc;

use crate::error::EncoderError;
use crate::session::RecorderConfig;

/// Parameters derived from the `configure` message.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecParams {
    /// Rate the capture graph delivers samples at.
    pub input_sample_rate: u32,
    /// Rate the encoded output should have.
    pub output_sample_rate: u32,
    pub channels: u16,
    pub application: u32,
    pub frame_size_ms: u32,
    pub bit_rate: Option<u32>,
    pub resample_quality: u8,
}

impl CodecParams {
    pub fn from_config(config: &RecorderConfig, original_sample_rate: u32) -> Self {
        Self {
            input_sample_rate: original_sample_rate,
            output_sample_rate: config.encoder_sample_rate,
            channels: config.number_of_channels,
            application: config.encoder_application,
            frame_size_ms: config.encoder_frame_size,
            bit_rate: config.bit_rate,
            resample_quality: config.resample_quality,
        }
    }
}

/// An encoder running inside the background task.
pub trait Codec: Send {
    /// Prepares the codec. Called once, before any `encode`.
    fn configure(&mut self, params: &CodecParams) -> Result<(), EncoderError>;

    /// Encodes one capture buffer (one `Vec` per channel) and returns the
    /// bytes produced so far. May return an empty `Vec` while the codec
    /// accumulates a full frame.
    fn encode(&mut self, buffers: &[Vec<f32>]) -> Result<Vec<u8>, EncoderError>;

    /// Drains any internally buffered samples at end of stream.
    fn finish(&mut self) -> Result<Vec<u8>, EncoderError> {
        Ok(Vec::new())
    }
}

/// Builds a fresh codec for each encoder task.
pub type CodecFactory = Arc<dyn Fn() -> Box<dyn Codec> + Send + Sync>;

/// Creates a [`CodecFactory`] from a closure.
pub fn codec_factory<F>(f: F) -> CodecFactory
where
    F: Fn() -> Box<dyn Codec> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Interleaved 16-bit little-endian PCM at the encoder sample rate.
///
/// Resampling is linear interpolation. The last frame of each buffer is
/// carried into the next one, so an output sample that falls between two
/// buffers is interpolated from both.
#[derive(Debug, Default)]
pub struct PcmCodec {
    params: Option<CodecParams>,
    /// Input frames consumed per output frame
    step: f64,
    /// Read position in the carried frame followed by the next buffer
    position: f64,
    /// Last frame of the previous buffer, one sample per channel
    carry: Option<Vec<f32>>,
}

impl PcmCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame `index` of the carried frame followed by `buffers`
    fn sample_at(&self, buffers: &[Vec<f32>], channel: usize, index: usize) -> f32 {
        let index = match (&self.carry, index) {
            (Some(carry), 0) => return carry.get(channel).copied().unwrap_or(0.0),
            (Some(_), i) => i - 1,
            (None, i) => i,
        };
        buffers
            .get(channel)
            .or_else(|| buffers.first())
            .and_then(|b| b.get(index))
            .copied()
            .unwrap_or(0.0)
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl Codec for PcmCodec {
    fn configure(&mut self, params: &CodecParams) -> Result<(), EncoderError> {
        if params.input_sample_rate == 0 || params.output_sample_rate == 0 {
            return Err(EncoderError::codec("sample rates must be non-zero"));
        }
        if params.channels == 0 {
            return Err(EncoderError::codec("channel count must be non-zero"));
        }

        self.step = params.input_sample_rate as f64 / params.output_sample_rate as f64;
        self.position = 0.0;
        self.carry = None;
        self.params = Some(params.clone());
        Ok(())
    }

    fn encode(&mut self, buffers: &[Vec<f32>]) -> Result<Vec<u8>, EncoderError> {
        let channels = match &self.params {
            Some(params) => params.channels as usize,
            None => return Err(EncoderError::codec("codec used before configure")),
        };
        let frames = buffers.first().map_or(0, Vec::len);
        if frames == 0 {
            return Ok(Vec::new());
        }

        let len = frames + usize::from(self.carry.is_some());
        let last = (len - 1) as f64;

        let mut out = Vec::new();
        // Positions past the last frame need the next buffer
        while self.position <= last {
            let base = self.position.floor();
            let frac = (self.position - base) as f32;
            let index = base as usize;

            for channel in 0..channels {
                let a = self.sample_at(buffers, channel, index);
                let value = if frac > 0.0 {
                    let b = self.sample_at(buffers, channel, index + 1);
                    a + (b - a) * frac
                } else {
                    a
                };
                out.extend_from_slice(&to_i16(value).to_le_bytes());
            }

            self.position += self.step;
        }

        // The last frame becomes index 0 of the next call
        self.position -= last;
        let carry: Vec<f32> = (0..channels)
            .map(|channel| self.sample_at(buffers, channel, len - 1))
            .collect();
        self.carry = Some(carry);

        Ok(out)
    }
}
