use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::session::RecorderOptions;

/// Application configuration for the `stream-recorder` binary
///
/// Loaded from an optional file plus `STREAM_RECORDER__<SECTION>__<KEY>`
/// environment overrides, e.g. `STREAM_RECORDER__RECORDER__STREAM_PAGES=true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderSection,
    pub capture: CaptureConfig,
    pub output: OutputConfig,
}

/// Session options, snake_case so they survive key normalization
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecorderSection {
    pub buffer_length: Option<usize>,
    pub monitor_gain: Option<f32>,
    pub number_of_channels: Option<u16>,
    pub encoder_sample_rate: Option<u32>,
    pub encoder_path: Option<String>,
    pub stream_pages: Option<bool>,
    pub leave_stream_open: Option<bool>,
    pub max_buffers_per_page: Option<usize>,
    pub encoder_application: Option<u32>,
    pub encoder_frame_size: Option<u32>,
    pub resample_quality: Option<u8>,
    pub bit_rate: Option<u32>,
    /// Keys not listed above, handed to the encoder unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<RecorderSection> for RecorderOptions {
    fn from(section: RecorderSection) -> Self {
        Self {
            buffer_length: section.buffer_length,
            monitor_gain: section.monitor_gain,
            number_of_channels: section.number_of_channels,
            encoder_sample_rate: section.encoder_sample_rate,
            encoder_path: section.encoder_path,
            stream_pages: section.stream_pages,
            leave_stream_open: section.leave_stream_open,
            max_buffers_per_page: section.max_buffers_per_page,
            encoder_application: section.encoder_application,
            encoder_frame_size: section.encoder_frame_size,
            resample_quality: section.resample_quality,
            bit_rate: section.bit_rate,
            extra: section.extra,
        }
    }
}

/// Where captured audio comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Synthetic sine tone
    #[default]
    Tone,
    /// Replay of a WAV file
    File,
    /// Default input device (requires the `cpal` feature)
    Device,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    pub duration_secs: u64,
    /// Device rate for the tone source
    pub sample_rate: u32,
    pub tone_frequency: f64,
    /// Input for the file source
    pub file: Option<PathBuf>,
    /// Pace file playback at its sample rate
    pub realtime: bool,
    /// Input device name for the device source; the default device if unset
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureSource::Tone,
            duration_secs: 5,
            sample_rate: 48000,
            tone_frequency: 440.0,
            file: None,
            realtime: true,
            device: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pages are concatenated here; a `.wav` path gets a WAV header
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("recording.pcm"),
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("STREAM_RECORDER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
