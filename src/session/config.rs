use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecorderError;

/// Encoder path registered by default with [`TaskSpawner`](crate::encoder::TaskSpawner)
pub const DEFAULT_ENCODER_PATH: &str = "encoderWorker.min.js";

/// Configuration snapshot for a recording session
///
/// Built once from [`RecorderOptions`] when the session is constructed and
/// never changed afterwards. Serialized with the camelCase keys the encoder
/// task expects; keys this crate does not know are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderConfig {
    /// Samples per channel delivered by each capture callback
    pub buffer_length: usize,

    /// Gain on the live monitor path (0 = muted)
    pub monitor_gain: f32,

    /// Number of capture channels
    pub number_of_channels: u16,

    /// Sample rate handed to the encoder
    pub encoder_sample_rate: u32,

    /// Location of the background encode task
    pub encoder_path: String,

    /// Emit pages as they are produced instead of holding them until the end
    pub stream_pages: bool,

    /// Keep the device stream open after stop
    pub leave_stream_open: bool,

    /// Raw buffers accumulated by the encoder per page
    pub max_buffers_per_page: usize,

    /// Codec application mode (2048 = VoIP, 2049 = audio, 2051 = low delay)
    pub encoder_application: u32,

    /// Codec frame duration in milliseconds
    pub encoder_frame_size: u32,

    /// Resampler quality, 0 (fastest) to 10 (best)
    pub resample_quality: u8,

    /// Target bit rate override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,

    /// Unrecognized options, passed through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer_length: 4096,
            monitor_gain: 0.0,
            number_of_channels: 1,
            encoder_sample_rate: 48000,
            encoder_path: DEFAULT_ENCODER_PATH.to_string(),
            stream_pages: false,
            leave_stream_open: false,
            max_buffers_per_page: 40,
            encoder_application: 2049,
            encoder_frame_size: 20,
            resample_quality: 3,
            bit_rate: None,
            extra: Map::new(),
        }
    }
}

impl RecorderConfig {
    /// Merge caller overrides over the defaults
    pub fn from_options(options: RecorderOptions) -> Self {
        let defaults = Self::default();

        Self {
            buffer_length: options.buffer_length.unwrap_or(defaults.buffer_length),
            monitor_gain: options.monitor_gain.unwrap_or(defaults.monitor_gain),
            number_of_channels: options
                .number_of_channels
                .unwrap_or(defaults.number_of_channels),
            encoder_sample_rate: options
                .encoder_sample_rate
                .unwrap_or(defaults.encoder_sample_rate),
            encoder_path: options.encoder_path.unwrap_or(defaults.encoder_path),
            stream_pages: options.stream_pages.unwrap_or(defaults.stream_pages),
            leave_stream_open: options
                .leave_stream_open
                .unwrap_or(defaults.leave_stream_open),
            max_buffers_per_page: options
                .max_buffers_per_page
                .unwrap_or(defaults.max_buffers_per_page),
            encoder_application: options
                .encoder_application
                .unwrap_or(defaults.encoder_application),
            encoder_frame_size: options
                .encoder_frame_size
                .unwrap_or(defaults.encoder_frame_size),
            resample_quality: options.resample_quality.unwrap_or(defaults.resample_quality),
            bit_rate: options.bit_rate,
            extra: options.extra,
        }
    }

    /// Reject values the capture and paging protocol cannot work with
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.buffer_length == 0 {
            return Err(RecorderError::InvalidConfig(
                "bufferLength must be greater than zero".to_string(),
            ));
        }
        if self.number_of_channels == 0 {
            return Err(RecorderError::InvalidConfig(
                "numberOfChannels must be greater than zero".to_string(),
            ));
        }
        if self.max_buffers_per_page == 0 {
            return Err(RecorderError::InvalidConfig(
                "maxBuffersPerPage must be greater than zero".to_string(),
            ));
        }
        if self.encoder_sample_rate == 0 {
            return Err(RecorderError::InvalidConfig(
                "encoderSampleRate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caller overrides for [`RecorderConfig`]
///
/// Every field is optional; omitted fields take their defaults when merged.
/// Deserializes from the same camelCase keys, so an options object can come
/// straight from JSON or a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderOptions {
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
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecorderOptions {
    /// Parse options from a JSON object
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

impl From<RecorderOptions> for RecorderConfig {
    fn from(options: RecorderOptions) -> Self {
        Self::from_options(options)
    }
}

impl From<RecorderConfig> for RecorderOptions {
    fn from(config: RecorderConfig) -> Self {
        Self {
            buffer_length: Some(config.buffer_length),
            monitor_gain: Some(config.monitor_gain),
            number_of_channels: Some(config.number_of_channels),
            encoder_sample_rate: Some(config.encoder_sample_rate),
            encoder_path: Some(config.encoder_path),
            stream_pages: Some(config.stream_pages),
            leave_stream_open: Some(config.leave_stream_open),
            max_buffers_per_page: Some(config.max_buffers_per_page),
            encoder_application: Some(config.encoder_application),
            encoder_frame_size: Some(config.encoder_frame_size),
            resample_quality: Some(config.resample_quality),
            bit_rate: config.bit_rate,
            extra: config.extra,
        }
    }
}
