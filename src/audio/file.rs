use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use tracing::{info, warn};

use super::stream::{MediaDevices, MediaStream, SampleTap, StreamConstraints};
use crate::error::DeviceError;

/// A WAV file decoded to interleaved `f32` samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// [`MediaDevices`] that replays a WAV file as if it were a live input
///
/// Each acquisition reads the file again. Playback holds while nothing is
/// listening on the stream's tap, so no audio is lost between acquisition and
/// `start`. In real-time mode blocks are paced by the file's sample rate;
/// otherwise they are pushed as fast as the runtime allows. When the file
/// runs out the device goes silent.
#[derive(Debug, Clone)]
pub struct FileDevices {
    path: PathBuf,
    realtime: bool,
    block: Duration,
}

impl FileDevices {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            realtime: true,
            block: Duration::from_millis(10),
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

#[async_trait]
impl MediaDevices for FileDevices {
    async fn get_user_media(&self, _constraints: &StreamConstraints) -> Result<MediaStream, DeviceError> {
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| DeviceError::backend(e.to_string()))?
            .map_err(|e| {
                warn!("File device unavailable: {:#}", e);
                DeviceError::NotFound
            })?;

        let channels = file.channels.max(1);
        let frames_per_block =
            ((u64::from(file.sample_rate) * self.block.as_millis() as u64) / 1000).max(1) as usize;
        let block_len = frames_per_block * channels as usize;

        let tap = SampleTap::new();
        let feed = tap.clone();
        let realtime = self.realtime;
        let period = self.block;
        let samples = file.samples;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            for block in samples.chunks(block_len) {
                while !feed.has_sink() {
                    tokio::time::sleep(period).await;
                }
                if realtime {
                    ticker.tick().await;
                } else {
                    tokio::task::yield_now().await;
                }
                feed.push(block);
            }
            info!("File device reached end of input");
        });

        Ok(MediaStream::with_stop(file.sample_rate, channels, move || task.abort()).with_tap(tap))
    }
}
