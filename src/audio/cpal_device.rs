//! Default input device through CPAL.
//!
//! CPAL streams are not `Send` on every platform, so each acquisition owns a
//! dedicated thread that builds the stream, plays it and keeps it alive until
//! the stream's stop handle fires.

use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tokio::sync::oneshot;
use tracing::{error, info};

use super::stream::{MediaDevices, MediaStream, SampleTap, StreamConstraints};
use crate::error::DeviceError;

/// [`MediaDevices`] backed by the host's default input device.
#[derive(Debug, Clone, Default)]
pub struct CpalDevices {
    device_name: Option<String>,
}

impl CpalDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture from the input device with this name instead of the default.
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }
}

fn open_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(DeviceError::NotFound),
        Some(name) => host
            .input_devices()
            .map_err(|e| DeviceError::backend(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or(DeviceError::NotFound),
    }
}

fn build_stream(device: &cpal::Device, tap: SampleTap) -> Result<(cpal::Stream, u32, u16), DeviceError> {
    let supported = device.default_input_config().map_err(|e| DeviceError::backend(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let on_error = |err: cpal::StreamError| error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                tap.push(data);
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => {
            let mut scratch = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(data.iter().map(|&s| f32::from(s) / 32768.0));
                    tap.push(&scratch);
                },
                on_error,
                None,
            )
        }
        format => return Err(DeviceError::Unsupported(format!("sample format {format:?}"))),
    }
    .map_err(|e| DeviceError::backend(e.to_string()))?;

    stream.play().map_err(|e| DeviceError::backend(e.to_string()))?;
    Ok((stream, config.sample_rate.0, config.channels))
}

#[async_trait]
impl MediaDevices for CpalDevices {
    async fn get_user_media(&self, _constraints: &StreamConstraints) -> Result<MediaStream, DeviceError> {
        let tap = SampleTap::new();
        let feed = tap.clone();
        let name = self.device_name.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("cpal-capture".to_string())
            .spawn(move || {
                let opened = open_device(name.as_deref()).and_then(|device| {
                    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
                    build_stream(&device, feed).map(|built| (device_name, built))
                });
                match opened {
                    Ok((device_name, (stream, sample_rate, channels))) => {
                        info!(
                            "Capturing from {}: {}Hz, {} channels",
                            device_name, sample_rate, channels
                        );
                        let _ = ready_tx.send(Ok((sample_rate, channels)));
                        // Blocks until the stop handle fires or is dropped
                        let _ = stop_rx.recv();
                        drop(stream);
                        info!("Capture from {} stopped", device_name);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| DeviceError::backend(e.to_string()))?;

        let (sample_rate, channels) = ready_rx
            .await
            .map_err(|_| DeviceError::backend("capture thread exited"))??;

        let stream = MediaStream::with_stop(sample_rate, channels, move || {
            let _ = stop_tx.send(());
        });
        Ok(stream.with_tap(tap))
    }
}
