use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::config::{RecorderConfig, RecorderOptions};
use super::state::RecordingState;
use super::stats::SessionStats;
use super::stream_manager::DeviceStreamManager;
use crate::audio::{AudioGraph, BufferHandler, GraphConfig, MediaStream, SampleBuffer, StreamConstraints};
use crate::capability::{is_recording_supported, Host};
use crate::encoder::{EncoderCommand, EncoderReply, EncoderSender, EncoderSpawner};
use crate::error::{ErrorDetail, RecorderError};
use crate::events::{EventKind, EventTarget, Listener, ListenerOptions, RecorderEvent};

/// How long `start` waits for the previous encoder to deliver its last page
const PREVIOUS_ENCODER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Counters {
    buffers_sent: AtomicUsize,
    pages_received: AtomicUsize,
}

/// A recording session: device stream, capture graph and encoder hand-off
///
/// Construct with [`Session::new`], then drive with [`start`](Self::start)
/// and [`stop`](Self::stop). Everything observable happens through events
/// on the session's [`EventTarget`].
pub struct Session {
    id: String,
    config: RecorderConfig,
    state: RecordingState,
    events: Arc<dyn EventTarget>,
    streams: DeviceStreamManager,
    graph: Box<dyn AudioGraph>,
    encoders: Arc<dyn EncoderSpawner>,

    /// Present between `start` and `stop`
    encoder: Option<EncoderSender>,

    /// Reply pump of the latest recording; runs on after `stop` until the
    /// encoder is done
    pump: Option<JoinHandle<()>>,

    /// Whether the buffer handler forwards to the encoder
    recording: Arc<AtomicBool>,

    counters: Arc<Counters>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create an inactive session
    ///
    /// Fails with [`RecorderError::Unsupported`] when `host` lacks a required
    /// capability, before anything else is touched.
    pub fn new(host: &Host, options: impl Into<RecorderOptions>) -> Result<Self, RecorderError> {
        if !is_recording_supported(host) {
            warn!(
                "Recording unsupported, host lacks: {}",
                host.missing_capabilities().join(", ")
            );
            return Err(RecorderError::Unsupported);
        }
        let (Some(audio), Some(devices), Some(encoders)) =
            (&host.audio, &host.devices, &host.encoders)
        else {
            return Err(RecorderError::Unsupported);
        };

        let config = RecorderConfig::from_options(options.into());
        config.validate()?;

        let graph = audio.create_graph(&GraphConfig {
            buffer_length: config.buffer_length,
            number_of_channels: config.number_of_channels,
            monitor_gain: config.monitor_gain,
        })?;

        let streams = DeviceStreamManager::new(
            devices.clone(),
            StreamConstraints {
                channel_count: config.number_of_channels,
            },
        );

        let id = uuid::Uuid::new_v4().to_string();
        info!(
            "Created session {}: {} channels, {} frames/buffer, encoder {}",
            id, config.number_of_channels, config.buffer_length, config.encoder_path
        );

        Ok(Self {
            id,
            config,
            state: RecordingState::Inactive,
            events: host.event_target(),
            streams,
            graph,
            encoders: encoders.clone(),
            encoder: None,
            pump: None,
            recording: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            started_at: None,
            stopped_at: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// The cached device stream, if one is held
    pub fn stream(&self) -> Option<&MediaStream> {
        self.streams.stream()
    }

    pub fn monitor_gain(&self) -> f32 {
        self.graph.monitor_gain()
    }

    /// Change the monitor path gain while the session runs
    pub fn set_monitor_gain(&mut self, gain: f32) {
        debug!("Monitor gain {} -> {}", self.graph.monitor_gain(), gain);
        self.graph.set_monitor_gain(gain);
    }

    pub fn stats(&self) -> SessionStats {
        let end = self.stopped_at.unwrap_or_else(Utc::now);
        let duration_secs = self
            .started_at
            .map(|t| (end - t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            session_id: self.id.clone(),
            state: self.state,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            duration_secs,
            buffers_sent: self.counters.buffers_sent.load(Ordering::Relaxed),
            pages_received: self.counters.pages_received.load(Ordering::Relaxed),
            stream_acquisitions: self.streams.acquisitions(),
        }
    }

    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) {
        self.events.add_event_listener(kind, listener, None);
    }

    pub fn add_event_listener_with_options(
        &self,
        kind: EventKind,
        listener: Listener,
        options: ListenerOptions,
    ) {
        self.events.add_event_listener(kind, listener, Some(options));
    }

    pub fn remove_event_listener(&self, kind: EventKind, listener: &Listener) {
        self.events.remove_event_listener(kind, listener, None);
    }

    pub fn remove_event_listener_with_options(
        &self,
        kind: EventKind,
        listener: &Listener,
        options: ListenerOptions,
    ) {
        self.events.remove_event_listener(kind, listener, Some(options));
    }

    /// Make sure a device stream is available
    ///
    /// Acquires the stream on first use and attaches it to the capture graph;
    /// later calls reuse it. Emits `streamReady` on success either way. On
    /// failure emits `error` and returns false; the state is not touched.
    pub async fn init_stream(&mut self) -> bool {
        let attached = match self.streams.ensure().await {
            Ok((stream, true)) => self.graph.attach_source(stream),
            Ok((_, false)) => {
                debug!("Reusing input stream");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to acquire input stream: {}", e);
                self.events
                    .dispatch_event(RecorderEvent::Error(ErrorDetail::StreamAcquisition(
                        e.to_string(),
                    )));
                return false;
            }
        };

        if let Err(e) = attached {
            warn!("Failed to attach input stream to the graph: {}", e);
            self.streams.release();
            self.events
                .dispatch_event(RecorderEvent::Error(ErrorDetail::Graph(e.to_string())));
            return false;
        }

        self.events.dispatch_event(RecorderEvent::StreamReady);
        true
    }

    /// Release the cached device stream. Does nothing when none is held.
    ///
    /// Refused while recording or paused: the capture graph is fed by that
    /// stream until `stop`.
    pub fn clear_stream(&mut self) {
        if self.state.is_active() {
            warn!("Ignoring clear_stream while {}; stop first", self.state);
            return;
        }
        self.streams.release();
    }

    /// Begin recording
    ///
    /// Only acts while inactive. Waits for the previous recording's `stop`
    /// if its encoder is still finishing. Acquires a stream if none is
    /// cached, spawns the encoder, sends the configuration as its first
    /// message and connects the capture graph. Failures are reported as
    /// `error` events and leave the session inactive.
    pub async fn start(&mut self) {
        if self.state != RecordingState::Inactive {
            debug!("Ignoring start while {}", self.state);
            return;
        }

        self.finish_previous().await;

        if !self.streams.is_acquired() && !self.init_stream().await {
            return;
        }

        let path = self.config.encoder_path.clone();
        let mut channel = match self.encoders.spawn(&path) {
            Ok(channel) => channel,
            Err(e) => {
                error!("Failed to spawn encoder {}: {}", path, e);
                self.events
                    .dispatch_event(RecorderEvent::Error(ErrorDetail::EncoderSpawn {
                        path,
                        reason: e.to_string(),
                    }));
                return;
            }
        };

        let Some(replies) = channel.take_replies() else {
            self.events
                .dispatch_event(RecorderEvent::Error(ErrorDetail::Encoder(
                    "encoder reply stream already taken".to_string(),
                )));
            return;
        };
        let pump = tokio::spawn(pump_replies(
            replies,
            self.events.clone(),
            self.counters.clone(),
        ));

        let sender = channel.sender();
        let configure = EncoderCommand::Configure {
            config: self.config.clone(),
            original_sample_rate: self.graph.sample_rate(),
        };
        if let Err(e) = sender.send(configure) {
            error!("Encoder {} went away before configure: {}", path, e);
            pump.abort();
            self.events
                .dispatch_event(RecorderEvent::Error(ErrorDetail::Encoder(e.to_string())));
            return;
        }

        // Configure is queued, so the first buffer can be forwarded as soon
        // as the node is connected
        self.recording.store(true, Ordering::Release);
        if let Err(e) = self.graph.connect(buffer_handler(
            sender.clone(),
            self.recording.clone(),
            self.counters.clone(),
        )) {
            error!("Failed to connect capture graph: {}", e);
            self.recording.store(false, Ordering::Release);
            pump.abort();
            self.events
                .dispatch_event(RecorderEvent::Error(ErrorDetail::Graph(e.to_string())));
            return;
        }

        self.encoder = Some(sender);
        self.pump = Some(pump);
        self.state = RecordingState::Recording;
        self.started_at = Some(Utc::now());
        self.stopped_at = None;

        info!(
            "Session {} recording at {}Hz into {}",
            self.id,
            self.graph.sample_rate(),
            path
        );
        self.events.dispatch_event(RecorderEvent::Start);
    }

    /// Let the previous recording's encoder deliver its last pages and
    /// `stop` before a new recording begins
    async fn finish_previous(&mut self) {
        let Some(mut pump) = self.pump.take() else {
            return;
        };

        match tokio::time::timeout(PREVIOUS_ENCODER_TIMEOUT, &mut pump).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Previous reply pump failed: {}", e),
            Err(_) => {
                warn!(
                    "Previous encoder did not finish within {:?}; abandoning it",
                    PREVIOUS_ENCODER_TIMEOUT
                );
                pump.abort();
                self.events.dispatch_event(RecorderEvent::Stop);
            }
        }
    }

    /// Stop forwarding buffers without ending the recording
    pub fn pause(&mut self) {
        if self.state != RecordingState::Recording {
            debug!("Ignoring pause while {}", self.state);
            return;
        }
        self.recording.store(false, Ordering::Release);
        self.state = RecordingState::Paused;
        info!("Session {} paused", self.id);
        self.events.dispatch_event(RecorderEvent::Pause);
    }

    pub fn resume(&mut self) {
        if self.state != RecordingState::Paused {
            debug!("Ignoring resume while {}", self.state);
            return;
        }
        self.recording.store(true, Ordering::Release);
        self.state = RecordingState::Recording;
        info!("Session {} resumed", self.id);
        self.events.dispatch_event(RecorderEvent::Resume);
    }

    /// End the recording
    ///
    /// Disconnects the graph before returning, so no buffer is forwarded
    /// afterwards. The encoder is told to finish; `stop` is dispatched once it
    /// has delivered its last page. Never waits on the encoder.
    pub fn stop(&mut self) {
        if !self.state.is_active() {
            debug!("Ignoring stop while {}", self.state);
            return;
        }

        self.recording.store(false, Ordering::Release);
        self.graph.disconnect();

        if !self.config.leave_stream_open {
            self.streams.release();
        }

        self.state = RecordingState::Inactive;
        self.stopped_at = Some(Utc::now());
        info!(
            "Session {} stopped after {} buffers",
            self.id,
            self.counters.buffers_sent.load(Ordering::Relaxed)
        );

        let finished = match self.encoder.take() {
            Some(sender) => sender.send(EncoderCommand::Done),
            None => Ok(()),
        };
        if let Err(e) = finished {
            warn!("Encoder already gone at stop: {}", e);
            self.events.dispatch_event(RecorderEvent::Stop);
        }
    }

    /// Ask the encoder to emit whatever it holds now
    ///
    /// Returns false when no encoder is running.
    pub fn request_data(&self) -> bool {
        match &self.encoder {
            Some(sender) => match sender.send(EncoderCommand::Flush) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to request data: {}", e);
                    false
                }
            },
            None => {
                debug!("No encoder to request data from");
                false
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.recording.store(false, Ordering::Release);
        self.graph.disconnect();
        if let Some(sender) = self.encoder.take() {
            let _ = sender.send(EncoderCommand::Done);
        }
        self.streams.release();
        debug!("Session {} dropped", self.id);
    }
}

/// Runs on the capture callback: one atomic load and one unbounded send
fn buffer_handler(
    sender: EncoderSender,
    recording: Arc<AtomicBool>,
    counters: Arc<Counters>,
) -> BufferHandler {
    Box::new(move |buffer: SampleBuffer| {
        if !recording.load(Ordering::Acquire) {
            return;
        }
        let command = EncoderCommand::Encode {
            buffers: buffer.into_channels(),
        };
        match sender.send(command) {
            Ok(()) => {
                counters.buffers_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => trace!("Dropping buffer, encoder channel closed"),
        }
    })
}

/// The session's single listener on the encoder's replies
async fn pump_replies(
    mut replies: mpsc::UnboundedReceiver<EncoderReply>,
    events: Arc<dyn EventTarget>,
    counters: Arc<Counters>,
) {
    while let Some(reply) = replies.recv().await {
        match reply {
            EncoderReply::Page(page) => {
                counters.pages_received.fetch_add(1, Ordering::Relaxed);
                debug!("Page {} available ({} bytes)", page.sequence, page.len());
                events.dispatch_event(RecorderEvent::DataAvailable(page));
            }
            EncoderReply::Error(message) => {
                warn!("Encoder error: {}", message);
                events.dispatch_event(RecorderEvent::Error(ErrorDetail::Encoder(message)));
            }
            EncoderReply::Done => {
                events.dispatch_event(RecorderEvent::Stop);
                return;
            }
        }
    }
    debug!("Encoder reply stream closed");
}
