// Integration tests for the recording session
//
// These tests drive a session through hand-driven host capabilities: a
// ManualHost whose buffer callback is invoked by the test, ManualDevices that
// count acquisitions and track stops, and either the real TaskSpawner or a
// scripted spawner that exposes the raw encoder channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use stream_recorder::audio::{ManualDevices, ManualHost, ProcessorHost, SampleBuffer, TrackLayout};
use stream_recorder::encoder::{EncoderChannel, EncoderSpawner};
use stream_recorder::{
    channel_listener, listener, DeviceError, EncoderCommand, EncoderError, EncoderReply,
    ErrorDetail, EventKind, EventTarget, Host, Listener, ListenerOptions, Page, RecorderConfig,
    RecorderError, RecorderEvent, RecorderOptions, RecordingState, Session, TaskSpawner,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

const RATE: u32 = 44100;

const ALL_KINDS: [EventKind; 7] = [
    EventKind::StreamReady,
    EventKind::Start,
    EventKind::Stop,
    EventKind::Pause,
    EventKind::Resume,
    EventKind::DataAvailable,
    EventKind::Error,
];

type ScriptedEncoder = (UnboundedReceiver<EncoderCommand>, UnboundedSender<EncoderReply>);

/// Spawner that hands the encoder side of every channel to the test
#[derive(Clone, Default)]
struct ScriptedSpawner {
    spawned: Arc<Mutex<Vec<ScriptedEncoder>>>,
    spawns: Arc<Mutex<usize>>,
}

impl ScriptedSpawner {
    fn spawns(&self) -> usize {
        *self.spawns.lock()
    }

    fn take_encoder(&self) -> ScriptedEncoder {
        self.spawned.lock().remove(0)
    }
}

impl EncoderSpawner for ScriptedSpawner {
    fn spawn(&self, encoder_path: &str) -> Result<EncoderChannel, EncoderError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        *self.spawns.lock() += 1;
        self.spawned.lock().push((cmd_rx, reply_tx));
        Ok(EncoderChannel::new(encoder_path, cmd_tx, reply_rx, None))
    }
}

/// Event target that records how it was called
#[derive(Default)]
struct RecordingTarget {
    calls: Mutex<Vec<(&'static str, EventKind, Option<ListenerOptions>)>>,
}

impl EventTarget for RecordingTarget {
    fn add_event_listener(&self, kind: EventKind, _listener: Listener, options: Option<ListenerOptions>) {
        self.calls.lock().push(("add", kind, options));
    }

    fn remove_event_listener(&self, kind: EventKind, _listener: &Listener, options: Option<ListenerOptions>) {
        self.calls.lock().push(("remove", kind, options));
    }

    fn dispatch_event(&self, _event: RecorderEvent) {}
}

fn manual_host(audio: &ManualHost, devices: &ManualDevices, encoders: impl EncoderSpawner + 'static) -> Host {
    Host::new()
        .with_audio(audio.clone())
        .with_devices(devices.clone())
        .with_encoders(encoders)
}

/// Forward every event the session emits into one channel
fn record_events(session: &Session) -> UnboundedReceiver<RecorderEvent> {
    let (all, rx) = channel_listener();
    for kind in ALL_KINDS {
        session.add_event_listener(kind, all.clone());
    }
    rx
}

fn drain(rx: &mut UnboundedReceiver<RecorderEvent>) -> Vec<RecorderEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn next_event(rx: &mut UnboundedReceiver<RecorderEvent>) -> RecorderEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

fn buffer() -> SampleBuffer {
    SampleBuffer::new(vec![vec![0.25; 128]])
}

#[test]
fn test_config_merges_overrides_over_defaults() -> Result<()> {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let host = manual_host(&audio, &devices, TaskSpawner::default());

    let session = Session::new(
        &host,
        RecorderOptions {
            buffer_length: Some(2048),
            stream_pages: Some(true),
            bit_rate: Some(64000),
            ..Default::default()
        },
    )?;

    let expected = RecorderConfig {
        buffer_length: 2048,
        stream_pages: true,
        bit_rate: Some(64000),
        ..Default::default()
    };
    assert_eq!(session.config(), &expected);
    assert_eq!(session.state(), RecordingState::Inactive);

    // The graph is built eagerly from the merged config
    let graph = audio.last_config().expect("graph created");
    assert_eq!(graph.buffer_length, 2048);
    assert_eq!(audio.graphs_created(), 1);
    assert!(session.stream().is_none());

    Ok(())
}

#[test]
fn test_config_reflects_every_supplied_key() -> Result<()> {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let host = manual_host(&audio, &devices, TaskSpawner::default());

    let options = RecorderOptions::from_json(serde_json::json!({
        "bufferLength": 1024,
        "monitorGain": 0.5,
        "numberOfChannels": 2,
        "encoderSampleRate": 16000,
        "encoderPath": "custom.js",
        "streamPages": true,
        "leaveStreamOpen": true,
        "maxBuffersPerPage": 8,
        "encoderApplication": 2048,
        "encoderFrameSize": 40,
        "resampleQuality": 10,
        "bitRate": 32000,
        "originalSampleRateOverride": 22050
    }))?;

    let session = Session::new(&host, options)?;
    let config = session.config();
    assert_eq!(config.buffer_length, 1024);
    assert_eq!(config.monitor_gain, 0.5);
    assert_eq!(config.number_of_channels, 2);
    assert_eq!(config.encoder_sample_rate, 16000);
    assert_eq!(config.encoder_path, "custom.js");
    assert!(config.stream_pages);
    assert!(config.leave_stream_open);
    assert_eq!(config.max_buffers_per_page, 8);
    assert_eq!(config.encoder_application, 2048);
    assert_eq!(config.encoder_frame_size, 40);
    assert_eq!(config.resample_quality, 10);
    assert_eq!(config.bit_rate, Some(32000));
    assert_eq!(config.extra["originalSampleRateOverride"], 22050);

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let host = manual_host(&audio, &devices, TaskSpawner::default());

    let result = Session::new(
        &host,
        RecorderOptions {
            max_buffers_per_page: Some(0),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(RecorderError::InvalidConfig(_))));
    assert_eq!(audio.graphs_created(), 0);
}

#[test]
fn test_unsupported_host_fails_construction() {
    let err = Session::new(&Host::new(), RecorderOptions::default())
        .err()
        .expect("construction must fail");
    assert!(matches!(err, RecorderError::Unsupported));
    assert_eq!(err.to_string(), "Recording is not supported in this browser");

    // Missing only the encoder capability is just as fatal
    let audio = ManualHost::new(RATE);
    let host = Host::new()
        .with_audio(audio.clone())
        .with_devices(ManualDevices::new(RATE));
    assert!(!stream_recorder::is_recording_supported(&host));
    assert!(Session::new(&host, RecorderOptions::default()).is_err());
    assert_eq!(audio.graphs_created(), 0);
}

#[tokio::test]
async fn test_init_stream_twice_acquires_once() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    assert!(session.init_stream().await);
    assert!(session.init_stream().await);

    assert_eq!(devices.acquisitions(), 1);
    assert_eq!(audio.sources_attached(), 1);
    assert_eq!(
        drain(&mut events),
        vec![RecorderEvent::StreamReady, RecorderEvent::StreamReady]
    );
    assert!(session.stream().is_some());
}

#[tokio::test]
async fn test_clear_stream_stops_every_track_once() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE).with_layout(TrackLayout::Tracks(2));
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions::default(),
    )
    .unwrap();

    session.init_stream().await;
    session.clear_stream();

    assert!(session.stream().is_none());
    assert_eq!(devices.track_stops(), vec![1, 1]);

    // A second clear has nothing left to stop
    session.clear_stream();
    assert_eq!(devices.track_stops(), vec![1, 1]);
}

#[test]
fn test_clear_stream_without_stream_is_noop() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions::default(),
    )
    .unwrap();

    session.clear_stream();
    assert!(session.stream().is_none());
    assert_eq!(devices.acquisitions(), 0);
}

#[tokio::test]
async fn test_stream_acquisition_failure_emits_error() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    devices.fail_next(DeviceError::PermissionDenied);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    assert!(!session.init_stream().await);
    assert_eq!(
        drain(&mut events),
        vec![RecorderEvent::Error(ErrorDetail::StreamAcquisition(
            DeviceError::PermissionDenied.to_string()
        ))]
    );
    assert!(session.stream().is_none());

    // start gives up the same way without touching the encoder
    devices.fail_next(DeviceError::NotFound);
    session.start().await;
    assert_eq!(session.state(), RecordingState::Inactive);
    assert_eq!(spawner.spawns(), 0);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [RecorderEvent::Error(ErrorDetail::StreamAcquisition(_))]
    ));
}

#[test]
fn test_listener_registration_forwards_unset_options() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let target = Arc::new(RecordingTarget::default());
    let host = manual_host(&audio, &devices, TaskSpawner::default()).with_events(target.clone());
    let session = Session::new(&host, RecorderOptions::default()).unwrap();

    let l = listener(|_| {});
    session.add_event_listener(EventKind::Start, l.clone());
    session.remove_event_listener(EventKind::Start, &l);
    session.add_event_listener_with_options(EventKind::Stop, l.clone(), ListenerOptions { once: true });

    assert_eq!(
        *target.calls.lock(),
        vec![
            ("add", EventKind::Start, None),
            ("remove", EventKind::Start, None),
            ("add", EventKind::Stop, Some(ListenerOptions { once: true })),
        ]
    );
}

#[tokio::test]
async fn test_start_after_init_stream() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    session.init_stream().await;
    drain(&mut events);

    session.start().await;

    assert_eq!(spawner.spawns(), 1);
    assert_eq!(session.state(), RecordingState::Recording);
    assert!(audio.is_connected());
    assert_eq!(audio.connect_count(), 1);
    assert_eq!(drain(&mut events), vec![RecorderEvent::Start]);

    let (mut commands, replies) = spawner.take_encoder();
    assert_eq!(
        commands.try_recv().unwrap(),
        EncoderCommand::Configure {
            config: session.config().clone(),
            original_sample_rate: RATE,
        }
    );

    // Replies reach the caller through the session's one reply listener
    replies
        .send(EncoderReply::Page(Page {
            sequence: 0,
            data: vec![1, 2, 3],
        }))
        .unwrap();
    match next_event(&mut events).await {
        RecorderEvent::DataAvailable(page) => assert_eq!(page.data, vec![1, 2, 3]),
        other => panic!("expected a page, got {:?}", other),
    }

    // Starting again while recording changes nothing
    session.start().await;
    assert_eq!(spawner.spawns(), 1);
    assert_eq!(audio.connect_count(), 1);
    assert!(drain(&mut events).is_empty());
    assert_eq!(devices.acquisitions(), 1);
}

#[tokio::test]
async fn test_start_without_stream_acquires_one() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    session.start().await;

    assert_eq!(devices.acquisitions(), 1);
    assert_eq!(
        drain(&mut events),
        vec![RecorderEvent::StreamReady, RecorderEvent::Start]
    );
}

#[tokio::test]
async fn test_buffers_forwarded_only_while_recording() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    session.start().await;
    let (mut commands, _replies) = spawner.take_encoder();
    assert!(matches!(commands.try_recv(), Ok(EncoderCommand::Configure { .. })));

    assert!(audio.deliver(SampleBuffer::new(vec![vec![0.5; 4]])));
    assert_eq!(
        commands.try_recv().unwrap(),
        EncoderCommand::Encode {
            buffers: vec![vec![0.5; 4]]
        }
    );

    session.pause();
    assert_eq!(session.state(), RecordingState::Paused);
    audio.deliver(buffer());
    assert!(commands.try_recv().is_err());

    // Pausing twice is ignored
    session.pause();

    session.resume();
    assert_eq!(session.state(), RecordingState::Recording);
    audio.deliver(buffer());
    assert!(matches!(commands.try_recv(), Ok(EncoderCommand::Encode { .. })));

    assert_eq!(
        drain(&mut events),
        vec![
            RecorderEvent::StreamReady,
            RecorderEvent::Start,
            RecorderEvent::Pause,
            RecorderEvent::Resume
        ]
    );
    assert_eq!(session.stats().buffers_sent, 2);
}

#[tokio::test]
async fn test_stream_pages_cadence() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions {
            buffer_length: Some(128),
            stream_pages: Some(true),
            max_buffers_per_page: Some(3),
            ..Default::default()
        },
    )
    .unwrap();

    let (on_page, mut pages) = channel_listener();
    session.add_event_listener(EventKind::DataAvailable, on_page);
    session.start().await;

    for _ in 0..3 {
        audio.deliver(buffer());
    }

    // Exactly one page after K buffers, before buffer K+1 is sent
    match next_event(&mut pages).await {
        RecorderEvent::DataAvailable(page) => {
            assert_eq!(page.sequence, 0);
            assert!(!page.is_empty());
        }
        other => panic!("expected a page, got {:?}", other),
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(pages.try_recv().is_err());

    for _ in 0..3 {
        audio.deliver(buffer());
    }
    match next_event(&mut pages).await {
        RecorderEvent::DataAvailable(page) => assert_eq!(page.sequence, 1),
        other => panic!("expected a page, got {:?}", other),
    }

    session.stop();
}

#[tokio::test]
async fn test_batch_pages_held_until_stop() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions {
            buffer_length: Some(128),
            max_buffers_per_page: Some(2),
            ..Default::default()
        },
    )
    .unwrap();

    let (on_event, mut events) = channel_listener();
    session.add_event_listener(EventKind::DataAvailable, on_event.clone());
    session.add_event_listener(EventKind::Stop, on_event);
    session.start().await;

    for _ in 0..5 {
        audio.deliver(buffer());
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err(), "no page before stop");

    session.stop();
    assert_eq!(session.state(), RecordingState::Inactive);

    let mut sequences = Vec::new();
    loop {
        match next_event(&mut events).await {
            RecorderEvent::DataAvailable(page) => sequences.push(page.sequence),
            RecorderEvent::Stop => break,
            other => panic!("unexpected event {:?}", other),
        }
    }
    // Two full pages then the partial one, and stop only after the last
    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(session.stats().pages_received, 3);
}

#[tokio::test]
async fn test_request_data_flushes_partial_page() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions {
            buffer_length: Some(128),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!session.request_data());

    let (on_page, mut pages) = channel_listener();
    session.add_event_listener(EventKind::DataAvailable, on_page);
    session.start().await;

    audio.deliver(buffer());
    assert!(session.request_data());

    match next_event(&mut pages).await {
        RecorderEvent::DataAvailable(page) => assert_eq!(page.sequence, 0),
        other => panic!("expected a page, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stop_disconnects_and_releases_stream() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();

    session.start().await;
    let (mut commands, replies) = spawner.take_encoder();
    session.stop();

    assert!(!audio.is_connected());
    assert!(!audio.deliver(buffer()));
    assert!(session.stream().is_none());
    assert_eq!(devices.track_stops(), vec![1]);

    // Configure, then straight to done
    assert!(matches!(commands.try_recv(), Ok(EncoderCommand::Configure { .. })));
    assert_eq!(commands.try_recv().unwrap(), EncoderCommand::Done);

    let mut events = record_events(&session);
    replies.send(EncoderReply::Done).unwrap();
    assert_eq!(next_event(&mut events).await, RecorderEvent::Stop);

    // Stopping an inactive session does nothing
    session.stop();
    assert!(commands.try_recv().is_err());
}

#[tokio::test]
async fn test_leave_stream_open_keeps_stream() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions {
            leave_stream_open: Some(true),
            ..Default::default()
        },
    )
    .unwrap();

    session.start().await;
    session.stop();

    assert!(session.stream().is_some());
    assert_eq!(devices.track_stops(), vec![0]);

    let (_commands, replies) = spawner.take_encoder();
    replies.send(EncoderReply::Done).unwrap();

    // The cached stream is reused by the next recording
    session.start().await;
    assert_eq!(devices.acquisitions(), 1);
    assert_eq!(audio.connect_count(), 2);
}

#[tokio::test]
async fn test_restart_delivers_previous_recording_first() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions {
            leave_stream_open: Some(true),
            ..Default::default()
        },
    )
    .unwrap();
    let mut events = record_events(&session);

    session.start().await;
    assert!(audio.deliver(buffer()));
    session.stop();
    session.start().await;

    let names: Vec<&str> = drain(&mut events)
        .iter()
        .map(|event| match event {
            RecorderEvent::StreamReady => "streamReady",
            RecorderEvent::Start => "start",
            RecorderEvent::DataAvailable(page) if page.sequence == 0 => "page0",
            RecorderEvent::Stop => "stop",
            _ => "other",
        })
        .collect();
    assert_eq!(names, vec!["streamReady", "start", "page0", "stop", "start"]);
    assert_eq!(session.state(), RecordingState::Recording);
}

#[tokio::test]
async fn test_clear_stream_refused_while_recording() {
    let devices = ManualDevices::new(RATE);
    let host = Host::new()
        .with_audio(ProcessorHost::new())
        .with_devices(devices.clone())
        .with_encoders(TaskSpawner::default());
    let mut session = Session::new(
        &host,
        RecorderOptions {
            buffer_length: Some(4),
            ..Default::default()
        },
    )
    .unwrap();

    session.start().await;
    let tap = session.stream().expect("stream acquired").tap().clone();
    assert!(tap.push(&[0.1; 4]));
    assert_eq!(session.stats().buffers_sent, 1);

    session.clear_stream();
    assert!(session.init_stream().await);

    assert_eq!(session.state(), RecordingState::Recording);
    assert_eq!(devices.acquisitions(), 1);
    assert_eq!(devices.track_stops(), vec![0]);
    assert!(tap.has_sink());

    assert!(tap.push(&[0.1; 16]));
    assert_eq!(session.stats().buffers_sent, 5);

    // Once stopped the stream can be cleared
    session.stop();
    session.clear_stream();
    assert!(session.stream().is_none());
}

#[tokio::test]
async fn test_stop_with_encoder_gone_emits_stop() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    session.start().await;
    drop(spawner.take_encoder());
    drain(&mut events);

    session.stop();
    assert_eq!(drain(&mut events), vec![RecorderEvent::Stop]);
}

#[tokio::test]
async fn test_encoder_error_becomes_error_event() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();

    let (on_error, mut errors) = channel_listener();
    session.add_event_listener(EventKind::Error, on_error);
    session.start().await;

    let (_commands, replies) = spawner.take_encoder();
    replies
        .send(EncoderReply::Error("bad frame".to_string()))
        .unwrap();

    assert_eq!(
        next_event(&mut errors).await,
        RecorderEvent::Error(ErrorDetail::Encoder("bad frame".to_string()))
    );
    assert_eq!(session.state(), RecordingState::Recording);
}

#[tokio::test]
async fn test_unknown_encoder_path_emits_error() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::empty()),
        RecorderOptions::default(),
    )
    .unwrap();
    let mut events = record_events(&session);

    session.start().await;

    assert_eq!(session.state(), RecordingState::Inactive);
    assert!(!audio.is_connected());
    let events = drain(&mut events);
    assert!(matches!(
        events.as_slice(),
        [RecorderEvent::StreamReady, RecorderEvent::Error(ErrorDetail::EncoderSpawn { path, .. })]
            if path == "encoderWorker.min.js"
    ));
}

#[tokio::test]
async fn test_monitor_gain_is_live() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, TaskSpawner::default()),
        RecorderOptions {
            monitor_gain: Some(0.25),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(audio.monitor_gain(), 0.25);

    session.set_monitor_gain(1.0);
    assert_eq!(session.monitor_gain(), 1.0);
    assert_eq!(audio.monitor_gain(), 1.0);
}

#[tokio::test]
async fn test_drop_releases_stream() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let spawner = ScriptedSpawner::default();
    let mut session = Session::new(
        &manual_host(&audio, &devices, spawner.clone()),
        RecorderOptions::default(),
    )
    .unwrap();

    session.start().await;
    let (mut commands, _replies) = spawner.take_encoder();
    drop(session);

    assert_eq!(devices.track_stops(), vec![1]);
    assert!(!audio.is_connected());
    assert!(matches!(commands.try_recv(), Ok(EncoderCommand::Configure { .. })));
    assert_eq!(commands.try_recv().unwrap(), EncoderCommand::Done);
}

#[tokio::test]
async fn test_stats_track_session() {
    let audio = ManualHost::new(RATE);
    let devices = ManualDevices::new(RATE);
    let mut session = Session::new(
        &manual_host(&audio, &devices, ScriptedSpawner::default()),
        RecorderOptions::default(),
    )
    .unwrap();

    let stats = session.stats();
    assert_eq!(stats.session_id, session.id());
    assert!(stats.started_at.is_none());
    assert_eq!(stats.duration_secs, 0.0);

    session.start().await;
    audio.deliver(buffer());

    let stats = session.stats();
    assert_eq!(stats.state, RecordingState::Recording);
    assert!(stats.started_at.is_some());
    assert!(stats.stopped_at.is_none());
    assert_eq!(stats.buffers_sent, 1);
    assert_eq!(stats.stream_acquisitions, 1);

    // Duration is frozen at stop
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.stop();
    let stopped = session.stats();
    assert!(stopped.stopped_at.is_some());
    assert!(stopped.duration_secs >= 0.02);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.stats().duration_secs, stopped.duration_secs);
}
