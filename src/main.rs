use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use stream_recorder::audio::{FileDevices, ProcessorHost, ToneDevices};
use stream_recorder::config::CaptureSource;
use stream_recorder::{
    channel_listener, Config, EventKind, Host, RecorderConfig, RecorderEvent, RecorderOptions,
    RecordingState, Session, TaskSpawner, DEFAULT_ENCODER_PATH,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "stream-recorder")]
#[command(about = "Record audio through the paged encoder pipeline")]
struct Args {
    /// Configuration file (any format the `config` crate reads)
    #[arg(short, long)]
    config: Option<String>,

    /// Capture source
    #[arg(short, long, value_enum)]
    source: Option<CaptureSource>,

    /// WAV file to replay with `--source file`
    #[arg(long)]
    file: Option<PathBuf>,

    /// Input device name with `--source device`
    #[arg(long)]
    device: Option<String>,

    /// Duration to record in seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit pages while recording instead of at stop
    #[arg(long)]
    stream_pages: bool,

    /// Capture buffers per page
    #[arg(long)]
    max_buffers_per_page: Option<usize>,
}

fn build_host(cfg: &Config) -> Result<Host> {
    let host = Host::new()
        .with_audio(ProcessorHost::new())
        .with_encoders(TaskSpawner::default());

    let host = match cfg.capture.source {
        CaptureSource::Tone => host.with_devices(ToneDevices::new(
            cfg.capture.sample_rate,
            cfg.capture.tone_frequency,
        )),
        CaptureSource::File => {
            let path = cfg
                .capture
                .file
                .clone()
                .context("The file source needs an input file (--file)")?;
            host.with_devices(FileDevices::new(path).realtime(cfg.capture.realtime))
        }
        #[cfg(feature = "cpal")]
        CaptureSource::Device => {
            let devices = stream_recorder::audio::CpalDevices::new();
            match &cfg.capture.device {
                Some(name) => host.with_devices(devices.with_device(name.clone())),
                None => host.with_devices(devices),
            }
        }
        #[cfg(not(feature = "cpal"))]
        CaptureSource::Device => bail!("Built without the `cpal` feature; no input device available"),
    };

    Ok(host)
}

/// Concatenate pages into `path`. PCM pages get a WAV header when the path
/// ends in `.wav`.
fn write_output(path: &Path, data: &[u8], config: &RecorderConfig) -> Result<()> {
    let wants_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    if wants_wav && config.encoder_path == DEFAULT_ENCODER_PATH {
        let spec = hound::WavSpec {
            channels: config.number_of_channels,
            sample_rate: config.encoder_sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).context("Failed to create WAV file")?;
        for pair in data.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize().context("Failed to finalize WAV file")?;
    } else {
        if wants_wav {
            warn!("Encoder {} is not PCM; writing raw pages", config.encoder_path);
        }
        std::fs::write(path, data).context("Failed to write output file")?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;

    if let Some(source) = args.source {
        cfg.capture.source = source;
    }
    if args.file.is_some() {
        cfg.capture.file = args.file;
    }
    if args.device.is_some() {
        cfg.capture.device = args.device;
    }
    if let Some(duration) = args.duration {
        cfg.capture.duration_secs = duration;
    }
    if let Some(output) = args.output {
        cfg.output.path = output;
    }
    if args.stream_pages {
        cfg.recorder.stream_pages = Some(true);
    }
    if args.max_buffers_per_page.is_some() {
        cfg.recorder.max_buffers_per_page = args.max_buffers_per_page;
    }

    info!("Stream Recorder v{}", env!("CARGO_PKG_VERSION"));
    info!("Source: {:?}, duration: {}s", cfg.capture.source, cfg.capture.duration_secs);

    let host = build_host(&cfg)?;
    let options: RecorderOptions = cfg.recorder.clone().into();
    let mut session = Session::new(&host, options).context("Failed to create session")?;

    let (on_page, mut pages) = channel_listener();
    let (on_stop, mut stopped) = channel_listener();
    let (on_error, mut errors) = channel_listener();
    session.add_event_listener(EventKind::DataAvailable, on_page);
    session.add_event_listener(EventKind::Stop, on_stop);
    session.add_event_listener(EventKind::Error, on_error);

    tokio::spawn(async move {
        while let Some(event) = errors.recv().await {
            if let RecorderEvent::Error(detail) = event {
                error!("Recorder error: {}", detail);
            }
        }
    });

    session.start().await;
    if session.state() != RecordingState::Recording {
        bail!("Recording did not start");
    }

    info!(
        "Recording started! Press Ctrl+C to stop early, or wait {} seconds",
        cfg.capture.duration_secs
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cfg.capture.duration_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    session.stop();
    tokio::time::timeout(Duration::from_secs(10), stopped.recv())
        .await
        .context("Timed out waiting for the encoder to finish")?;

    let mut data = Vec::new();
    let mut page_count = 0;
    while let Ok(event) = pages.try_recv() {
        if let RecorderEvent::DataAvailable(page) = event {
            data.extend_from_slice(&page.data);
            page_count += 1;
        }
    }

    write_output(&cfg.output.path, &data, session.config())?;

    let stats = session.stats();
    info!("Recording complete!");
    info!("Buffers sent: {}", stats.buffers_sent);
    info!("Pages: {} ({} bytes)", page_count, data.len());
    info!("Output: {}", cfg.output.path.display());

    Ok(())
}
