pub mod audio;
pub mod capability;
pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod session;

pub use capability::{is_recording_supported, Host};
pub use config::Config;
pub use encoder::{EncoderCommand, EncoderReply, Page, TaskSpawner};
pub use error::{DeviceError, EncoderError, ErrorDetail, GraphError, RecorderError};
pub use events::{channel_listener, listener, EventBus, EventKind, EventTarget, Listener, ListenerOptions, RecorderEvent};
pub use session::{
    DeviceStreamManager, RecorderConfig, RecorderOptions, RecordingState, Session, SessionStats,
    DEFAULT_ENCODER_PATH,
};
