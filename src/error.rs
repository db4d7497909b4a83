//! Error types for stream-recorder.
//!
//! Errors are split the same way the session surfaces them:
//! - **Fatal errors** ([`RecorderError`]): returned synchronously from
//!   [`Session::new`](crate::Session::new), the session never exists.
//! - **Recoverable errors** ([`ErrorDetail`]): carried by
//!   [`RecorderEvent::Error`](crate::RecorderEvent::Error), the session keeps
//!   its current state.
//!
//! The capability traits report their own failures through [`DeviceError`],
//! [`GraphError`] and [`EncoderError`]; the session maps them to events.

/// Fatal errors that prevent a session from being constructed.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The host lacks the audio, device or background-task capability.
    #[error("Recording is not supported in this browser")]
    Unsupported,

    /// A configuration value cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The audio graph could not be created.
    #[error("failed to create audio graph: {0}")]
    Graph(#[from] GraphError),
}

/// Recoverable failures delivered through the event bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorDetail {
    /// The input device stream could not be acquired.
    #[error("stream acquisition failed: {0}")]
    StreamAcquisition(String),

    /// The background encoder could not be started.
    #[error("failed to spawn encoder '{path}': {reason}")]
    EncoderSpawn {
        /// Encoder path that was requested.
        path: String,
        /// Why spawning failed.
        reason: String,
    },

    /// The background encoder reported an error.
    #[error("encoder error: {0}")]
    Encoder(String),

    /// The audio graph rejected a source or connection.
    #[error("audio graph error: {0}")]
    Graph(String),
}

/// Errors from a [`MediaDevices`](crate::audio::MediaDevices) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Permission to capture audio was denied.
    #[error("permission denied for audio capture")]
    PermissionDenied,

    /// No input device is available.
    #[error("no input device available")]
    NotFound,

    /// The requested channel layout is not available.
    #[error("unsupported constraints: {0}")]
    Unsupported(String),

    /// An error from the underlying audio backend.
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl DeviceError {
    /// Creates a backend error with the given message.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Errors from an [`AudioGraph`](crate::audio::AudioGraph).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// `connect` was called before a source was attached.
    #[error("no source attached to the audio graph")]
    NoSource,

    /// The graph is already delivering buffers to a handler.
    #[error("audio graph already connected")]
    AlreadyConnected,

    /// An error from the host audio layer.
    #[error("{0}")]
    Backend(String),
}

/// Errors from the encoder boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncoderError {
    /// No encoder is registered under the requested path.
    #[error("no encoder registered at '{0}'")]
    UnknownEncoder(String),

    /// Encoder tasks can only be spawned from inside a tokio runtime.
    #[error("no tokio runtime available to run the encoder")]
    NoRuntime,

    /// The encoder task is gone.
    #[error("encoder channel closed")]
    ChannelClosed,

    /// The codec rejected its parameters or input.
    #[error("codec error: {0}")]
    Codec(String),
}

impl EncoderError {
    /// Creates a codec error with the given message.
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}
