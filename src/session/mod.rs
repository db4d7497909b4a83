//! Recording session management
//!
//! This module provides the [`Session`] controller that manages:
//! - The device stream lifecycle (acquire once, release on stop)
//! - The recording state machine
//! - Forwarding capture buffers to the background encoder
//! - Re-emitting encoder pages and errors as events

mod config;
mod session;
mod state;
mod stats;
mod stream_manager;

pub use config::{RecorderConfig, RecorderOptions, DEFAULT_ENCODER_PATH};
pub use session::Session;
pub use state::RecordingState;
pub use stats::SessionStats;
pub use stream_manager::DeviceStreamManager;
