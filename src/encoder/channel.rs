use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::codec::{CodecFactory, PcmCodec};
use super::messages::{EncoderCommand, EncoderReply};
use super::worker::run_encoder;
use crate::error::EncoderError;
use crate::session::DEFAULT_ENCODER_PATH;

/// Cloneable sending half of an encoder channel
///
/// Sends never wait: the channel is unbounded, so this is safe to call from
/// an audio callback.
#[derive(Clone)]
pub struct EncoderSender {
    commands: mpsc::UnboundedSender<EncoderCommand>,
}

impl EncoderSender {
    pub fn send(&self, command: EncoderCommand) -> Result<(), EncoderError> {
        self.commands
            .send(command)
            .map_err(|_| EncoderError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl fmt::Debug for EncoderSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Message-passing connection to one background encode task
pub struct EncoderChannel {
    path: String,
    sender: EncoderSender,
    replies: Option<mpsc::UnboundedReceiver<EncoderReply>>,
    task: Option<JoinHandle<()>>,
}

impl EncoderChannel {
    /// Wrap the two halves of an encoder connection
    ///
    /// `task` is the handle of the task serving the channel, if the spawner
    /// owns one.
    pub fn new(
        path: impl Into<String>,
        commands: mpsc::UnboundedSender<EncoderCommand>,
        replies: mpsc::UnboundedReceiver<EncoderReply>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            path: path.into(),
            sender: EncoderSender { commands },
            replies: Some(replies),
            task,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sender(&self) -> EncoderSender {
        self.sender.clone()
    }

    pub fn post(&self, command: EncoderCommand) -> Result<(), EncoderError> {
        self.sender.send(command)
    }

    /// Take the reply stream. There is exactly one listener per channel, so
    /// this returns `None` after the first call.
    pub fn take_replies(&mut self) -> Option<mpsc::UnboundedReceiver<EncoderReply>> {
        self.replies.take()
    }

    /// Detach the task handle, if any
    pub fn take_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }
}

impl fmt::Debug for EncoderChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderChannel")
            .field("path", &self.path)
            .field("listening", &self.replies.is_none())
            .finish()
    }
}

/// Capability to start background encode tasks
pub trait EncoderSpawner: Send + Sync {
    /// Start an encoder addressed by `encoder_path` and connect to it
    fn spawn(&self, encoder_path: &str) -> Result<EncoderChannel, EncoderError>;
}

/// Spawns encoder tasks on the current tokio runtime
///
/// Encoder paths resolve through a registry of codec factories. The default
/// registry maps [`DEFAULT_ENCODER_PATH`] to [`PcmCodec`].
pub struct TaskSpawner {
    codecs: HashMap<String, CodecFactory>,
}

impl TaskSpawner {
    /// A spawner with no registered encoders
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    pub fn register(mut self, encoder_path: impl Into<String>, factory: CodecFactory) -> Self {
        self.codecs.insert(encoder_path.into(), factory);
        self
    }

    pub fn is_registered(&self, encoder_path: &str) -> bool {
        self.codecs.contains_key(encoder_path)
    }
}

impl Default for TaskSpawner {
    fn default() -> Self {
        Self::empty().register(
            DEFAULT_ENCODER_PATH,
            super::codec::codec_factory(|| Box::new(PcmCodec::new())),
        )
    }
}

impl EncoderSpawner for TaskSpawner {
    fn spawn(&self, encoder_path: &str) -> Result<EncoderChannel, EncoderError> {
        let factory = self
            .codecs
            .get(encoder_path)
            .ok_or_else(|| EncoderError::UnknownEncoder(encoder_path.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EncoderError::NoRuntime)?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let task = runtime.spawn(run_encoder(factory(), cmd_rx, reply_tx));

        info!("Spawned encoder task for {}", encoder_path);

        Ok(EncoderChannel::new(encoder_path, cmd_tx, reply_rx, Some(task)))
    }
}
