//! Encoder channel: the message-passing link to the background encode task.
//!
//! - `configure` (once, first) → codec parameters and page policy
//! - `encode` (per capture buffer) → raw samples
//! - `flush` / `done` → release pending pages; `done` also ends the task
//!
//! Replies come back as pages, errors, and a final `done` acknowledgement.

pub mod channel;
pub mod codec;
pub mod messages;
pub mod worker;

pub use channel::{EncoderChannel, EncoderSender, EncoderSpawner, TaskSpawner};
pub use codec::{codec_factory, Codec, CodecFactory, CodecParams, PcmCodec};
pub use messages::{EncoderCommand, EncoderReply, Page};
pub use worker::{run_encoder, PageAssembler, PagePolicy};
