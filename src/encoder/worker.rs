use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::codec::{Codec, CodecParams};
use super::messages::{EncoderCommand, EncoderReply, Page};

/// When pages leave the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePolicy {
    /// Emit each page as soon as it is complete
    Stream,
    /// Hold complete pages until flush or done
    Batch,
}

/// Page assembly state for one encoder task
///
/// Receives encoder commands and turns them into replies. Encoded bytes are
/// accumulated until `max_buffers_per_page` capture buffers have gone into
/// the current page, then the page is cut.
pub struct PageAssembler {
    codec: Box<dyn Codec>,
    configured: bool,
    policy: PagePolicy,
    max_buffers_per_page: usize,
    pending: Vec<u8>,
    buffers_in_page: usize,
    withheld: Vec<Page>,
    next_sequence: u64,
    finished: bool,
}

impl PageAssembler {
    pub fn new(codec: Box<dyn Codec>) -> Self {
        Self {
            codec,
            configured: false,
            policy: PagePolicy::Batch,
            max_buffers_per_page: 1,
            pending: Vec::new(),
            buffers_in_page: 0,
            withheld: Vec::new(),
            next_sequence: 0,
            finished: false,
        }
    }

    /// Whether `done` has been processed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn policy(&self) -> PagePolicy {
        self.policy
    }

    /// Process one command and return the replies it produced, in order
    pub fn handle(&mut self, command: EncoderCommand) -> Vec<EncoderReply> {
        if self.finished {
            return vec![EncoderReply::Error(
                "encoder received a command after done".to_string(),
            )];
        }

        match command {
            EncoderCommand::Configure {
                config,
                original_sample_rate,
            } => {
                if self.configured {
                    return vec![EncoderReply::Error(
                        "encoder is already configured".to_string(),
                    )];
                }

                let params = CodecParams::from_config(&config, original_sample_rate);
                if let Err(e) = self.codec.configure(&params) {
                    return vec![EncoderReply::Error(e.to_string())];
                }

                self.policy = if config.stream_pages {
                    PagePolicy::Stream
                } else {
                    PagePolicy::Batch
                };
                self.max_buffers_per_page = config.max_buffers_per_page.max(1);
                self.configured = true;

                info!(
                    "Encoder configured: {}Hz -> {}Hz, {} channels, {} buffers/page, {:?}",
                    params.input_sample_rate,
                    params.output_sample_rate,
                    params.channels,
                    self.max_buffers_per_page,
                    self.policy
                );

                Vec::new()
            }

            EncoderCommand::Encode { buffers } => {
                if !self.configured {
                    return vec![EncoderReply::Error(
                        "encoder received audio before configure".to_string(),
                    )];
                }

                let mut replies = Vec::new();
                match self.codec.encode(&buffers) {
                    Ok(bytes) => self.pending.extend_from_slice(&bytes),
                    Err(e) => replies.push(EncoderReply::Error(e.to_string())),
                }

                // A failed buffer still counts toward the page cadence
                self.buffers_in_page += 1;
                if self.buffers_in_page >= self.max_buffers_per_page {
                    let page = self.cut_page();
                    match self.policy {
                        PagePolicy::Stream => replies.push(EncoderReply::Page(page)),
                        PagePolicy::Batch => self.withheld.push(page),
                    }
                }

                replies
            }

            EncoderCommand::Flush => {
                if !self.configured {
                    return vec![EncoderReply::Error(
                        "encoder flushed before configure".to_string(),
                    )];
                }
                self.release(false)
            }

            EncoderCommand::Done => {
                let mut replies = if self.configured {
                    self.release(true)
                } else {
                    Vec::new()
                };
                self.finished = true;
                replies.push(EncoderReply::Done);
                replies
            }
        }
    }

    /// Withheld pages first, then whatever is pending
    fn release(&mut self, finish_codec: bool) -> Vec<EncoderReply> {
        let mut replies: Vec<EncoderReply> = self
            .withheld
            .drain(..)
            .map(EncoderReply::Page)
            .collect();

        if finish_codec {
            match self.codec.finish() {
                Ok(bytes) => self.pending.extend_from_slice(&bytes),
                Err(e) => replies.push(EncoderReply::Error(e.to_string())),
            }
        }

        if self.buffers_in_page > 0 || !self.pending.is_empty() {
            replies.push(EncoderReply::Page(self.cut_page()));
        }

        replies
    }

    fn cut_page(&mut self) -> Page {
        let page = Page {
            sequence: self.next_sequence,
            data: std::mem::take(&mut self.pending),
        };
        debug!(
            "Page {} cut ({} buffers, {} bytes)",
            page.sequence,
            self.buffers_in_page,
            page.data.len()
        );
        self.next_sequence += 1;
        self.buffers_in_page = 0;
        page
    }
}

/// Background encode task
///
/// Runs until `done` is processed or the session drops its sender.
pub async fn run_encoder(
    codec: Box<dyn Codec>,
    mut commands: mpsc::UnboundedReceiver<EncoderCommand>,
    replies: mpsc::UnboundedSender<EncoderReply>,
) {
    let mut assembler = PageAssembler::new(codec);
    info!("Encoder task started");

    while let Some(command) = commands.recv().await {
        for reply in assembler.handle(command) {
            if replies.send(reply).is_err() {
                warn!("Session stopped listening; encoder task exiting");
                return;
            }
        }

        if assembler.is_finished() {
            break;
        }
    }

    info!("Encoder task stopped");
}
