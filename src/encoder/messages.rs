use serde::{Deserialize, Serialize};

use crate::session::RecorderConfig;

/// Message sent from the session to the encoder task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EncoderCommand {
    /// First message on every channel: codec parameters and page policy
    #[serde(rename_all = "camelCase")]
    Configure {
        config: RecorderConfig,
        /// Rate the capture graph runs at, before resampling
        original_sample_rate: u32,
    },

    /// One capture buffer, one `Vec` per channel
    Encode { buffers: Vec<Vec<f32>> },

    /// Emit withheld and partially filled pages now
    Flush,

    /// Flush, acknowledge with [`EncoderReply::Done`] and shut down
    Done,
}

/// Message sent from the encoder task back to the session
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderReply {
    Page(Page),
    Error(String),
    Done,
}

/// One encoded output unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Position of this page in the encoder's output, starting at 0
    pub sequence: u64,
    /// Encoded bytes
    pub data: Vec<u8>,
}

impl Page {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_serialization() {
        let msg = EncoderCommand::Configure {
            config: RecorderConfig::default(),
            original_sample_rate: 44100,
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"command\":\"configure\""));
        assert!(json.contains("\"originalSampleRate\":44100"));
        assert!(json.contains("\"maxBuffersPerPage\":40"));
        assert!(json.contains("\"encoderPath\":\"encoderWorker.min.js\""));

        let deserialized: EncoderCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, msg);
    }

    #[test]
    fn test_done_marker() {
        let json = serde_json::to_string(&EncoderCommand::Done).unwrap();
        assert_eq!(json, r#"{"command":"done"}"#);
    }

    #[test]
    fn test_encode_deserialization() {
        let json = r#"{"command":"encode","buffers":[[0.0,0.5],[0.25,-0.5]]}"#;
        let msg: EncoderCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            EncoderCommand::Encode {
                buffers: vec![vec![0.0, 0.5], vec![0.25, -0.5]],
            }
        );
    }
}
