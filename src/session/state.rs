use std::fmt;

use serde::{Deserialize, Serialize};

/// Recording state of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Not recording; the initial state
    #[default]
    Inactive,
    /// Buffers are forwarded to the encoder
    Recording,
    /// The encoder is running but buffers are dropped
    Paused,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Recording => "recording",
            Self::Paused => "paused",
        }
    }

    /// Recording or paused
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(RecordingState::default(), RecordingState::Inactive);
        assert_eq!(RecordingState::Recording.to_string(), "recording");
        assert_eq!(
            serde_json::to_string(&RecordingState::Paused).unwrap(),
            "\"paused\""
        );
        assert!(!RecordingState::Inactive.is_active());
        assert!(RecordingState::Paused.is_active());
    }
}
