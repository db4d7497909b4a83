use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::RecordingState;

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: RecordingState,

    /// When the current (or last) recording started
    pub started_at: Option<DateTime<Utc>>,

    /// When the last recording stopped; `None` while one is running
    pub stopped_at: Option<DateTime<Utc>>,

    /// Seconds from `started_at` to `stopped_at` (or now while recording),
    /// 0 before the first start
    pub duration_secs: f64,

    /// Capture buffers forwarded to the encoder
    pub buffers_sent: usize,

    /// Pages delivered as `dataAvailable` events
    pub pages_received: usize,

    /// Device streams acquired over the session's lifetime
    pub stream_acquisitions: usize,
}
