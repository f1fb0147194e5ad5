use std::collections::HashMap;

/// Point-in-time copy of a task's transfer state. The engine hands these
/// out by value, so the renderer never observes a half-updated counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    /// `None` when the server did not report a usable size.
    pub total_size: Option<u64>,
    pub speed_bps: u64,
}

impl ProgressSnapshot {
    /// Snapshot for a task that has not produced any data yet.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Completion ratio clamped to [0, 1]. Unknown size counts as 0.
    pub fn ratio(&self) -> f64 {
        match self.total_size {
            Some(total) if total > 0 => (self.downloaded as f64 / total as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

/// A resolved download source plus the request headers to use against it.
#[derive(Debug, Clone)]
pub struct Resource {
    pub uri: String,
    pub headers: HashMap<String, String>,
}

/// One planned fragment of a ranged transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub len: u64,
}
