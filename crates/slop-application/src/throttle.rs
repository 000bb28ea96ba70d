//! Render throttling for streamed text.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Default spacing between incremental renders.
pub const DEFAULT_RENDER_INTERVAL: Duration = Duration::from_millis(50);

/// Coalesces bursts of deltas into at most one render per interval.
///
/// The first delta after a render schedules the next render one interval
/// later; further deltas before that deadline only mark the buffer dirty.
/// Callers must [`flush`](Self::flush) when the stream ends so the final
/// text is never stuck behind the window.
#[derive(Debug)]
pub struct RenderThrottle {
    interval: Duration,
    deadline: Option<Instant>,
}

impl RenderThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Records new pending text, scheduling a render if none is scheduled.
    pub fn mark_dirty(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.interval);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves at the scheduled render time; never resolves when idle.
    pub async fn due(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Marks the pending render as done.
    pub fn rendered(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` if a render was pending, clearing it.
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for RenderThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_INTERVAL)
    }
}
