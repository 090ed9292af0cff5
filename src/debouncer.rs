use std::time::{Duration, Instant};

/// Holds back a value until a period of inactivity has passed.
/// Triggering again restarts the wait and replaces the held value, so only
/// the latest one is ever released.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    /// The duration to wait after the last trigger
    delay: Duration,
    /// When the last trigger occurred
    last_event: Option<Instant>,
    /// The value waiting to be released
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    /// Create a new debouncer with the specified delay in milliseconds
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            last_event: None,
            pending: None,
        }
    }

    /// Register a new value, superseding any pending one
    pub fn trigger(&mut self, value: T) {
        self.last_event = Some(Instant::now());
        self.pending = Some(value);
    }

    /// The pending value, if the delay has elapsed since the last trigger
    pub fn take_ready(&mut self) -> Option<T> {
        let last = self.last_event?;
        if last.elapsed() >= self.delay {
            self.last_event = None;
            return self.pending.take();
        }
        None
    }

    /// Get the time remaining before the pending value is released
    /// Returns None if nothing is pending
    pub fn time_remaining(&self) -> Option<Duration> {
        self.pending.as_ref()?;
        self.last_event
            .map(|last| self.delay.saturating_sub(last.elapsed()))
    }

    /// Wait out the remaining delay and release the pending value
    pub async fn settle(&mut self) -> Option<T> {
        if let Some(remaining) = self.time_remaining() {
            tokio::time::sleep(remaining).await;
        }
        self.take_ready()
    }

    /// Drop the pending value
    pub fn reset(&mut self) {
        self.last_event = None;
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
