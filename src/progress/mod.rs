use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::chat::{ChatPlatform, MessageRef};
use crate::error::ChatError;

/// Default minimum gap between two status edits
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

const BAR_SEGMENTS: usize = 10;
const MIB: f64 = 1024.0 * 1024.0;

/// Receives byte counts from a running transfer.
#[async_trait]
pub trait TransferProgress: Send {
    async fn report(&mut self, current: u64, total: u64) -> Result<(), ChatError>;
}

/// Discards progress
pub struct NoProgress;

#[async_trait]
impl TransferProgress for NoProgress {
    async fn report(&mut self, _current: u64, _total: u64) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Turns high-frequency transfer callbacks into at most one status edit per
/// interval.
///
/// One reporter covers one phase (download or upload) of one job.
pub struct ProgressReporter<'a> {
    chat: &'a dyn ChatPlatform,
    status: MessageRef,
    label: &'a str,
    token: &'a str,
    interval: Duration,
    last_update: Option<Instant>,
    last_bytes: u64,
    last_sample: Instant,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        chat: &'a dyn ChatPlatform,
        status: MessageRef,
        label: &'a str,
        token: &'a str,
        interval: Duration,
    ) -> Self {
        Self {
            chat,
            status,
            label,
            token,
            interval,
            last_update: None,
            last_bytes: 0,
            last_sample: Instant::now(),
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.last_update
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }
}

#[async_trait]
impl<'a> TransferProgress for ProgressReporter<'a> {
    async fn report(&mut self, current: u64, total: u64) -> Result<(), ChatError> {
        let now = Instant::now();
        if !self.due(now) {
            trace!("Progress {}/{} throttled", current, total);
            return Ok(());
        }

        let elapsed = now.duration_since(self.last_sample).as_secs_f64();
        let speed = if elapsed > 0.0 {
            current.saturating_sub(self.last_bytes) as f64 / elapsed / MIB
        } else {
            0.0
        };

        let text = render_status(self.label, percentage(current, total), speed, self.token);
        match self.chat.edit_text(self.status, &text).await {
            Ok(()) => {}
            Err(ChatError::MessageNotModified) => debug!("Status unchanged, edit skipped"),
            Err(e) => return Err(e),
        }

        self.last_update = Some(now);
        self.last_bytes = current;
        self.last_sample = now;
        Ok(())
    }
}

/// `current` as a percentage of `total`. An unknown total reads as 0%.
pub fn percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    current as f64 * 100.0 / total as f64
}

/// Ten-segment bar, one filled segment per full 10%
pub fn progress_bar(percentage: f64) -> String {
    let filled = ((percentage / 10.0).floor().max(0.0) as usize).min(BAR_SEGMENTS);
    format!(
        "[{}{}]",
        "◉".repeat(filled),
        "○".repeat(BAR_SEGMENTS - filled)
    )
}

pub fn render_status(label: &str, percentage: f64, speed_mib: f64, token: &str) -> String {
    format!(
        "{label}...\n{} {percentage:.1}%\nSpeed: {speed_mib:.2} MB/s\n\nTo cancel, use: /cancel {token}",
        progress_bar(percentage)
    )
}
