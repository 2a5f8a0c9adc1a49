use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::debug;

use crate::chat::FileRef;
use crate::error::SettingsError;

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d+:\d{1,2}(?::\d{1,2})?(?:\.\d+)?$").expect("time pattern is valid")
    })
}

/// A trim offset in `HH:MM:SS` or `MM:SS` form, kept as the literal string
/// the admin typed so it is passed to the media tool unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeOffset(String);

impl TimeOffset {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TimeOffset {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if time_pattern().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(SettingsError::InvalidTime(s.to_string()))
        }
    }
}

impl Default for TimeOffset {
    /// Skip the first twenty seconds
    fn default() -> Self {
        Self("00:00:20".to_string())
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Start and optional end of the cut. No end means "to the end of the source".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimRange {
    pub start: TimeOffset,
    pub end: Option<TimeOffset>,
}

impl TrimRange {
    pub fn new(start: TimeOffset, end: Option<TimeOffset>) -> Self {
        Self { start, end }
    }
}

/// Process-wide trim settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub trim: TrimRange,
    /// Replaces the source caption when set
    pub caption: Option<String>,
    /// Replaces the platform-generated thumbnail when set
    pub thumbnail: Option<FileRef>,
}

impl Settings {
    pub fn new(start: TimeOffset) -> Self {
        Self {
            trim: TrimRange::new(start, None),
            caption: None,
            thumbnail: None,
        }
    }
}

/// Shared accessor over the global [`Settings`].
///
/// Writers are the command handlers, the reader is the worker, which takes a
/// [`snapshot`](Self::snapshot) when it dequeues a job. Last write wins.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub async fn snapshot(&self) -> Settings {
        self.inner.read().await.clone()
    }

    pub async fn set_trim(&self, trim: TrimRange) {
        debug!("Trim range set to {:?}", trim);
        self.inner.write().await.trim = trim;
    }

    pub async fn set_caption(&self, caption: Option<String>) {
        debug!("Caption override set: {}", caption.is_some());
        self.inner.write().await.caption = caption;
    }

    pub async fn set_thumbnail(&self, thumbnail: Option<FileRef>) {
        debug!("Thumbnail override set: {}", thumbnail.is_some());
        self.inner.write().await.thumbnail = thumbnail;
    }
}
