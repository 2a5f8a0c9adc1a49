use clap::Args;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::chat::UserId;
use crate::settings::TimeOffset;

/// User ids allowed to operate the bot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminList {
    ids: HashSet<u64>,
}

impl AdminList {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Parse a comma-separated list of numeric ids. Blank entries are skipped.
    pub fn parse(value: &str) -> Result<Self, String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| format!("invalid admin id '{part}'"))
            })
            .collect::<Result<HashSet<_>, _>>()
            .map(|ids| Self { ids })
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.ids.contains(&user.0)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Process configuration, read once at startup from flags or environment
/// variables (a `.env` file is loaded first by the binary).
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Bot token issued by the chat platform
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Self-hosted Bot API server. Without it the hosted API limits
    /// downloads to 20 MB and uploads to 50 MB.
    #[arg(long, env = "BOT_API_URL")]
    pub bot_api_url: Option<Url>,

    /// Comma-separated user ids allowed to use the bot
    #[arg(long, env = "ADMINS", default_value = "", value_parser = AdminList::parse)]
    pub admins: AdminList,

    /// Port of the liveness endpoint
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Scratch directory for downloads and trimmed files
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "downloads")]
    pub download_dir: PathBuf,

    /// Media tool executable
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: PathBuf,

    /// Trim start used until an admin runs /set_time
    #[arg(long, env = "DEFAULT_START_TIME", default_value = "00:00:20")]
    pub default_start_time: TimeOffset,

    /// Minimum seconds between two progress edits
    #[arg(long, env = "PROGRESS_INTERVAL_SECS", default_value_t = 5)]
    pub progress_interval_secs: u64,

    /// Abort a download, trim or upload that runs longer than this
    #[arg(long, env = "PHASE_TIMEOUT_SECS")]
    pub phase_timeout_secs: Option<u64>,
}

impl Config {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_api_url: None,
            admins: AdminList::default(),
            port: 8080,
            download_dir: PathBuf::from("downloads"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            default_start_time: TimeOffset::default(),
            progress_interval_secs: 5,
            phase_timeout_secs: None,
        }
    }
}
