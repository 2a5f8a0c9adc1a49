use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chat::{FileRef, MessageRef};

/// One accepted video, waiting to be trimmed
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// The message that carried the video; results are sent as replies to it
    pub source: MessageRef,
    pub video: FileRef,
    /// Caption of the source message, used when no override is set
    pub caption: Option<String>,
    pub file_name: String,
}

impl Job {
    /// Create a job for a video message. Without a usable file name one is
    /// derived from the current time.
    pub fn new(
        source: MessageRef,
        video: FileRef,
        caption: Option<String>,
        file_name: Option<&str>,
    ) -> Self {
        let file_name = file_name
            .and_then(sanitize_file_name)
            .unwrap_or_else(fallback_file_name);

        Self {
            source,
            video,
            caption,
            file_name,
        }
    }

    /// Scratch paths for this job under `download_dir`
    pub fn paths(&self, download_dir: &Path, token: &str) -> JobPaths {
        JobPaths {
            download: download_dir.join(&self.file_name),
            trimmed: download_dir.join(format!("trimmed_{}", self.file_name)),
            thumbnail: download_dir.join(format!("thumb_{token}.jpg")),
        }
    }
}

/// Every file a job may create. All of them are removed when the job ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub download: PathBuf,
    pub trimmed: PathBuf,
    pub thumbnail: PathBuf,
}

impl JobPaths {
    pub fn all(&self) -> [&Path; 3] {
        [&self.download, &self.trimmed, &self.thumbnail]
    }
}

/// Keep only the final path component so a crafted name cannot escape the
/// scratch directory.
fn sanitize_file_name(name: &str) -> Option<String> {
    match Path::new(name.trim()).components().next_back()? {
        Component::Normal(part) => part.to_str().map(str::to_string),
        _ => None,
    }
}

fn fallback_file_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("video_{secs}.mp4")
}
