//! The single consumer of the job queue.
//!
//! Jobs run strictly one at a time: download, trim, optional thumbnail
//! fetch, upload. Whatever the outcome, the job's files are removed and its
//! token leaves the task registry before the next job is dequeued.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::chat::{ChatPlatform, MessageRef, VideoUpload};
use crate::config::Config;
use crate::error::{ChatError, JobError, JobResult, TrimError};
use crate::ffmpeg::Trimmer;
use crate::job::{Job, JobPaths};
use crate::progress::{NoProgress, ProgressReporter};
use crate::queue::JobConsumer;
use crate::registry::TaskRegistry;
use crate::settings::{Settings, SettingsStore};

const DOWNLOAD_LABEL: &str = "Downloading 📥";
const UPLOAD_LABEL: &str = "Uploading 📤";

/// How a job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
    /// Carries the text shown to the user
    Failed(String),
}

pub fn cancelled_text(token: &str) -> String {
    format!("✅ Operation cancelled by user ({token}).")
}

pub fn trim_failed_text(stderr: &str) -> String {
    format!("❌ Failed to trim video.\n\nError:\n{stderr}")
}

pub fn too_large_text(detail: &str) -> String {
    format!(
        "❌ This video is too large to transfer ({detail}).\n\n\
Run the bot against a self-hosted Bot API server (BOT_API_URL) to handle files up to 2000 MB."
    )
}

pub fn unexpected_error_text(error: &JobError) -> String {
    format!("❌ An unexpected error occurred: {error}")
}

/// Runs queued jobs through the trim pipeline
pub struct Worker {
    chat: Arc<dyn ChatPlatform>,
    settings: SettingsStore,
    registry: TaskRegistry,
    trimmer: Trimmer,
    download_dir: PathBuf,
    progress_interval: Duration,
    phase_timeout: Option<Duration>,
}

impl Worker {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        settings: SettingsStore,
        registry: TaskRegistry,
        config: &Config,
    ) -> Self {
        Self {
            chat,
            settings,
            registry,
            trimmer: Trimmer::new(&config.ffmpeg_path),
            download_dir: config.download_dir.clone(),
            progress_interval: config.progress_interval(),
            phase_timeout: config.phase_timeout(),
        }
    }

    /// Process jobs until every queue handle is dropped. A failing job never
    /// stops the loop.
    pub async fn run(&self, mut consumer: JobConsumer) {
        info!(
            "✅ Worker started, scratch directory {:?}",
            self.download_dir
        );

        while let Some(claimed) = consumer.dequeue().await {
            let outcome = self.process(&claimed.job).await;
            debug!("Job from {} finished: {:?}", claimed.job.source, outcome);
            claimed.complete();
        }

        info!("🛑 Job queue closed, worker stopping");
    }

    /// Run one job to a terminal state
    pub async fn process(&self, job: &Job) -> JobOutcome {
        let registration = self.registry.register_new();
        let token = registration.token().to_string();
        let span = info_span!("job", token = %token);

        async {
            info!("➡️ Processing {:?} from {}", job.file_name, job.source);

            let status = match self.chat.reply(job.source, "Initializing...").await {
                Ok(status) => status,
                Err(e) => {
                    error!("Could not post status message: {}", e);
                    return JobOutcome::Failed(e.to_string());
                }
            };

            // Settings are read once per job; later changes apply to the next one
            let settings = self.settings.snapshot().await;
            let paths = job.paths(&self.download_dir, &token);

            let result = self
                .run_pipeline(job, &settings, &paths, status, &token, registration.cancellation())
                .await;
            let outcome = self.finish(status, &token, result).await;

            self.cleanup(&paths).await;
            outcome
        }
        .instrument(span)
        .await
        // `registration` drops here and removes the token
    }

    async fn run_pipeline(
        &self,
        job: &Job,
        settings: &Settings,
        paths: &JobPaths,
        status: MessageRef,
        token: &str,
        cancel: &CancellationToken,
    ) -> JobResult<()> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let chat = self.chat.as_ref();
        let mut progress =
            ProgressReporter::new(chat, status, DOWNLOAD_LABEL, token, self.progress_interval);
        self.phase("download", cancel, async {
            chat.download(&job.video, &paths.download, &mut progress)
                .await
                .map_err(JobError::from)
        })
        .await?;
        debug!("Downloaded to {:?}", paths.download);

        self.edit_status(status, "✂️ Trimming video...").await?;
        // The media tool will not overwrite an output left by an interrupted run
        remove_if_exists(&paths.trimmed).await;
        self.phase("trim", cancel, async {
            self.trimmer
                .trim(&paths.download, &settings.trim, &paths.trimmed)
                .await
                .map_err(JobError::from)
        })
        .await?;

        let thumbnail = match &settings.thumbnail {
            Some(file) => {
                self.edit_status(status, "🖼️ Downloading thumbnail...").await?;
                self.phase("thumbnail", cancel, async {
                    chat.download(file, &paths.thumbnail, &mut NoProgress)
                        .await
                        .map_err(JobError::from)
                })
                .await?;
                Some(paths.thumbnail.clone())
            }
            None => None,
        };

        let upload = VideoUpload {
            path: paths.trimmed.clone(),
            caption: settings.caption.clone().or_else(|| job.caption.clone()),
            thumbnail,
            reply_to: job.source,
        };
        let mut progress =
            ProgressReporter::new(chat, status, UPLOAD_LABEL, token, self.progress_interval);
        self.phase("upload", cancel, async {
            chat.send_video(upload, &mut progress)
                .await
                .map_err(JobError::from)
        })
        .await?;

        Ok(())
    }

    /// Run one pipeline step, stopping early on cancellation or timeout.
    /// Dropping the step's future aborts it, which also kills a running
    /// media tool.
    async fn phase<T, F>(
        &self,
        name: &'static str,
        cancel: &CancellationToken,
        step: F,
    ) -> JobResult<T>
    where
        F: Future<Output = JobResult<T>>,
    {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let bounded = async {
            match self.phase_timeout {
                Some(limit) => tokio::time::timeout(limit, step)
                    .await
                    .unwrap_or_else(|_| {
                        Err(JobError::TimedOut {
                            phase: name,
                            secs: limit.as_secs(),
                        })
                    }),
                None => step.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("🛑 Cancelled during {}", name);
                Err(JobError::Cancelled)
            }
            result = bounded => result,
        }
    }

    async fn edit_status(&self, status: MessageRef, text: &str) -> Result<(), ChatError> {
        match self.chat.edit_text(status, text).await {
            Err(ChatError::MessageNotModified) => Ok(()),
            other => other,
        }
    }

    /// Report the terminal state on the status message
    async fn finish(&self, status: MessageRef, token: &str, result: JobResult<()>) -> JobOutcome {
        let (outcome, text) = match result {
            Ok(()) => {
                info!("✅ Job completed");
                if let Err(e) = self.chat.delete(status).await {
                    warn!("Failed to delete status message: {}", e);
                }
                return JobOutcome::Completed;
            }
            Err(JobError::Cancelled) => {
                info!("Job cancelled");
                (JobOutcome::Cancelled, cancelled_text(token))
            }
            Err(JobError::Trim(TrimError::Failed { stderr, .. })) => {
                let text = trim_failed_text(&stderr);
                (JobOutcome::Failed(text.clone()), text)
            }
            Err(JobError::Chat(ChatError::FileTooLarge(detail))) => {
                warn!("File too large: {}", detail);
                let text = too_large_text(&detail);
                (JobOutcome::Failed(text.clone()), text)
            }
            Err(e) => {
                error!("❌ Job failed: {}", e);
                let text = unexpected_error_text(&e);
                (JobOutcome::Failed(text.clone()), text)
            }
        };

        if let Err(e) = self.edit_status(status, &text).await {
            warn!("Failed to update status message: {}", e);
        }
        outcome
    }

    /// Remove every file the job may have created
    async fn cleanup(&self, paths: &JobPaths) {
        for path in paths.all() {
            remove_if_exists(path).await;
        }
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {:?}: {}", path, e),
    }
}
