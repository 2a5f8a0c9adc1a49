#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use trimbot::chat::{
    ChatId, ChatPlatform, FileRef, IncomingMessage, MessageId, MessageRef, UserId,
    VideoAttachment, VideoUpload,
};
use trimbot::commands::CommandHandler;
use trimbot::config::{AdminList, Config};
use trimbot::error::ChatError;
use trimbot::progress::TransferProgress;
use trimbot::queue::JobQueue;
use trimbot::registry::TaskRegistry;
use trimbot::settings::{Settings, SettingsStore};
use trimbot::worker::Worker;

pub const ADMIN: UserId = UserId(1);
pub const CHAT: ChatId = ChatId(100);

/// What the fake platform saw of one upload
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub reply_to: MessageRef,
    pub caption: Option<String>,
    pub file_name: String,
    pub content: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
}

/// In-memory chat platform.
///
/// Files are served from `files`; a file id listed in `stall` writes half its
/// content and then never finishes, a file id in `fail_download` errors out
/// and one in `oversize` is refused like a file over the Bot API limit.
#[derive(Default)]
pub struct FakeChat {
    next_id: AtomicI32,
    files: Mutex<HashMap<String, Vec<u8>>>,
    stall: Mutex<HashSet<String>>,
    fail_download: Mutex<HashSet<String>>,
    oversize: Mutex<HashSet<String>>,
    fail_upload: Mutex<bool>,
    stall_upload: Mutex<bool>,
    texts: Mutex<HashMap<MessageRef, String>>,
    history: Mutex<Vec<(MessageRef, String)>>,
    deleted: Mutex<Vec<MessageRef>>,
    uploads: Mutex<Vec<UploadRecord>>,
}

impl FakeChat {
    pub fn add_file(&self, id: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(id.to_string(), content.to_vec());
    }

    pub fn stall_on(&self, id: &str) {
        self.stall.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_download_of(&self, id: &str) {
        self.fail_download.lock().unwrap().insert(id.to_string());
    }

    pub fn oversize_on(&self, id: &str) {
        self.oversize.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_uploads(&self) {
        *self.fail_upload.lock().unwrap() = true;
    }

    /// Uploads report half their bytes and then hang
    pub fn stall_uploads(&self) {
        *self.stall_upload.lock().unwrap() = true;
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.uploads.lock().unwrap().clone()
    }

    /// Every text a status message has shown, in order
    pub fn history(&self) -> Vec<(MessageRef, String)> {
        self.history.lock().unwrap().clone()
    }

    /// Texts shown on messages that replied to `source`
    pub fn statuses_for(&self, source: MessageRef) -> Vec<String> {
        let status_ids: Vec<MessageRef> = self
            .history()
            .iter()
            .filter(|(_, text)| text == &format!("reply-to:{}", source))
            .map(|(message, _)| *message)
            .collect();
        self.history()
            .into_iter()
            .filter(|(message, text)| {
                status_ids.contains(message) && !text.starts_with("reply-to:")
            })
            .map(|(_, text)| text)
            .collect()
    }

    pub fn current_text(&self, message: MessageRef) -> Option<String> {
        self.texts.lock().unwrap().get(&message).cloned()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn reply(&self, reply_to: MessageRef, text: &str) -> Result<MessageRef, ChatError> {
        let message = MessageRef {
            chat: reply_to.chat,
            id: MessageId(10_000 + self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        {
            let mut history = self.history.lock().unwrap();
            history.push((message, format!("reply-to:{}", reply_to)));
            history.push((message, text.to_string()));
        }
        self.texts.lock().unwrap().insert(message, text.to_string());
        Ok(message)
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), ChatError> {
        let mut texts = self.texts.lock().unwrap();
        if texts.get(&message).map(String::as_str) == Some(text) {
            return Err(ChatError::MessageNotModified);
        }
        texts.insert(message, text.to_string());
        self.history
            .lock()
            .unwrap()
            .push((message, text.to_string()));
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), ChatError> {
        self.texts.lock().unwrap().remove(&message);
        self.deleted.lock().unwrap().push(message);
        Ok(())
    }

    async fn download(
        &self,
        file: &FileRef,
        dest: &Path,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), ChatError> {
        if self.fail_download.lock().unwrap().contains(&file.id) {
            return Err(ChatError::Transfer(format!("{} is gone", file.id)));
        }
        if self.oversize.lock().unwrap().contains(&file.id) {
            return Err(ChatError::FileTooLarge(
                "30.0 MB, the Bot API server accepts at most 20 MB".into(),
            ));
        }
        let content = self
            .files
            .lock()
            .unwrap()
            .get(&file.id)
            .cloned()
            .ok_or_else(|| ChatError::Api(format!("unknown file {}", file.id)))?;
        let total = content.len() as u64;

        if self.stall.lock().unwrap().contains(&file.id) {
            let half = content.len() / 2;
            tokio::fs::write(dest, &content[..half]).await?;
            progress.report(half as u64, total).await?;
            std::future::pending::<()>().await;
        }

        tokio::fs::write(dest, &content).await?;
        progress.report(total, total).await
    }

    async fn send_video(
        &self,
        upload: VideoUpload,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), ChatError> {
        if *self.fail_upload.lock().unwrap() {
            return Err(ChatError::Transfer("connection reset".into()));
        }
        let content = tokio::fs::read(&upload.path).await?;
        if *self.stall_upload.lock().unwrap() {
            let total = content.len() as u64;
            progress.report(total / 2, total).await?;
            std::future::pending::<()>().await;
        }
        let thumbnail = match &upload.thumbnail {
            Some(path) => Some(tokio::fs::read(path).await?),
            None => None,
        };
        progress
            .report(content.len() as u64, content.len() as u64)
            .await?;

        self.uploads.lock().unwrap().push(UploadRecord {
            reply_to: upload.reply_to,
            caption: upload.caption,
            file_name: upload
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content,
            thumbnail,
        });
        Ok(())
    }
}

/// Write an executable shell script standing in for ffmpeg
pub fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Copies the input to the output and appends its arguments to `args_log`.
///
/// Like ffmpeg without `-y` it refuses to overwrite an existing output. Inputs
/// named `*bad*` fail with "invalid time"; inputs named `*slow*` write a
/// partial output, sleep two seconds and touch `finished` before copying.
pub fn trim_tool(dir: &Path, args_log: &Path, finished: &Path) -> PathBuf {
    write_tool(
        dir,
        "fake-ffmpeg.sh",
        &format!(
            r#"echo "$@" >> "{log}"
for last; do :; done
if [ -e "$last" ]; then
  echo "File '$last' already exists. Exiting." >&2
  exit 1
fi
case "$(basename "$2")" in
  *bad*) echo "invalid time" >&2; exit 1 ;;
  *slow*) echo partial > "$last"; sleep 2; touch "{finished}"; rm "$last" ;;
esac
cp "$2" "$last""#,
            log = args_log.display(),
            finished = finished.display()
        ),
    )
}

/// A running bot without the Telegram layer. The worker starts right away.
pub struct Harness {
    pub temp_dir: TempDir,
    pub chat: Arc<FakeChat>,
    pub settings: SettingsStore,
    pub registry: TaskRegistry,
    handler: Option<CommandHandler>,
    worker: Option<JoinHandle<()>>,
    args_log: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let args_log = temp_dir.path().join("args.log");
        let tool = trim_tool(
            temp_dir.path(),
            &args_log,
            &temp_dir.path().join("tool-finished"),
        );
        let config = Config {
            download_dir: temp_dir.path().join("downloads"),
            ffmpeg_path: tool,
            admins: AdminList::new([ADMIN.0]),
            ..Config::default()
        };

        let chat = Arc::new(FakeChat::default());
        let settings = SettingsStore::new(Settings::new(config.default_start_time.clone()));
        let registry = TaskRegistry::new();
        let (queue, consumer) = JobQueue::unbounded();
        let handler = CommandHandler::new(
            settings.clone(),
            registry.clone(),
            queue,
            config.admins.clone(),
        );
        let worker = Worker::new(chat.clone(), settings.clone(), registry.clone(), &config);
        let worker = tokio::spawn(async move { worker.run(consumer).await });

        Self {
            temp_dir,
            chat,
            settings,
            registry,
            handler: Some(handler),
            worker: Some(worker),
            args_log,
        }
    }

    pub fn handler(&self) -> &CommandHandler {
        self.handler.as_ref().expect("harness already shut down")
    }

    pub fn download_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    /// Files left in the scratch directory
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.download_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Argument lines the fake media tool was started with, one per run
    /// Whether a slow media tool run reached its end
    pub fn tool_finished(&self) -> bool {
        self.temp_dir.path().join("tool-finished").exists()
    }

    /// The cancellation token shown in the job's progress messages
    pub fn token_for(&self, source: MessageRef) -> Option<String> {
        self.chat
            .statuses_for(source)
            .iter()
            .find_map(|status| token_in(status).map(str::to_string))
    }

    pub fn logged_args(&self) -> Vec<String> {
        std::fs::read_to_string(&self.args_log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Send a video message from the admin and return its reference
    pub async fn send_video(
        &self,
        id: i32,
        file_id: &str,
        name: &str,
        caption: Option<&str>,
    ) -> MessageRef {
        let source = MessageRef {
            chat: CHAT,
            id: MessageId(id),
        };
        let mut message = IncomingMessage::new(source, Some(ADMIN));
        message.caption = caption.map(str::to_string);
        message.video = Some(VideoAttachment {
            file: FileRef::new(file_id, 0),
            file_name: Some(name.to_string()),
        });
        let reply = self.handler().handle(&message).await;
        assert!(reply.is_some_and(|reply| reply.contains("added to the queue")));
        source
    }

    pub async fn command(&self, text: &str) -> Option<String> {
        self.handler().handle(&admin_text(text)).await
    }

    /// Close the queue and wait for the worker to drain it
    pub async fn shutdown(&mut self) {
        // The handler owns the last producer handle
        self.handler.take();
        if let Some(worker) = self.worker.take() {
            tokio::time::timeout(Duration::from_secs(30), worker)
                .await
                .expect("worker did not drain the queue")
                .unwrap();
        }
    }
}

pub fn admin_text(text: &str) -> IncomingMessage {
    IncomingMessage::new(
        MessageRef {
            chat: CHAT,
            id: MessageId(1),
        },
        Some(ADMIN),
    )
    .with_text(text)
}

/// Pull the cancellation token out of a progress status text
pub fn token_in(status: &str) -> Option<&str> {
    status
        .lines()
        .last()
        .and_then(|line| line.strip_prefix("To cancel, use: /cancel "))
}

/// Poll `condition` until it holds or a few seconds pass
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
