//! Platform-neutral view of the chat client.
//!
//! The worker and command handlers only talk to [`ChatPlatform`]; the
//! Telegram adapter in [`crate::telegram`] is the production implementation.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ChatError;
use crate::progress::TransferProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// Address of a message that can later be edited or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat: ChatId,
    pub id: MessageId,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat.0, self.id.0)
    }
}

/// Remote file handle as issued by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub id: String,
    pub size: u64,
}

impl FileRef {
    pub fn new(id: impl Into<String>, size: u64) -> Self {
        Self {
            id: id.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoAttachment {
    pub file: FileRef,
    pub file_name: Option<String>,
}

/// An inbound message, reduced to what the bot looks at.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message: MessageRef,
    pub from: Option<UserId>,
    pub first_name: Option<String>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub video: Option<VideoAttachment>,
    /// Largest photo of the replied-to message, if it has one
    pub reply_photo: Option<FileRef>,
}

impl IncomingMessage {
    pub fn new(message: MessageRef, from: Option<UserId>) -> Self {
        Self {
            message,
            from,
            first_name: None,
            text: None,
            caption: None,
            video: None,
            reply_photo: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Everything needed to send the trimmed video back.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub path: PathBuf,
    pub caption: Option<String>,
    pub thumbnail: Option<PathBuf>,
    pub reply_to: MessageRef,
}

/// Operations the bot needs from the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Reply to `reply_to` in its chat and return the new message.
    async fn reply(&self, reply_to: MessageRef, text: &str) -> Result<MessageRef, ChatError>;

    /// Replace the text of a message. Identical content fails with
    /// [`ChatError::MessageNotModified`].
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), ChatError>;

    async fn delete(&self, message: MessageRef) -> Result<(), ChatError>;

    /// Download a remote file to `dest`, reporting progress as bytes arrive.
    async fn download(
        &self,
        file: &FileRef,
        dest: &Path,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), ChatError>;

    async fn send_video(
        &self,
        upload: VideoUpload,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), ChatError>;
}
