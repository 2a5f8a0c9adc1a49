//! Telegram Bot API implementation of [`ChatPlatform`].

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::payloads::{SendMessageSetters, SendVideoSetters};
use teloxide::prelude::*;
use teloxide::types::{InputFile, ReplyParameters};
use teloxide::{ApiError, RequestError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::chat::{
    self, ChatPlatform, FileRef, IncomingMessage, MessageRef, UserId, VideoAttachment, VideoUpload,
};
use crate::commands::CommandHandler;
use crate::config::Config;
use crate::error::ChatError;
use crate::progress::TransferProgress;

fn tg_chat(chat: chat::ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat.0)
}

fn tg_message(id: chat::MessageId) -> teloxide::types::MessageId {
    teloxide::types::MessageId(id.0)
}

const MB: u64 = 1024 * 1024;

fn map_error(error: RequestError) -> ChatError {
    match error {
        RequestError::Api(ApiError::MessageNotModified) => ChatError::MessageNotModified,
        RequestError::Network(e) => ChatError::Transfer(e.to_string()),
        other => {
            let text = other.to_string();
            if is_size_rejection(&text) {
                ChatError::FileTooLarge(text)
            } else {
                ChatError::Api(text)
            }
        }
    }
}

/// Bot API wording for "file is too big" (getFile) and HTTP 413 (uploads)
fn is_size_rejection(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("file is too big") || text.contains("too large")
}

/// File size limits of the Bot API server in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    pub download: u64,
    pub upload: u64,
}

impl TransferLimits {
    /// api.telegram.org
    pub const HOSTED: Self = Self {
        download: 20 * MB,
        upload: 50 * MB,
    };

    /// A `telegram-bot-api` server started with `--local`
    pub const SELF_HOSTED: Self = Self {
        download: 2000 * MB,
        upload: 2000 * MB,
    };

    fn check(limit: u64, size: u64) -> Result<(), ChatError> {
        if size > limit {
            return Err(ChatError::FileTooLarge(format!(
                "{:.1} MB, the Bot API server accepts at most {} MB",
                size as f64 / MB as f64,
                limit / MB
            )));
        }
        Ok(())
    }
}

/// Bot API client
#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
    limits: TransferLimits,
}

impl TelegramChat {
    pub fn new(bot: Bot, limits: TransferLimits) -> Self {
        Self { bot, limits }
    }

    /// Connect to `BOT_API_URL` when set, otherwise to the hosted API
    pub fn from_config(config: &Config) -> Self {
        let bot = Bot::new(&config.bot_token);
        match &config.bot_api_url {
            Some(url) => {
                info!("Using Bot API server at {}", url);
                Self::new(bot.set_api_url(url.clone()), TransferLimits::SELF_HOSTED)
            }
            None => Self::new(bot, TransferLimits::HOSTED),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn limits(&self) -> TransferLimits {
        self.limits
    }
}

#[async_trait]
impl ChatPlatform for TelegramChat {
    async fn reply(&self, reply_to: MessageRef, text: &str) -> Result<MessageRef, ChatError> {
        let sent = self
            .bot
            .send_message(tg_chat(reply_to.chat), text)
            .reply_parameters(ReplyParameters::new(tg_message(reply_to.id)))
            .await
            .map_err(map_error)?;

        Ok(MessageRef {
            chat: chat::ChatId(sent.chat.id.0),
            id: chat::MessageId(sent.id.0),
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), ChatError> {
        self.bot
            .edit_message_text(tg_chat(message.chat), tg_message(message.id), text)
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn delete(&self, message: MessageRef) -> Result<(), ChatError> {
        self.bot
            .delete_message(tg_chat(message.chat), tg_message(message.id))
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn download(
        &self,
        file: &FileRef,
        dest: &Path,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), ChatError> {
        // Refuse early instead of surfacing the server's terse rejection
        TransferLimits::check(self.limits.download, file.size)?;
        let remote = self
            .bot
            .get_file(file.id.clone())
            .await
            .map_err(map_error)?;
        let total = u64::from(remote.meta.size).max(file.size);
        debug!("Downloading {} ({} bytes) to {:?}", remote.path, total, dest);

        let mut out = tokio::fs::File::create(dest).await?;
        let stream = self.bot.download_file_stream(&remote.path);
        futures::pin_mut!(stream);

        let mut current = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ChatError::Transfer(e.to_string()))?;
            out.write_all(&chunk).await?;
            current += chunk.len() as u64;
            progress.report(current, total.max(current)).await?;
        }
        out.flush().await?;
        Ok(())
    }

    /// The Bot API gives no upload callbacks, so progress is reported once
    /// before and once after the request.
    async fn send_video(
        &self,
        upload: VideoUpload,
        progress: &mut dyn TransferProgress,
    ) -> Result<(), ChatError> {
        let total = tokio::fs::metadata(&upload.path).await?.len();
        TransferLimits::check(self.limits.upload, total)?;
        progress.report(0, total).await?;

        let mut request = self
            .bot
            .send_video(tg_chat(upload.reply_to.chat), InputFile::file(&upload.path))
            .reply_parameters(ReplyParameters::new(tg_message(upload.reply_to.id)));
        if let Some(caption) = upload.caption {
            request = request.caption(caption);
        }
        if let Some(thumbnail) = &upload.thumbnail {
            request = request.thumbnail(InputFile::file(thumbnail));
        }
        request.await.map_err(map_error)?;

        progress.report(total, total).await
    }
}

/// Reduce a Telegram message to what the command handler needs
pub fn incoming(message: &Message) -> IncomingMessage {
    let from = message.from.as_ref();
    let mut incoming = IncomingMessage::new(
        MessageRef {
            chat: chat::ChatId(message.chat.id.0),
            id: chat::MessageId(message.id.0),
        },
        from.map(|user| UserId(user.id.0)),
    );
    incoming.first_name = from.map(|user| user.first_name.clone());
    incoming.text = message.text().map(str::to_string);
    incoming.caption = message.caption().map(str::to_string);
    incoming.video = message.video().map(|video| VideoAttachment {
        file: FileRef::new(video.file.id.to_string(), u64::from(video.file.size)),
        file_name: video.file_name.clone(),
    });
    incoming.reply_photo = message
        .reply_to_message()
        .and_then(|replied| replied.photo())
        .and_then(|sizes| sizes.last())
        .map(|photo| FileRef::new(photo.file.id.to_string(), u64::from(photo.file.size)));
    incoming
}

/// Receive updates until Ctrl-C. Only private chats are served.
pub async fn run(bot: Bot, chat: Arc<TelegramChat>, handler: CommandHandler) {
    info!("Listening for Telegram updates");
    teloxide::repl(bot, move |message: Message| {
        let chat = chat.clone();
        let handler = handler.clone();
        async move {
            if message.chat.is_private() {
                handler.dispatch(chat.as_ref(), &incoming(&message)).await;
            }
            respond(())
        }
    })
    .await;
}
