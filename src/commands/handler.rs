use tracing::{debug, info, warn};

use super::BotCommand;
use crate::chat::{ChatPlatform, IncomingMessage, UserId, VideoAttachment};
use crate::config::AdminList;
use crate::job::Job;
use crate::queue::JobQueue;
use crate::registry::TaskRegistry;
use crate::settings::{SettingsStore, TimeOffset, TrimRange};

pub const NOT_AUTHORIZED: &str = "You are not authorized to use this bot.";
pub const SET_TIME_USAGE: &str = "Usage: /set_time <start_time> [end_time]";
pub const INVALID_TIME: &str = "Invalid time format. Please use HH:MM:SS or MM:SS format.";
pub const CANCEL_USAGE: &str = "Usage: /cancel <token>";
pub const UNKNOWN_TOKEN: &str = "❌ Invalid token or task is already completed.";

const HELP: &str = "I can trim your videos. Here's what you can do:\n\n\
1. Set Trim Times: use /set_time <start> [end].\n   \
- The end time is optional. If omitted, the video is trimmed to its end.\n   \
- Example: /set_time 00:01:10 00:01:50\n\n\
2. Set Custom Caption: use /set_caption <your_caption>.\n   \
- To revert to the original caption, use /set_caption with no text.\n\n\
3. Set Thumbnail: reply to an image with /set_thumbnail to set a custom thumbnail.\n   \
- To remove the custom thumbnail, use /set_thumbnail without replying to an image.\n\n\
4. Cancel Operations: when a video is processing, you'll get a token. Use /cancel <token> to stop it.\n\n\
5. Send Video: send me the video you want to trim.";

/// Entry point for everything users send to the bot.
///
/// Validates and authorizes input before touching the settings, the task
/// registry or the job queue. Rejected input never changes state.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    settings: SettingsStore,
    registry: TaskRegistry,
    queue: JobQueue,
    admins: AdminList,
}

impl CommandHandler {
    pub fn new(
        settings: SettingsStore,
        registry: TaskRegistry,
        queue: JobQueue,
        admins: AdminList,
    ) -> Self {
        Self {
            settings,
            registry,
            queue,
            admins,
        }
    }

    fn is_admin(&self, user: Option<UserId>) -> bool {
        user.is_some_and(|user| self.admins.contains(user))
    }

    /// Handle a message and reply to it through `chat` when there is
    /// something to say.
    pub async fn dispatch(&self, chat: &dyn ChatPlatform, message: &IncomingMessage) {
        if let Some(reply) = self.handle(message).await {
            if let Err(e) = chat.reply(message.message, &reply).await {
                warn!("Failed to reply to {}: {}", message.message, e);
            }
        }
    }

    /// Compute the reply for a message, applying any state change it asks for
    pub async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        if let Some(text) = message.text.as_deref() {
            let command = BotCommand::parse(text)?;
            if !self.is_admin(message.from) {
                debug!("Rejected {:?} from {:?}", command, message.from);
                return Some(NOT_AUTHORIZED.to_string());
            }
            return self.handle_command(message, command).await;
        }

        let video = message.video.as_ref()?;
        if !self.is_admin(message.from) {
            debug!("Ignored video from {:?}", message.from);
            return None;
        }
        Some(self.accept_video(message, video))
    }

    async fn handle_command(
        &self,
        message: &IncomingMessage,
        command: BotCommand,
    ) -> Option<String> {
        let reply = match command {
            BotCommand::Start => format!(
                "Hi {}!\n\nI can trim your videos. Use /help to see available commands.",
                message.first_name.as_deref().unwrap_or("there")
            ),
            BotCommand::Help => HELP.to_string(),
            BotCommand::SetTime(args) => self.set_time(&args).await,
            BotCommand::SetCaption(caption) => self.set_caption(caption).await,
            BotCommand::SetThumbnail => self.set_thumbnail(message).await,
            BotCommand::Cancel(token) => return self.cancel(token.as_deref()),
        };
        Some(reply)
    }

    async fn set_time(&self, args: &[String]) -> String {
        if !(1..=2).contains(&args.len()) {
            return SET_TIME_USAGE.to_string();
        }

        let start = args[0].parse::<TimeOffset>();
        let end = args.get(1).map(|end| end.parse::<TimeOffset>()).transpose();
        let (start, end) = match (start, end) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => {
                debug!("Rejected trim range: {}", e);
                return INVALID_TIME.to_string();
            }
        };

        let end_display = end
            .as_ref()
            .map_or_else(|| "End of Video".to_string(), ToString::to_string);
        let reply = format!("✅ Trim time successfully set!\nStart: {start}\nEnd: {end_display}");

        info!("Trim range set to {} - {}", start, end_display);
        self.settings.set_trim(TrimRange::new(start, end)).await;
        reply
    }

    async fn set_caption(&self, caption: Option<String>) -> String {
        match caption {
            Some(caption) => {
                let reply = format!("✅ Custom caption has been set to:\n\n{caption}");
                self.settings.set_caption(Some(caption)).await;
                reply
            }
            None => {
                self.settings.set_caption(None).await;
                "✅ Custom caption removed. The original video's caption will be used.".to_string()
            }
        }
    }

    async fn set_thumbnail(&self, message: &IncomingMessage) -> String {
        match &message.reply_photo {
            Some(photo) => {
                self.settings.set_thumbnail(Some(photo.clone())).await;
                "✅ Custom thumbnail has been set.".to_string()
            }
            None => {
                self.settings.set_thumbnail(None).await;
                "✅ Custom thumbnail removed.".to_string()
            }
        }
    }

    /// Successful cancellation stays silent; the job's status message
    /// reports it.
    fn cancel(&self, token: Option<&str>) -> Option<String> {
        let Some(token) = token else {
            return Some(CANCEL_USAGE.to_string());
        };
        if self.registry.cancel(token) {
            info!("🛑 Cancellation requested for {}", token);
            None
        } else {
            Some(UNKNOWN_TOKEN.to_string())
        }
    }

    fn accept_video(&self, message: &IncomingMessage, video: &VideoAttachment) -> String {
        let job = Job::new(
            message.message,
            video.file.clone(),
            message.caption.clone(),
            video.file_name.as_deref(),
        );
        info!("➕ Queueing video {:?} from {}", job.file_name, message.message);
        let position = self.queue.enqueue(job);

        format!(
            "☑️ Your video has been added to the queue and will be processed shortly.\nPosition in queue: {position}"
        )
    }
}
