//! Chat commands: parsing, authorization and the state changes they make.

pub mod handler;

pub use handler::CommandHandler;

/// A recognised bot command with its raw arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    /// Whitespace-separated arguments, validated by the handler
    SetTime(Vec<String>),
    /// Everything after the command; `None` clears the override
    SetCaption(Option<String>),
    SetThumbnail,
    Cancel(Option<String>),
}

impl BotCommand {
    /// Parse message text such as `/set_time 00:01:10 00:01:50`.
    ///
    /// Returns `None` for plain text and unknown commands. A `@botname`
    /// suffix on the command is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start().strip_prefix('/')?;
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest),
            None => (text, ""),
        };
        let name = head.split('@').next().unwrap_or(head);

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "set_time" => Self::SetTime(rest.split_whitespace().map(str::to_string).collect()),
            "set_caption" => {
                let caption = rest.trim_start();
                Self::SetCaption((!caption.trim().is_empty()).then(|| caption.to_string()))
            }
            "set_thumbnail" => Self::SetThumbnail,
            "cancel" => Self::Cancel(rest.split_whitespace().next().map(str::to_string)),
            _ => return None,
        };
        Some(command)
    }
}
