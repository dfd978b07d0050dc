//! Normalized inbound update from a channel, consumed by the dispatcher.

/// Slash command recognized by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Help,
    Status,
    /// Any other slash command; answered with the help text.
    Unknown,
}

impl CommandKind {
    /// Parse a message that starts with '/' into a command. Case-insensitive;
    /// a trailing bot mention ("/help@my_bot") is ignored.
    pub fn parse(text: &str) -> Option<CommandKind> {
        let trimmed = text.trim();
        let rest = trimmed.strip_prefix('/')?;
        let name = rest
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("");
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(CommandKind::Start),
            "help" => Some(CommandKind::Help),
            "status" => Some(CommandKind::Status),
            _ => Some(CommandKind::Unknown),
        }
    }
}

/// One user-originated chat event, normalized for dispatch.
/// Owned by a single dispatch cycle; never stored.
#[derive(Debug, Clone)]
pub enum InboundUpdate {
    /// Plain text message.
    Text { chat_id: String, text: String },
    /// Image message with downloaded bytes and optional caption.
    Image {
        chat_id: String,
        image: Vec<u8>,
        caption: Option<String>,
    },
    /// Slash command.
    Command { chat_id: String, command: CommandKind },
}

impl InboundUpdate {
    /// Conversation the reply should be delivered to.
    pub fn chat_id(&self) -> &str {
        match self {
            InboundUpdate::Text { chat_id, .. } => chat_id,
            InboundUpdate::Image { chat_id, .. } => chat_id,
            InboundUpdate::Command { chat_id, .. } => chat_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(CommandKind::parse("/start"), Some(CommandKind::Start));
        assert_eq!(CommandKind::parse("/HELP"), Some(CommandKind::Help));
        assert_eq!(CommandKind::parse("/status extra words"), Some(CommandKind::Status));
        assert_eq!(CommandKind::parse("/help@ferry_bot"), Some(CommandKind::Help));
    }

    #[test]
    fn unknown_command_and_plain_text() {
        assert_eq!(CommandKind::parse("/frobnicate"), Some(CommandKind::Unknown));
        assert_eq!(CommandKind::parse("hello"), None);
        assert_eq!(CommandKind::parse("  /start"), Some(CommandKind::Start));
    }
}
