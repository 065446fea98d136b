// Telegram chat identifier
pub type ChatId = i64;

// Bot commands the dispatcher understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe,
    Unsubscribe,
    Unknown(String),
}

impl Command {
    // Parse a command name without the leading slash or @botname suffix
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "start" | "subscribe" => Command::Subscribe,
            "stop" | "unsubscribe" => Command::Unsubscribe,
            _ => Command::Unknown(name.to_string()),
        }
    }
}

// One inbound update, already reduced to what the dispatcher needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub text: Option<String>, // None for stickers, photos, joins...
    pub command: Option<Command>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_aliases() {
        assert_eq!(Command::from_name("start"), Command::Subscribe);
        assert_eq!(Command::from_name("Subscribe"), Command::Subscribe);
        assert_eq!(Command::from_name("stop"), Command::Unsubscribe);
        assert_eq!(Command::from_name("unsubscribe"), Command::Unsubscribe);
        assert_eq!(
            Command::from_name("help"),
            Command::Unknown("help".to_string())
        );
    }
}
