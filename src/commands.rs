//! Built-in bot commands. Instant responses, no provider call.


use relay_core::config::Messages;
use relay_memory::ConversationStore;

/// Grouped context for command execution.
pub struct CommandContext<'a> {
    pub store: &'a ConversationStore,
    pub sender_key: &'a str,
    pub messages: &'a Messages,
}

/// Known bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Reset,
    Help,
}

impl Command {
    /// Parse a command from message text. Returns `None` for anything that
    /// should go to the provider.
    ///
    /// Matching is a case-insensitive prefix test, so `/RESET please` and
    /// `/resetnow` both reset.
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.trim_start().to_lowercase();
        if lower.starts_with("/start") {
            Some(Self::Start)
        } else if lower.starts_with("/reset") {
            Some(Self::Reset)
        } else if lower.starts_with("/help") {
            Some(Self::Help)
        } else {
            None
        }
    }
}

/// Handle a command and return the response text.
///
/// `Reset` clears the sender's history before the reply is produced.
pub async fn handle(cmd: Command, ctx: &CommandContext<'_>) -> String {
    match cmd {
        Command::Start => ctx.messages.greeting.clone(),
        Command::Reset => {
            ctx.store.clear(ctx.sender_key).await;
            ctx.messages.reset.clone()
        }
        Command::Help => ctx.messages.help.clone(),
    }
}
