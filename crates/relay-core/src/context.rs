use crate::message::{Role, Turn};
use serde::{Deserialize, Serialize};

/// Conversation context passed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System instruction prepended to every request.
    pub system_prompt: String,
    /// Conversation history (oldest first).
    pub history: Vec<Turn>,
    /// The current user message, not yet part of `history`.
    pub current_message: String,
    /// Override the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Override the provider's default sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Override the provider's default output-length cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Context {
    /// Create a context with no history.
    pub fn new(system_prompt: &str, message: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            history: Vec::new(),
            current_message: message.to_string(),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Attach prior turns (oldest first).
    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    /// Flatten into the chat-completions message list:
    /// system instruction, then history, then the new user turn.
    ///
    /// An empty system prompt is omitted. System turns found in history are
    /// kept in place.
    pub fn to_messages(&self) -> Vec<Turn> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);

        if !self.system_prompt.is_empty() {
            messages.push(Turn::system(self.system_prompt.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(Turn {
            role: Role::User,
            content: self.current_message.clone(),
        });

        messages
    }
}
