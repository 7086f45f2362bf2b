//! Completion orchestration: history in, reply out, history updated.

use super::Gateway;
use relay_core::{
    config::Messages,
    context::Context,
    error::RelayError,
    message::{Completion, Turn},
};
use tracing::{debug, info, warn};

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// How a provider call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Answered(String),
    /// Call succeeded but produced no text.
    Empty,
    Failed(String),
}

impl CompletionOutcome {
    pub fn from_result(result: Result<Completion, RelayError>) -> Self {
        match result {
            Ok(completion) => match completion.text {
                Some(text) if !text.trim().is_empty() => Self::Answered(text),
                _ => Self::Empty,
            },
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    /// The text the user will receive.
    pub fn into_reply(self, messages: &Messages) -> String {
        match self {
            Self::Answered(text) => text,
            Self::Empty => messages.empty_answer.clone(),
            Self::Failed(_) => messages.provider_failure.clone(),
        }
    }
}

impl Gateway {
    /// Run one user message through the provider and record the exchange.
    ///
    /// The conversation stays locked from the history read until both turns
    /// are appended, so concurrent messages from one sender cannot interleave.
    /// Provider failures become a fallback reply; this never fails.
    pub(crate) async fn complete_turn(&self, key: &str, user_text: &str) -> String {
        let mut session = self.store.session(key).await;

        let mut context = Context::new(&self.messages.system_prompt, user_text)
            .with_history(session.turns());
        context.model = Some(self.completion.model.clone());
        context.temperature = Some(self.completion.temperature);
        context.max_tokens = Some(self.completion.max_tokens);

        debug!(
            "pipeline: {key} -> {} with {} history turns",
            self.provider.name(),
            context.history.len()
        );

        let result = self.provider.complete(&context).await;
        if let Ok(completion) = &result {
            let meta = &completion.metadata;
            info!(
                "pipeline: {} answered {key} in {}ms (model {}, tokens {})",
                meta.provider_used,
                meta.processing_time_ms,
                meta.model.as_deref().unwrap_or(&self.completion.model),
                meta.tokens_used
                    .map_or_else(|| "n/a".to_string(), |t| t.to_string())
            );
        }
        let outcome = CompletionOutcome::from_result(result);
        match &outcome {
            CompletionOutcome::Answered(_) => {}
            CompletionOutcome::Empty => warn!("pipeline: empty completion for {key}"),
            CompletionOutcome::Failed(reason) => {
                warn!("pipeline: completion failed for {key}: {reason}")
            }
        }
        let reply = outcome.into_reply(&self.messages);

        session.append(Turn::user(user_text));
        session.append(Turn::assistant(reply.clone()));

        reply
    }
}
