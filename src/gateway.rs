//! Gateway: routes webhook events through commands or the provider and back
//! out through the dispatcher.

mod dispatch;
mod pipeline;


pub use dispatch::{DeliveryStatus, Dispatcher};
pub use pipeline::CompletionSettings;

use crate::commands::{self, Command, CommandContext};
use chrono::Utc;
use relay_channels::{WebhookEvent, WhatsAppCloudChannel};
use relay_core::{
    config::{Config, Messages},
    error::RelayError,
    identity::normalize,
    message::{InboundMessage, MessageType},
    traits::{Channel, Provider},
};
use relay_memory::ConversationStore;
use relay_providers::OpenAiProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// What the gateway did with one webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Nothing to do (status receipt, empty batch, blank text).
    Ignored,
    /// Non-text message; the capability notice was sent if possible.
    Notice,
    /// A built-in command answered.
    Command(Command),
    /// The provider answered (or a fallback was sent).
    Reply,
}

/// The central gateway that routes messages between the channel and the provider.
pub struct Gateway {
    provider: Arc<dyn Provider>,
    dispatcher: Dispatcher,
    store: ConversationStore,
    messages: Messages,
    completion: CompletionSettings,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: Dispatcher,
        store: ConversationStore,
        messages: Messages,
        completion: CompletionSettings,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            store,
            messages,
            completion,
        }
    }

    /// Build the production gateway: OpenAI-compatible provider, WhatsApp
    /// Cloud channel, in-memory store.
    pub fn from_config(cfg: &Config) -> Result<Self, RelayError> {
        let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::from_config(&cfg.provider)?);
        let channel: Arc<dyn Channel> = Arc::new(WhatsAppCloudChannel::from_config(&cfg.whatsapp)?);
        let dispatcher = Dispatcher::new(
            channel,
            cfg.identity_normalizer(),
            cfg.whatsapp.simulate(),
        );
        Ok(Self::new(
            provider,
            dispatcher,
            ConversationStore::from_config(&cfg.memory),
            cfg.messages.clone(),
            CompletionSettings {
                model: cfg.provider.model.clone(),
                temperature: cfg.provider.temperature,
                max_tokens: cfg.provider.max_tokens,
            },
        ))
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn simulate(&self) -> bool {
        self.dispatcher.simulate()
    }

    /// Process one parsed webhook event to completion.
    pub async fn handle_event(&self, event: WebhookEvent) -> Handled {
        match event {
            WebhookEvent::NoEvent => {
                debug!("gateway: webhook without a usable message");
                Handled::Ignored
            }
            WebhookEvent::Message(msg) => match msg.message_type {
                MessageType::Text => self.handle_text(msg).await,
                MessageType::Other => {
                    let sender = msg.sender_key.as_str();
                    if sender.is_empty() {
                        debug!("gateway: non-text message without sender, ignored");
                    } else {
                        info!("gateway: non-text message from {sender}");
                        self.dispatcher.send(sender, &self.messages.text_only).await;
                    }
                    Handled::Notice
                }
            },
        }
    }

    async fn handle_text(&self, msg: InboundMessage) -> Handled {
        let key = msg.sender_key.as_str();
        let text = msg.text.as_deref().unwrap_or_default();
        if key.is_empty() || text.is_empty() {
            return Handled::Ignored;
        }
        info!(
            "gateway: message from {key} ({} chars{})",
            text.chars().count(),
            msg.platform_id
                .as_deref()
                .map(|id| format!(", {id}"))
                .unwrap_or_default()
        );

        if let Some(cmd) = Command::parse(text) {
            let ctx = CommandContext {
                store: &self.store,
                sender_key: key,
                messages: &self.messages,
            };
            let reply = commands::handle(cmd, &ctx).await;
            self.dispatcher.send(key, &reply).await;
            return Handled::Command(cmd);
        }

        let reply = self.complete_turn(key, text).await;
        self.dispatcher.send(key, &reply).await;
        info!(
            "gateway: {key} handled in {}ms",
            (Utc::now() - msg.received_at).num_milliseconds()
        );
        Handled::Reply
    }

    /// Send the fixed diagnostic text to `recipient`, independent of any
    /// conversation.
    pub async fn send_diagnostic(&self, recipient: &str) -> DeliveryStatus {
        let key = normalize(Some(recipient));
        info!("gateway: diagnostic send to {key}");
        self.dispatcher.deliver(&key, &self.messages.diagnostic).await
    }
}
