use crate::{
    context::Context,
    error::RelayError,
    message::{Completion, OutboundReply},
};
use async_trait::async_trait;

/// Completion provider trait.
///
/// Any chat-completion backend implements this to give the orchestrator a
/// uniform interface. Errors are returned, never panicked; the caller decides
/// how to degrade.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a conversation context to the provider and get a completion.
    async fn complete(&self, context: &Context) -> Result<Completion, RelayError>;

    /// Check if the provider is reachable with the configured credentials.
    async fn is_available(&self) -> bool;
}

/// Messaging channel trait.
///
/// Inbound traffic arrives through the webhook, so a channel only needs to
/// know how to push a text back to a recipient.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Deliver a text reply. `destination_key` is already a delivery address.
    async fn send(&self, reply: &OutboundReply) -> Result<(), RelayError>;
}
