//! Outbound delivery with error containment.
//!
//! Nothing here ever returns an error to the pipeline: a reply that cannot be
//! delivered is logged and dropped, and the webhook is still acknowledged.

use relay_core::{identity::IdentityNormalizer, message::OutboundReply, traits::Channel};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Longest text preview written to logs for a simulated send.
const PREVIEW_CHARS: usize = 120;

/// What happened to one outbound reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    /// Simulate mode: logged, not sent.
    Simulated,
    /// Empty destination, nothing attempted.
    NoRecipient,
    Failed(String),
}

/// Turns `(conversation key, text)` into a channel call.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn Channel>,
    normalizer: IdentityNormalizer,
    simulate: bool,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn Channel>, normalizer: IdentityNormalizer, simulate: bool) -> Self {
        Self {
            channel,
            normalizer,
            simulate,
        }
    }

    pub fn simulate(&self) -> bool {
        self.simulate
    }

    /// Attempt delivery and report the outcome. Never returns `Err`.
    pub async fn deliver(&self, destination_key: &str, text: &str) -> DeliveryStatus {
        if self.simulate {
            info!(
                "[simulate] reply to {destination_key}: {}",
                preview(text, PREVIEW_CHARS)
            );
            return DeliveryStatus::Simulated;
        }

        let address = self.normalizer.delivery_address(destination_key);
        if address.is_empty() {
            warn!("dispatch: empty destination, reply dropped");
            return DeliveryStatus::NoRecipient;
        }

        let reply = OutboundReply {
            destination_key: address,
            text: text.to_string(),
        };
        match self.channel.send(&reply).await {
            Ok(()) => DeliveryStatus::Sent,
            Err(e) => {
                error!(
                    "dispatch: {} send to {} failed: {e}",
                    self.channel.name(),
                    reply.destination_key
                );
                DeliveryStatus::Failed(e.to_string())
            }
        }
    }

    /// Fire-and-forget variant used by the message pipeline.
    pub async fn send(&self, destination_key: &str, text: &str) {
        let _ = self.deliver(destination_key, text).await;
    }
}

/// First `max` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
