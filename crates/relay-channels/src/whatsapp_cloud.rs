//! WhatsApp Business Cloud API channel.
//!
//! Webhook mode only: inbound messages reach the relay through its HTTP
//! endpoint and are decoded by [`webhook`]; this type handles the outbound
//! Graph API call.

pub mod webhook;


pub use webhook::{
    constant_time_eq, parse_event, verify_handshake, verify_signature, HandshakeQuery,
    WebhookEvent,
};

use async_trait::async_trait;
use relay_core::{
    config::WhatsAppConfig, error::RelayError, message::OutboundReply, traits::Channel,
};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Outbound sender for the WhatsApp Cloud API.
pub struct WhatsAppCloudChannel {
    client: reqwest::Client,
    graph_base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsAppCloudChannel {
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Channel(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            graph_base_url: config.graph_base_url.clone(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.graph_base_url.trim_end_matches('/'),
            self.phone_number_id
        )
    }
}

#[async_trait]
impl Channel for WhatsAppCloudChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, reply: &OutboundReply) -> Result<(), RelayError> {
        let body = json!({
            "messaging_product": "whatsapp",
            "to": reply.destination_key,
            "type": "text",
            "text": { "body": reply.text },
        });

        let url = self.messages_url();
        debug!("whatsapp: POST {url} to={}", reply.destination_key);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Channel(format!("whatsapp request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Channel(format!(
                "whatsapp returned {status}: {text}"
            )));
        }

        Ok(())
    }
}
