//! # relay-channels
//!
//! Messaging platform integrations.

pub mod whatsapp_cloud;

pub use whatsapp_cloud::{WebhookEvent, WhatsAppCloudChannel};
