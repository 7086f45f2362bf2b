//! # relay-memory
//!
//! Bounded per-sender conversation history, held in process memory.

pub mod store;

pub use store::{ConversationSession, ConversationStore};
