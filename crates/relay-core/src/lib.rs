//! # relay-core
//!
//! Core types, traits, configuration, and error handling for the relay.

pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod message;
pub mod traits;
