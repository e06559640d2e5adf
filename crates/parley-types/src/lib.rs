//! Shared domain types for Parley.
//!
//! This crate contains the core domain types used across the Parley
//! conversational service: chats, sessions, messages, turn events, model
//! interaction shapes, channel payloads, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod channel;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
