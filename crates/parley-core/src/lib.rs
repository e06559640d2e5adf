//! Business logic and port definitions for Parley.
//!
//! This crate defines the "ports" (the `ConversationStore` trait, model
//! access traits, channel sender trait) that the infrastructure layer
//! implements, plus the pieces that run a conversation turn: the tool
//! registry, the reasoning-loop state machine, the conversation service
//! façade, and the channel gateway. It depends only on `parley-types` --
//! never on `parley-infra` or any database/IO crate.

pub mod agent;
pub mod channel;
pub mod llm;
pub mod service;
pub mod store;
pub mod tool;
pub mod trace;

#[cfg(test)]
mod testing;
