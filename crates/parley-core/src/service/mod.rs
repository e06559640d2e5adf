//! Conversation service façade.

pub mod conversation;

pub use conversation::ConversationService;
