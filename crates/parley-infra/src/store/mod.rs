//! Conversation store implementation over the single-table client.

pub mod conversation;

pub use conversation::SingleTableStore;
