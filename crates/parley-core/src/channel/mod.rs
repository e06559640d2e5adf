//! Channel adapter boundary and the WhatsApp gateway.
//!
//! `ChannelSender` is the outbound collaborator interface (third-party
//! delivery API); the gateway bridges normalized inbound messages to the
//! conversation service, with a volatile per-sender session cache.

pub mod cache;
pub mod whatsapp;

pub use cache::{ChannelBinding, SessionCache};
pub use whatsapp::WhatsAppGateway;

use parley_types::error::ChannelError;

/// Outbound channel delivery interface.
///
/// Implementations talk to the provider's API; the core only depends on
/// this contract. Delivery is at-least-effort: the gateway logs failures
/// and never raises them into the turn.
pub trait ChannelSender: Send + Sync {
    /// Deliver a text message to an external destination.
    fn send_text(
        &self,
        to: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Mark an inbound message as read (read receipts).
    fn mark_read(
        &self,
        message_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Check a webhook verification token.
    fn verify_token(&self, token: &str) -> bool;
}
