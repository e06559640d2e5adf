//! WhatsApp channel gateway.
//!
//! Bridges the provider webhook to the conversation service so the same
//! turn pipeline serves multiple channels. Keeps a volatile per-sender
//! session cache; the durable store stays the source of truth, so a
//! restart only costs a fresh session.

use std::sync::Arc;

use futures_util::{StreamExt, pin_mut};
use tracing::{debug, error, info, warn};

use parley_types::channel::{InboundMessage, WebhookPayload};
use parley_types::event::TurnEvent;

use crate::channel::cache::{ChannelBinding, SessionCache};
use crate::channel::ChannelSender;
use crate::service::ConversationService;
use crate::store::ConversationStore;

/// Reply sent when a turn ends in an error event.
const CHANNEL_APOLOGY: &str =
    "Sorry, something went wrong while processing your message. Please try again.";

/// WhatsApp-to-conversation bridge.
pub struct WhatsAppGateway<S, C> {
    service: ConversationService<S>,
    sender: Arc<C>,
    cache: SessionCache,
}

impl<S: ConversationStore + 'static, C: ChannelSender> WhatsAppGateway<S, C> {
    pub fn new(service: ConversationService<S>, sender: Arc<C>, cache_capacity: usize) -> Self {
        Self {
            service,
            sender,
            cache: SessionCache::new(cache_capacity),
        }
    }

    /// Check a webhook verification token against the configured one.
    pub fn verify_token(&self, token: &str) -> bool {
        self.sender.verify_token(token)
    }

    /// Process every message in a webhook payload, one at a time.
    pub async fn process_webhook(&self, payload: &WebhookPayload) {
        let messages = payload.extract_messages();
        if messages.is_empty() {
            debug!("webhook contained no messages");
            return;
        }
        for message in messages {
            self.handle_inbound(message).await;
        }
    }

    /// Process one normalized inbound message: mark it read, drop non-text
    /// kinds, run a conversation turn, and send the reply back out.
    pub async fn handle_inbound(&self, message: InboundMessage) {
        if let Err(err) = self.sender.mark_read(&message.message_id).await {
            debug!(message_id = %message.message_id, error = %err, "mark-read failed");
        }

        if !message.is_text() {
            debug!(kind = %message.kind, "ignoring non-text message");
            return;
        }
        let text = message.text.clone().unwrap_or_default();

        let reply = self
            .run_turn(&message.sender_id, &text, message.contact_name.as_deref())
            .await;

        if let Some(reply) = reply {
            match self.sender.send_text(&message.sender_id, &reply).await {
                Ok(()) => info!(sender = %message.sender_id, "reply delivered"),
                Err(err) => warn!(sender = %message.sender_id, error = %err, "reply delivery failed"),
            }
        }
    }

    /// Run a turn for a sender's text without touching the outbound
    /// channel. Returns the final reply text, if any.
    pub async fn handle_text(
        &self,
        sender_id: &str,
        text: &str,
        contact_name: Option<&str>,
    ) -> Option<String> {
        self.run_turn(sender_id, text, contact_name).await
    }

    async fn run_turn(
        &self,
        sender_id: &str,
        text: &str,
        contact_name: Option<&str>,
    ) -> Option<String> {
        let binding = self.cache.get_or_insert_with(sender_id, || {
            info!(sender = %sender_id, "new channel binding");
            ChannelBinding::new(user_id_for(sender_id))
        });
        if let Some(name) = contact_name {
            let name = name.to_string();
            self.cache
                .update(sender_id, |b| b.contact_name = Some(name));
        }

        let turn = self.service.run(
            binding.user_id.clone(),
            text,
            binding.chat_id,
            binding.session_id,
        );
        pin_mut!(turn);

        let mut reply: Option<String> = None;
        while let Some(event) = turn.next().await {
            match event {
                TurnEvent::Start {
                    chat_id,
                    session_id,
                    ..
                } => {
                    self.cache.update(sender_id, |b| {
                        b.chat_id = Some(chat_id);
                        b.session_id = Some(session_id);
                    });
                }
                TurnEvent::AgentResponse { content, .. } => {
                    reply = Some(content);
                }
                TurnEvent::ToolCall { tool, .. } => {
                    debug!(sender = %sender_id, tool = %tool, "tool call in channel turn");
                }
                TurnEvent::ToolResult { tool, .. } => {
                    debug!(sender = %sender_id, tool = %tool, "tool result in channel turn");
                }
                TurnEvent::Error { message } => {
                    error!(sender = %sender_id, error = %message, "turn failed");
                    reply = Some(CHANNEL_APOLOGY.to_string());
                }
                TurnEvent::End {
                    chat_id,
                    session_id,
                    ..
                } => {
                    self.cache.update(sender_id, |b| {
                        b.chat_id = Some(chat_id);
                        b.session_id = Some(session_id);
                    });
                }
            }
        }

        reply
    }

    /// Forget a sender's binding so their next message starts fresh.
    pub fn clear_binding(&self, sender_id: &str) -> bool {
        let removed = self.cache.remove(sender_id);
        if removed {
            info!(sender = %sender_id, "channel binding cleared");
        }
        removed
    }

    /// Inspect a sender's cached binding.
    pub fn binding(&self, sender_id: &str) -> Option<ChannelBinding> {
        self.cache.get(sender_id)
    }
}

fn user_id_for(sender_id: &str) -> String {
    format!("whatsapp_{sender_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use parley_types::error::ChannelError;

    use crate::agent::{TurnOptions, TurnRunner};
    use crate::llm::DirectAccess;
    use crate::testing::{FixedModel, MemoryStore};
    use crate::tool::ToolRegistry;
    use crate::trace::NoopTraceSink;

    /// Records every outbound call.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        read: Mutex<Vec<String>>,
    }

    impl ChannelSender for RecordingSender {
        async fn send_text(&self, to: &str, text: &str) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), text.to_string()));
            Ok(())
        }

        async fn mark_read(&self, message_id: &str) -> Result<(), ChannelError> {
            self.read.lock().unwrap().push(message_id.to_string());
            Ok(())
        }

        fn verify_token(&self, token: &str) -> bool {
            token == "expected"
        }
    }

    fn gateway(reply: &'static str) -> (WhatsAppGateway<MemoryStore, RecordingSender>, Arc<RecordingSender>) {
        let runner = TurnRunner::new(
            Arc::new(DirectAccess::new(Arc::new(FixedModel(reply)))),
            Arc::new(ToolRegistry::new()),
            Arc::new(NoopTraceSink),
            TurnOptions::default(),
        );
        let service = ConversationService::new(MemoryStore::default(), runner, 1000, false);
        let sender = Arc::new(RecordingSender::default());
        (WhatsAppGateway::new(service, sender.clone(), 16), sender)
    }

    fn text_message(sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            sender_id: sender.to_string(),
            contact_name: Some("Alice".to_string()),
            message_id: format!("wamid.{sender}"),
            text: Some(text.to_string()),
            kind: "text".to_string(),
        }
    }

    #[tokio::test]
    async fn test_inbound_text_gets_reply_and_read_receipt() {
        let (gateway, sender) = gateway("Hello from the bot");
        gateway
            .handle_inbound(text_message("5511999999999", "Hi"))
            .await;

        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "5511999999999");
        assert_eq!(sent[0].1, "Hello from the bot");

        let read = sender.read.lock().unwrap().clone();
        assert_eq!(read, vec!["wamid.5511999999999"]);
    }

    #[tokio::test]
    async fn test_binding_remembers_chat_and_session() {
        let (gateway, _) = gateway("ok");
        gateway.handle_inbound(text_message("5511", "first")).await;

        let binding = gateway.binding("5511").unwrap();
        assert_eq!(binding.user_id, "whatsapp_5511");
        let first_chat = binding.chat_id.unwrap();
        assert!(binding.session_id.is_some());
        assert_eq!(binding.contact_name.as_deref(), Some("Alice"));

        // Second message reuses the same chat.
        gateway.handle_inbound(text_message("5511", "second")).await;
        let binding = gateway.binding("5511").unwrap();
        assert_eq!(binding.chat_id.unwrap(), first_chat);
    }

    #[tokio::test]
    async fn test_non_text_message_is_read_but_not_answered() {
        let (gateway, sender) = gateway("ok");
        gateway
            .handle_inbound(InboundMessage {
                sender_id: "5511".to_string(),
                contact_name: None,
                message_id: "wamid.img".to_string(),
                text: None,
                kind: "image".to_string(),
            })
            .await;

        assert_eq!(sender.read.lock().unwrap().len(), 1);
        assert!(sender.sent.lock().unwrap().is_empty());
        // No turn ran, so no binding was created either.
        assert!(gateway.binding("5511").is_none());
    }

    #[tokio::test]
    async fn test_handle_text_returns_reply_without_sending() {
        let (gateway, sender) = gateway("direct reply");
        let reply = gateway.handle_text("5511", "Hi", None).await;
        assert_eq!(reply.as_deref(), Some("direct reply"));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_binding_starts_fresh_chat() {
        let (gateway, _) = gateway("ok");
        gateway.handle_inbound(text_message("5511", "first")).await;
        let first_chat = gateway.binding("5511").unwrap().chat_id.unwrap();

        assert!(gateway.clear_binding("5511"));
        gateway.handle_inbound(text_message("5511", "second")).await;
        let second_chat = gateway.binding("5511").unwrap().chat_id.unwrap();
        assert_ne!(first_chat, second_chat);
    }

    #[tokio::test]
    async fn test_verify_token_delegates_to_sender() {
        let (gateway, _) = gateway("ok");
        assert!(gateway.verify_token("expected"));
        assert!(!gateway.verify_token("wrong"));
    }

    #[tokio::test]
    async fn test_webhook_payload_end_to_end() {
        let (gateway, sender) = gateway("webhook reply");
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "contacts": [{"profile": {"name": "Bob"}, "wa_id": "5522"}],
                        "messages": [{
                            "from": "5522",
                            "id": "wamid.hook",
                            "type": "text",
                            "text": {"body": "hello"}
                        }]
                    }
                }]
            }]
        }))
        .unwrap();

        gateway.process_webhook(&payload).await;

        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("5522".to_string(), "webhook reply".to_string()));
    }
}
