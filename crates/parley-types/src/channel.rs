//! Inbound channel payload types.
//!
//! Models the WhatsApp Cloud API webhook shape and its normalization into
//! the flat `InboundMessage` list the channel gateway consumes. Only the
//! fields the gateway needs are modeled; unknown fields are ignored by
//! serde.

use serde::{Deserialize, Serialize};

/// A normalized inbound channel message.
///
/// Messages whose `kind` is not `"text"` are dropped before reaching the
/// conversation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// External sender identifier (phone number for WhatsApp).
    pub sender_id: String,
    pub contact_name: Option<String>,
    /// Channel-native message id, used for read receipts.
    pub message_id: String,
    pub text: Option<String>,
    /// Channel message type ("text", "image", "audio", ...).
    pub kind: String,
}

impl InboundMessage {
    /// Whether this message carries text the core can process.
    pub fn is_text(&self) -> bool {
        self.kind == "text" && self.text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Full webhook payload as delivered by the channel provider.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    pub value: WebhookValue,
    pub field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookValue {
    pub messaging_product: String,
    #[serde(default)]
    pub contacts: Option<Vec<WebhookContact>>,
    #[serde(default)]
    pub messages: Option<Vec<WebhookMessage>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    pub profile: WebhookProfile,
    /// Sender's channel id (phone number).
    pub wa_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookProfile {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    #[serde(rename = "from")]
    pub sender: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<WebhookText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookText {
    pub body: String,
}

impl WebhookPayload {
    /// Flatten the nested webhook shape into normalized inbound messages.
    ///
    /// Only `field == "messages"` changes are considered. Contact names
    /// are joined to messages by sender id when present.
    pub fn extract_messages(&self) -> Vec<InboundMessage> {
        let mut out = Vec::new();

        for entry in &self.entry {
            for change in &entry.changes {
                if change.field != "messages" {
                    continue;
                }

                let names: std::collections::HashMap<&str, &str> = change
                    .value
                    .contacts
                    .iter()
                    .flatten()
                    .map(|c| (c.wa_id.as_str(), c.profile.name.as_str()))
                    .collect();

                for msg in change.value.messages.iter().flatten() {
                    out.push(InboundMessage {
                        sender_id: msg.sender.clone(),
                        contact_name: names.get(msg.sender.as_str()).map(|n| n.to_string()),
                        message_id: msg.id.clone(),
                        text: msg.text.as_ref().map(|t| t.body.clone()),
                        kind: msg.kind.clone(),
                    });
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> WebhookPayload {
        serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "15550000000",
                            "phone_number_id": "999"
                        },
                        "contacts": [{
                            "profile": {"name": "Alice"},
                            "wa_id": "5511999999999"
                        }],
                        "messages": [{
                            "from": "5511999999999",
                            "id": "wamid.abc",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": "hello"}
                        }]
                    }
                }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_extract_messages_joins_contact_names() {
        let messages = sample_payload().extract_messages();
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.sender_id, "5511999999999");
        assert_eq!(msg.contact_name.as_deref(), Some("Alice"));
        assert_eq!(msg.message_id, "wamid.abc");
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert!(msg.is_text());
    }

    #[test]
    fn test_extract_messages_skips_non_message_fields() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "statuses",
                    "value": {"messaging_product": "whatsapp"}
                }]
            }]
        }))
        .unwrap();
        assert!(payload.extract_messages().is_empty());
    }

    #[test]
    fn test_non_text_message_is_not_text() {
        let msg = InboundMessage {
            sender_id: "5511".to_string(),
            contact_name: None,
            message_id: "wamid.x".to_string(),
            text: None,
            kind: "image".to_string(),
        };
        assert!(!msg.is_text());
    }

    #[test]
    fn test_empty_text_body_is_not_text() {
        let msg = InboundMessage {
            sender_id: "5511".to_string(),
            contact_name: None,
            message_id: "wamid.x".to_string(),
            text: Some(String::new()),
            kind: "text".to_string(),
        };
        assert!(!msg.is_text());
    }
}
