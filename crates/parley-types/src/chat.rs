//! Chat, session, and message types for Parley.
//!
//! These model the durable conversation state: a `Chat` is a named thread
//! owned by one user, a `Session` is a bounded period of interaction on a
//! chat, and `Message`s form the ordered history of a chat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

// Re-export MessageRole from the llm module (it's used in both chat and
// model contexts).
pub use crate::llm::MessageRole;

/// Lifecycle status of a session.
///
/// Sessions only ever move from `Active` to `Ended`; they are never
/// physically deleted in normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Ended => write!(f, "ended"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Active
    }
}

/// A persistent conversation thread owned by one user.
///
/// The `updated_at` timestamp moves forward on every appended message and
/// title edit, which drives the newest-first chat listing. Once feedback
/// has been submitted the chat is `locked` and feedback becomes
/// single-shot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_preview: Option<String>,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

/// One-shot user feedback embedded in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A bounded period of active interaction on a chat.
///
/// At most one session per (user, chat) may be `Active` at a time; the
/// conversation service enforces this by ending orphans before starting a
/// new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub chat_id: Uuid,
    pub user_id: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A single message within a chat.
///
/// Immutable once written. Ordering is by `(created_at, message_id)` so
/// two messages sharing a timestamp still sort deterministically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One page of a listing operation.
///
/// `next_cursor` is an opaque continuation token to be passed back
/// unchanged; `None` means the listing is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// An empty, exhausted page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}
