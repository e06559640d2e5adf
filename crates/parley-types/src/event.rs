//! Turn event types for Parley.
//!
//! `TurnEvent` is the closed union streamed to callers during a
//! conversation turn. Consumers match it exhaustively so a new event kind
//! is a compile error rather than a silently dropped record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted during a conversation turn, in state-transition order.
///
/// The stream itself is the error channel: every failure mode still ends
/// the stream with a well-formed `Error` or `End` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Emitted once after chat and session resolution.
    Start {
        session_id: Uuid,
        chat_id: Uuid,
        /// Pre-generated id of the eventual assistant message.
        message_id: Uuid,
    },

    /// A full (or superseding) answer from the model. The last occurrence
    /// before `End` holds the final answer.
    AgentResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<Uuid>,
        content: String,
    },

    /// The model requested a tool invocation.
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },

    /// A tool invocation completed; `result` is truncated to a bounded
    /// preview length.
    ToolResult { tool: String, result: String },

    /// Terminal for the turn; ends the stream.
    Error { message: String },

    /// Terminal on success.
    End {
        message_id: Uuid,
        session_id: Uuid,
        chat_id: Uuid,
        full_text: String,
    },
}
