//! Per-turn conversation façade.
//!
//! `ConversationService` ties session lifecycle to the reasoning loop:
//! it resolves or creates the chat and session, persists the user and
//! assistant messages exactly once per turn, and forwards the loop's event
//! stream to transport-agnostic callers. Storage and backend failures are
//! converted into terminal `error` events -- the stream itself is the
//! error channel, so callers always receive a well-formed terminal event.

use std::sync::Arc;

use async_stream::stream;
use futures_util::{Stream, StreamExt, pin_mut};
use tracing::{info, warn};
use uuid::Uuid;

use parley_types::chat::{Chat, Message, MessageRole, Page, Session};
use parley_types::error::StoreError;
use parley_types::event::TurnEvent;
use parley_types::llm::HistoryMessage;

use crate::agent::TurnRunner;
use crate::store::ConversationStore;
use crate::trace::TurnTrace;

/// New chats are titled with the question cut to this many characters.
const TITLE_MAX_CHARS: usize = 50;

/// Chat previews keep this many characters of the latest message.
const PREVIEW_MAX_CHARS: usize = 160;

struct Inner<S> {
    store: S,
    runner: TurnRunner,
    history_limit: i64,
    tools_enabled: bool,
}

/// Transport-agnostic conversation façade.
///
/// Cheap to clone; every turn executes independently against the shared
/// store and runner.
pub struct ConversationService<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ConversationService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ConversationStore + 'static> ConversationService<S> {
    pub fn new(store: S, runner: TurnRunner, history_limit: i64, tools_enabled: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                runner,
                history_limit,
                tools_enabled,
            }),
        }
    }

    /// Start a fresh session for `(user_id, chat_id)`, first ending any
    /// other active session the same user holds on the chat (orphan
    /// cleanup). Active sessions of other users are never touched.
    ///
    /// Cleanup failures are logged and do not abort the start.
    pub async fn start_managed_session(
        &self,
        user_id: &str,
        chat_id: Uuid,
    ) -> Result<Session, StoreError> {
        let active = self
            .inner
            .store
            .list_active_sessions_by_chat(chat_id)
            .await?;

        for session in active.iter().filter(|s| s.user_id == user_id) {
            warn!(
                session_id = %session.session_id,
                chat_id = %chat_id,
                "ending orphaned session"
            );
            if let Err(err) = self
                .inner
                .store
                .end_session(user_id, session.session_id)
                .await
            {
                warn!(
                    session_id = %session.session_id,
                    error = %err,
                    "orphan cleanup failed"
                );
            }
        }

        self.inner.store.start_session(user_id, chat_id).await
    }

    /// Run one conversation turn, streaming events to the caller.
    ///
    /// With no `chat_id` a new chat is created (titled from the question);
    /// with no `session_id` a managed session is started. The user message
    /// is persisted before the model runs; the assistant message is
    /// persisted exactly once, keyed by the message id announced in the
    /// `start` event.
    pub fn run(
        &self,
        user_id: impl Into<String>,
        question: impl Into<String>,
        chat_id: Option<Uuid>,
        session_id: Option<Uuid>,
    ) -> impl Stream<Item = TurnEvent> + Send + 'static {
        let inner = self.inner.clone();
        let service = self.clone();
        let user_id = user_id.into();
        let question = question.into();

        stream! {
            let message_id = Uuid::now_v7();

            // Resolve or create the chat.
            let chat_id = match chat_id {
                Some(id) => match inner.store.get_chat(&user_id, id).await {
                    Ok(Some(_)) => id,
                    Ok(None) => {
                        yield TurnEvent::Error {
                            message: "chat does not exist for this user".to_string(),
                        };
                        return;
                    }
                    Err(err) => {
                        yield TurnEvent::Error { message: err.to_string() };
                        return;
                    }
                },
                None => {
                    let title = truncate_with_ellipsis(&question, TITLE_MAX_CHARS);
                    match inner.store.create_chat(&user_id, &title).await {
                        Ok(chat) => {
                            info!(chat_id = %chat.chat_id, user_id = %user_id, "chat created");
                            chat.chat_id
                        }
                        Err(err) => {
                            yield TurnEvent::Error { message: err.to_string() };
                            return;
                        }
                    }
                }
            };

            // Resolve or start the session.
            let session_id = match session_id {
                Some(id) => id,
                None => match service.start_managed_session(&user_id, chat_id).await {
                    Ok(session) => session.session_id,
                    Err(err) => {
                        yield TurnEvent::Error { message: err.to_string() };
                        return;
                    }
                },
            };

            // Persist the user's side of the turn before invoking the
            // model; a failure here aborts without a model call.
            if let Err(err) = inner
                .store
                .append_message(chat_id, &user_id, MessageRole::User, &question, None)
                .await
            {
                yield TurnEvent::Error { message: err.to_string() };
                return;
            }
            if let Err(err) = inner
                .store
                .update_chat_preview(&user_id, chat_id, &truncate_chars(&question, PREVIEW_MAX_CHARS))
                .await
            {
                yield TurnEvent::Error { message: err.to_string() };
                return;
            }
            if let Err(err) = inner.store.touch_session(&user_id, session_id).await {
                yield TurnEvent::Error { message: err.to_string() };
                return;
            }

            yield TurnEvent::Start {
                session_id,
                chat_id,
                message_id,
            };

            // Full history (ends with the just-persisted user message).
            let history = match inner
                .store
                .get_messages(chat_id, inner.history_limit, None)
                .await
            {
                Ok(page) => page
                    .items
                    .into_iter()
                    .map(|m| HistoryMessage {
                        role: m.role,
                        content: m.content,
                        tool: None,
                    })
                    .collect::<Vec<_>>(),
                Err(err) => {
                    yield TurnEvent::Error { message: err.to_string() };
                    return;
                }
            };

            let trace = TurnTrace {
                user_id: user_id.clone(),
                chat_id,
                session_id,
                tools_enabled: inner.tools_enabled,
            };

            let mut full_text = String::new();
            let turn_stream = inner.runner.run_turn(history, trace);
            pin_mut!(turn_stream);

            while let Some(event) = turn_stream.next().await {
                match event {
                    TurnEvent::AgentResponse { content, .. } => {
                        full_text = content.clone();
                        yield TurnEvent::AgentResponse {
                            message_id: Some(message_id),
                            content,
                        };
                    }
                    TurnEvent::Error { message } => {
                        yield TurnEvent::Error { message };
                        return;
                    }
                    event @ (TurnEvent::ToolCall { .. } | TurnEvent::ToolResult { .. }) => {
                        yield event;
                    }
                    // The runner never frames the turn; Start/End are
                    // owned by this service.
                    TurnEvent::Start { .. } | TurnEvent::End { .. } => {}
                }
            }

            if !full_text.is_empty() {
                if let Err(err) = inner
                    .store
                    .append_message(
                        chat_id,
                        &user_id,
                        MessageRole::Assistant,
                        &full_text,
                        Some(message_id),
                    )
                    .await
                {
                    yield TurnEvent::Error { message: err.to_string() };
                    return;
                }
                if let Err(err) = inner
                    .store
                    .update_chat_preview(
                        &user_id,
                        chat_id,
                        &truncate_chars(&full_text, PREVIEW_MAX_CHARS),
                    )
                    .await
                {
                    yield TurnEvent::Error { message: err.to_string() };
                    return;
                }
            }

            yield TurnEvent::End {
                message_id,
                session_id,
                chat_id,
                full_text,
            };
        }
    }

    // --- Repository pass-throughs ---

    /// End an active session (idempotent).
    pub async fn end_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        self.inner.store.end_session(user_id, session_id).await
    }

    /// List a user's chats, newest first.
    pub async fn list_chats(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Chat>, StoreError> {
        self.inner.store.list_chats(user_id, limit, cursor).await
    }

    /// Full message history of a chat, oldest first.
    pub async fn history(
        &self,
        chat_id: Uuid,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Message>, StoreError> {
        self.inner.store.get_messages(chat_id, limit, cursor).await
    }

    /// Rename a chat.
    pub async fn update_chat_title(
        &self,
        user_id: &str,
        chat_id: Uuid,
        title: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .store
            .update_chat_title(user_id, chat_id, title)
            .await
    }

    /// All sessions of a chat (active and ended), newest first.
    pub async fn list_sessions(
        &self,
        chat_id: Uuid,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Session>, StoreError> {
        self.inner
            .store
            .list_sessions_by_chat(chat_id, limit, cursor)
            .await
    }

    /// Submit one-shot feedback on a chat.
    pub async fn save_feedback(
        &self,
        user_id: &str,
        chat_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<parley_types::chat::Feedback, StoreError> {
        self.inner
            .store
            .save_feedback(user_id, chat_id, rating, comment)
            .await
    }
}

impl<S> std::fmt::Debug for ConversationService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationService").finish_non_exhaustive()
    }
}

/// Cut to at most `max` characters on a char boundary, no marker.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Cut to at most `max` characters, appending `...` when anything was cut.
fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
