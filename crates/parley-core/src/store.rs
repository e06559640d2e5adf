//! ConversationStore trait definition.
//!
//! Provides persistence for chats, sessions, and messages over the
//! single-table layout. Implementations live in parley-infra
//! (e.g., `SingleTableStore`). Uses native async fn in traits (RPITIT,
//! Rust 2024 edition).

use parley_types::chat::{Chat, Feedback, Message, MessageRole, Page, Session};
use parley_types::error::StoreError;
use uuid::Uuid;

/// Repository trait for conversation persistence.
///
/// Pagination cursors are opaque backend-native tokens, round-tripped
/// unchanged by callers.
pub trait ConversationStore: Send + Sync {
    /// Create a new chat owned by `user_id`, writing the chat row and its
    /// listing-index entry in one atomic put.
    fn create_chat(
        &self,
        user_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Chat, StoreError>> + Send;

    /// Point lookup. `None` means the chat does not exist or is not owned
    /// by this user -- absence is not an error.
    fn get_chat(
        &self,
        user_id: &str,
        chat_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Chat>, StoreError>> + Send;

    /// List a user's chats, newest `updated_at` first.
    fn list_chats(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Page<Chat>, StoreError>> + Send;

    /// Unconditionally create a new active session. Does NOT enforce the
    /// one-active-session invariant; callers run orphan cleanup first.
    fn start_session(
        &self,
        user_id: &str,
        chat_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Session, StoreError>> + Send;

    /// All currently active sessions on a chat, across every user.
    fn list_active_sessions_by_chat(
        &self,
        chat_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, StoreError>> + Send;

    /// All sessions (active and ended) on a chat, newest first.
    fn list_sessions_by_chat(
        &self,
        chat_id: Uuid,
        limit: i64,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Page<Session>, StoreError>> + Send;

    /// Update the session's `last_event_at`. Fails with
    /// `StoreError::SessionNotFound` when the session row does not exist.
    fn touch_session(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// End a session: status, `ended_at`, and index relocation change in
    /// one conditional write. Ending a missing or already-ended session is
    /// not an error (idempotent).
    fn end_session(
        &self,
        user_id: &str,
        session_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Append a message to a chat's history. The ordering key is
    /// `(created_at, message_id)` so same-timestamp messages still sort
    /// deterministically. `message_id` is generated when not provided.
    fn append_message(
        &self,
        chat_id: Uuid,
        user_id: &str,
        role: MessageRole,
        content: &str,
        message_id: Option<Uuid>,
    ) -> impl std::future::Future<Output = Result<Message, StoreError>> + Send;

    /// Messages of a chat in creation order (oldest first).
    fn get_messages(
        &self,
        chat_id: Uuid,
        limit: i64,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Page<Message>, StoreError>> + Send;

    /// All messages authored under a user id, across chats, oldest first.
    fn list_messages_by_user(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Page<Message>, StoreError>> + Send;

    /// Update the chat's preview text and `updated_at`, relocating its
    /// listing-index sort key so the chat resurfaces at the top of the
    /// owner's list. `StoreError::ChatNotFound` when the chat row is
    /// absent.
    fn update_chat_preview(
        &self,
        user_id: &str,
        chat_id: Uuid,
        preview: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Update the chat title (same conditional pattern as the preview).
    fn update_chat_title(
        &self,
        user_id: &str,
        chat_id: Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Save one-shot feedback and lock the chat. Rewrites the whole
    /// embedded chat body in a single conditional update. A second
    /// submission fails with `StoreError::FeedbackLocked`.
    fn save_feedback(
        &self,
        user_id: &str,
        chat_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Feedback, StoreError>> + Send;
}
