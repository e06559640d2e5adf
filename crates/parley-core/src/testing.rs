//! Shared test fixtures: an in-memory `ConversationStore` double and a
//! fixed-reply model.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;

use chrono::Utc;
use uuid::Uuid;

use parley_types::chat::{Chat, Feedback, Message, MessageRole, Page, Session, SessionStatus};
use parley_types::error::StoreError;
use parley_types::llm::{HistoryMessage, ModelError, ModelTurn, ToolDescriptor};

use crate::llm::ReasoningModel;
use crate::store::ConversationStore;

/// In-memory store double. Pagination is not modeled: cursors always come
/// back `None`. `fail_preview` injects a storage failure into
/// `update_chat_preview`.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) chats: Mutex<HashMap<(String, Uuid), Chat>>,
    pub(crate) sessions: Mutex<HashMap<(String, Uuid), Session>>,
    pub(crate) messages: Mutex<Vec<Message>>,
    pub(crate) fail_preview: AtomicBool,
}

impl ConversationStore for MemoryStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, StoreError> {
        let now = Utc::now();
        let chat = Chat {
            chat_id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
            last_message_preview: None,
            locked: false,
            feedback: None,
        };
        self.chats
            .lock()
            .unwrap()
            .insert((user_id.to_string(), chat.chat_id), chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, user_id: &str, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), chat_id))
            .cloned())
    }

    async fn list_chats(
        &self,
        user_id: &str,
        _limit: i64,
        _cursor: Option<&str>,
    ) -> Result<Page<Chat>, StoreError> {
        let mut items: Vec<Chat> = self
            .chats
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(Page {
            items,
            next_cursor: None,
        })
    }

    async fn start_session(&self, user_id: &str, chat_id: Uuid) -> Result<Session, StoreError> {
        let now = Utc::now();
        let session = Session {
            session_id: Uuid::now_v7(),
            chat_id,
            user_id: user_id.to_string(),
            status: SessionStatus::Active,
            started_at: now,
            last_event_at: now,
            ended_at: None,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert((user_id.to_string(), session.session_id), session.clone());
        Ok(session)
    }

    async fn list_active_sessions_by_chat(
        &self,
        chat_id: Uuid,
    ) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.chat_id == chat_id && s.status == SessionStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_sessions_by_chat(
        &self,
        chat_id: Uuid,
        _limit: i64,
        _cursor: Option<&str>,
    ) -> Result<Page<Session>, StoreError> {
        let items = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.chat_id == chat_id)
            .cloned()
            .collect();
        Ok(Page {
            items,
            next_cursor: None,
        })
    }

    async fn touch_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&(user_id.to_string(), session_id)) {
            Some(session) => {
                session.last_event_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::SessionNotFound),
        }
    }

    async fn end_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&(user_id.to_string(), session_id)) {
            session.status = SessionStatus::Ended;
            session.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        user_id: &str,
        role: MessageRole,
        content: &str,
        message_id: Option<Uuid>,
    ) -> Result<Message, StoreError> {
        let message = Message {
            message_id: message_id.unwrap_or_else(Uuid::now_v7),
            chat_id,
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn get_messages(
        &self,
        chat_id: Uuid,
        _limit: i64,
        _cursor: Option<&str>,
    ) -> Result<Page<Message>, StoreError> {
        let items = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        Ok(Page {
            items,
            next_cursor: None,
        })
    }

    async fn list_messages_by_user(
        &self,
        user_id: &str,
        _limit: i64,
        _cursor: Option<&str>,
    ) -> Result<Page<Message>, StoreError> {
        let items = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        Ok(Page {
            items,
            next_cursor: None,
        })
    }

    async fn update_chat_preview(
        &self,
        user_id: &str,
        chat_id: Uuid,
        preview: &str,
    ) -> Result<(), StoreError> {
        if self.fail_preview.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Storage("injected failure".to_string()));
        }
        let mut chats = self.chats.lock().unwrap();
        match chats.get_mut(&(user_id.to_string(), chat_id)) {
            Some(chat) => {
                chat.last_message_preview = Some(preview.to_string());
                chat.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::ChatNotFound),
        }
    }

    async fn update_chat_title(
        &self,
        user_id: &str,
        chat_id: Uuid,
        title: &str,
    ) -> Result<(), StoreError> {
        let mut chats = self.chats.lock().unwrap();
        match chats.get_mut(&(user_id.to_string(), chat_id)) {
            Some(chat) => {
                chat.title = title.to_string();
                chat.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::ChatNotFound),
        }
    }

    async fn save_feedback(
        &self,
        user_id: &str,
        chat_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Feedback, StoreError> {
        let mut chats = self.chats.lock().unwrap();
        let chat = chats
            .get_mut(&(user_id.to_string(), chat_id))
            .ok_or(StoreError::ChatNotFound)?;
        if chat.locked && chat.feedback.is_some() {
            return Err(StoreError::FeedbackLocked);
        }
        let feedback = Feedback {
            rating,
            comment: comment.map(str::to_string),
            created_at: Utc::now(),
        };
        chat.feedback = Some(feedback.clone());
        chat.locked = true;
        Ok(feedback)
    }
}

/// Model that always replies with the same text.
pub(crate) struct FixedModel(pub(crate) &'static str);

impl ReasoningModel for FixedModel {
    fn invoke(
        &self,
        _system: &str,
        _messages: &[HistoryMessage],
        _tools: &[ToolDescriptor],
    ) -> Pin<Box<dyn Future<Output = Result<ModelTurn, ModelError>> + Send + '_>> {
        let text = self.0;
        Box::pin(async move { Ok(ModelTurn::text(text)) })
    }
}
