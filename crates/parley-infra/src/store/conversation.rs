//! Single-table `ConversationStore` implementation.
//!
//! Entity layout (one shared table, composite `(PK, SK)` key, four
//! secondary-index projections):
//!
//! - Chat:    `PK=USER#{user_id}`  `SK=CHAT#{chat_id}`
//!   - GSI1 `USER#{user_id}` / `CHAT#{updated_at}#{chat_id}` -- listing
//! - Session: `PK=USER#{user_id}`  `SK=SESSION#{session_id}`
//!   - GSI2 `SESSION#STATUS#{status}` / `USER#{u}#START#{ts}#SESSION#{id}`
//!   - GSI3 `CHAT#{chat_id}` / `SESSION#{status}#START#{ts}#SESSION#{id}`
//! - Message: `PK=CHAT#{chat_id}`  `SK=MSG#{created_at}#{message_id}`
//!   - GSI4 `USER#{user_id}#MSG` / `MSG#{ts}#{chat_id}#{message_id}`
//!
//! Sort-key timestamps use fixed-width microsecond precision so
//! lexicographic order is chronological order. Keeping the canonical row
//! and its index keys in one record means a single conditional update
//! changes an entity's status and its index visibility atomically --
//! which is what the "active session" invariant rests on.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use parley_core::store::ConversationStore;
use parley_types::chat::{Chat, Feedback, Message, MessageRole, Page, Session, SessionStatus};
use parley_types::error::{StoreError, TableError};

use crate::table::{
    IndexColumn, Precondition, QueryRequest, TableClient, TableIndex, TableRecord, UpdatePatch,
};

/// How many rows an unpaginated active-session scan may return.
const ACTIVE_SESSION_SCAN_LIMIT: i64 = 100;

/// `ConversationStore` backed by the shared single table.
#[derive(Debug, Clone)]
pub struct SingleTableStore {
    table: TableClient,
    message_ttl_secs: Option<i64>,
}

impl SingleTableStore {
    pub fn new(table: TableClient) -> Self {
        Self {
            table,
            message_ttl_secs: None,
        }
    }

    /// Give stored messages a time-to-live; expired messages become
    /// invisible to reads.
    pub fn with_message_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.message_ttl_secs = Some(ttl_secs);
        self
    }
}

// ---------------------------------------------------------------------------
// Key layout
// ---------------------------------------------------------------------------

/// Fixed-width timestamp for sort keys: lexicographic == chronological.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn user_pk(user_id: &str) -> String {
    format!("USER#{user_id}")
}

fn chat_sk(chat_id: Uuid) -> String {
    format!("CHAT#{chat_id}")
}

fn chat_pk(chat_id: Uuid) -> String {
    format!("CHAT#{chat_id}")
}

fn session_sk(session_id: Uuid) -> String {
    format!("SESSION#{session_id}")
}

fn chat_listing_sort(ts: &str, chat_id: Uuid) -> String {
    format!("CHAT#{ts}#{chat_id}")
}

fn session_status_partition(status: SessionStatus) -> String {
    format!("SESSION#STATUS#{status}")
}

fn session_status_sort(user_id: &str, ts: &str, session_id: Uuid) -> String {
    format!("USER#{user_id}#START#{ts}#SESSION#{session_id}")
}

fn session_chat_sort(status: SessionStatus, ts: &str, session_id: Uuid) -> String {
    format!("SESSION#{status}#START#{ts}#SESSION#{session_id}")
}

fn message_sk(ts: &str, message_id: Uuid) -> String {
    format!("MSG#{ts}#{message_id}")
}

fn user_messages_partition(user_id: &str) -> String {
    format!("USER#{user_id}#MSG")
}

fn user_messages_sort(ts: &str, chat_id: Uuid, message_id: Uuid) -> String {
    format!("MSG#{ts}#{chat_id}#{message_id}")
}

fn parse_body<T: DeserializeOwned>(record: TableRecord) -> Result<T, StoreError> {
    serde_json::from_value(record.body)
        .map_err(|e| StoreError::Storage(format!("corrupt record: {e}")))
}

fn parse_page<T: DeserializeOwned>(
    records: Vec<TableRecord>,
    next_cursor: Option<String>,
) -> Result<Page<T>, StoreError> {
    let mut items = Vec::with_capacity(records.len());
    for record in records {
        items.push(parse_body(record)?);
    }
    Ok(Page { items, next_cursor })
}

// ---------------------------------------------------------------------------
// ConversationStore implementation
// ---------------------------------------------------------------------------

impl ConversationStore for SingleTableStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, StoreError> {
        let now = Utc::now();
        let ts = format_ts(&now);
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

        let record = TableRecord::new(
            user_pk(user_id),
            chat_sk(chat.chat_id),
            "CHAT",
            serde_json::to_value(&chat).map_err(|e| StoreError::Storage(e.to_string()))?,
        )
        .with_gsi1(user_pk(user_id), chat_listing_sort(&ts, chat.chat_id));

        self.table.put(&record).await?;
        Ok(chat)
    }

    async fn get_chat(&self, user_id: &str, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        let record = self.table.get(&user_pk(user_id), &chat_sk(chat_id)).await?;
        record.map(parse_body).transpose()
    }

    async fn list_chats(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Chat>, StoreError> {
        let page = self
            .table
            .query(&QueryRequest {
                index: Some(TableIndex::Gsi1),
                partition: user_pk(user_id),
                sort_prefix: Some("CHAT#".to_string()),
                forward: false,
                limit,
                cursor: cursor.map(str::to_string),
            })
            .await?;
        parse_page(page.records, page.next_cursor)
    }

    async fn start_session(&self, user_id: &str, chat_id: Uuid) -> Result<Session, StoreError> {
        let now = Utc::now();
        let ts = format_ts(&now);
        let session = Session {
            session_id: Uuid::now_v7(),
            chat_id,
            user_id: user_id.to_string(),
            status: SessionStatus::Active,
            started_at: now,
            last_event_at: now,
            ended_at: None,
        };

        let record = TableRecord::new(
            user_pk(user_id),
            session_sk(session.session_id),
            "SESSION",
            serde_json::to_value(&session).map_err(|e| StoreError::Storage(e.to_string()))?,
        )
        .with_gsi2(
            session_status_partition(SessionStatus::Active),
            session_status_sort(user_id, &ts, session.session_id),
        )
        .with_gsi3(
            chat_pk(chat_id),
            session_chat_sort(SessionStatus::Active, &ts, session.session_id),
        );

        self.table.put(&record).await?;
        Ok(session)
    }

    async fn list_active_sessions_by_chat(
        &self,
        chat_id: Uuid,
    ) -> Result<Vec<Session>, StoreError> {
        let page = self
            .table
            .query(&QueryRequest {
                index: Some(TableIndex::Gsi3),
                partition: chat_pk(chat_id),
                sort_prefix: Some("SESSION#active#".to_string()),
                forward: false,
                limit: ACTIVE_SESSION_SCAN_LIMIT,
                cursor: None,
            })
            .await?;
        Ok(parse_page(page.records, None)?.items)
    }

    async fn list_sessions_by_chat(
        &self,
        chat_id: Uuid,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Session>, StoreError> {
        let page = self
            .table
            .query(&QueryRequest {
                index: Some(TableIndex::Gsi3),
                partition: chat_pk(chat_id),
                sort_prefix: Some("SESSION#".to_string()),
                forward: false,
                limit,
                cursor: cursor.map(str::to_string),
            })
            .await?;
        parse_page(page.records, page.next_cursor)
    }

    async fn touch_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        let ts = format_ts(&Utc::now());
        match self
            .table
            .update(
                &user_pk(user_id),
                &session_sk(session_id),
                UpdatePatch::new().set_field("last_event_at", json!(ts)),
                Precondition::RowExists,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(TableError::PreconditionFailed) => Err(StoreError::SessionNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn end_session(&self, user_id: &str, session_id: Uuid) -> Result<(), StoreError> {
        let ts = format_ts(&Utc::now());
        match self
            .table
            .update(
                &user_pk(user_id),
                &session_sk(session_id),
                UpdatePatch::new()
                    .set_field("status", json!(SessionStatus::Ended))
                    .set_field("ended_at", json!(ts))
                    .set_index(
                        IndexColumn::Gsi2Pk,
                        session_status_partition(SessionStatus::Ended),
                    )
                    .set_index(
                        IndexColumn::Gsi3Sk,
                        session_chat_sort(SessionStatus::Ended, &ts, session_id),
                    ),
                Precondition::RowExists,
            )
            .await
        {
            Ok(()) => Ok(()),
            // Already gone: ending twice is not an error.
            Err(TableError::PreconditionFailed) => {
                debug!(session_id = %session_id, "end_session on missing row, treating as ended");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        user_id: &str,
        role: MessageRole,
        content: &str,
        message_id: Option<Uuid>,
    ) -> Result<Message, StoreError> {
        let now = Utc::now();
        let ts = format_ts(&now);
        let message = Message {
            message_id: message_id.unwrap_or_else(Uuid::now_v7),
            chat_id,
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        };

        let mut record = TableRecord::new(
            chat_pk(chat_id),
            message_sk(&ts, message.message_id),
            "MSG",
            serde_json::to_value(&message).map_err(|e| StoreError::Storage(e.to_string()))?,
        )
        .with_gsi4(
            user_messages_partition(user_id),
            user_messages_sort(&ts, chat_id, message.message_id),
        );
        if let Some(ttl) = self.message_ttl_secs {
            record = record.with_expires_at(now.timestamp() + ttl);
        }

        self.table.put(&record).await?;
        Ok(message)
    }

    async fn get_messages(
        &self,
        chat_id: Uuid,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Message>, StoreError> {
        let page = self
            .table
            .query(&QueryRequest {
                index: None,
                partition: chat_pk(chat_id),
                sort_prefix: Some("MSG#".to_string()),
                forward: true,
                limit,
                cursor: cursor.map(str::to_string),
            })
            .await?;
        parse_page(page.records, page.next_cursor)
    }

    async fn list_messages_by_user(
        &self,
        user_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Page<Message>, StoreError> {
        let page = self
            .table
            .query(&QueryRequest {
                index: Some(TableIndex::Gsi4),
                partition: user_messages_partition(user_id),
                sort_prefix: Some("MSG#".to_string()),
                forward: true,
                limit,
                cursor: cursor.map(str::to_string),
            })
            .await?;
        parse_page(page.records, page.next_cursor)
    }

    async fn update_chat_preview(
        &self,
        user_id: &str,
        chat_id: Uuid,
        preview: &str,
    ) -> Result<(), StoreError> {
        let ts = format_ts(&Utc::now());
        match self
            .table
            .update(
                &user_pk(user_id),
                &chat_sk(chat_id),
                UpdatePatch::new()
                    .set_field("updated_at", json!(ts))
                    .set_field("last_message_preview", json!(preview))
                    .set_index(IndexColumn::Gsi1Sk, chat_listing_sort(&ts, chat_id)),
                Precondition::RowExists,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(TableError::PreconditionFailed) => Err(StoreError::ChatNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn update_chat_title(
        &self,
        user_id: &str,
        chat_id: Uuid,
        title: &str,
    ) -> Result<(), StoreError> {
        let ts = format_ts(&Utc::now());
        match self
            .table
            .update(
                &user_pk(user_id),
                &chat_sk(chat_id),
                UpdatePatch::new()
                    .set_field("title", json!(title))
                    .set_field("updated_at", json!(ts))
                    .set_index(IndexColumn::Gsi1Sk, chat_listing_sort(&ts, chat_id)),
                Precondition::RowExists,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(TableError::PreconditionFailed) => Err(StoreError::ChatNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_feedback(
        &self,
        user_id: &str,
        chat_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Feedback, StoreError> {
        let mut chat = self
            .get_chat(user_id, chat_id)
            .await?
            .ok_or(StoreError::ChatNotFound)?;

        if chat.locked && chat.feedback.is_some() {
            return Err(StoreError::FeedbackLocked);
        }

        let now = Utc::now();
        let feedback = Feedback {
            rating,
            comment: comment.map(str::to_string),
            created_at: now,
        };
        chat.feedback = Some(feedback.clone());
        chat.locked = true;
        chat.updated_at = now;

        // Rewrite the whole embedded body in one conditional update to
        // dodge partial-path hazards on the nested feedback document.
        match self
            .table
            .update(
                &user_pk(user_id),
                &chat_sk(chat_id),
                UpdatePatch::replace_body(
                    serde_json::to_value(&chat).map_err(|e| StoreError::Storage(e.to_string()))?,
                ),
                Precondition::RowExists,
            )
            .await
        {
            Ok(()) => Ok(feedback),
            Err(TableError::PreconditionFailed) => Err(StoreError::ChatNotFound),
            Err(err) => Err(err.into()),
        }
    }
}
