use thiserror::Error;

/// Errors from the generic single-table storage client.
///
/// `PreconditionFailed` is the one distinguished variant: it signals a
/// lost optimistic-precondition race (e.g. "row must already exist") and
/// callers decide what it means for their entity. Everything else is an
/// opaque backend failure; no retries happen at this layer.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("precondition failed")]
    PreconditionFailed,

    #[error("invalid continuation token")]
    BadCursor,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors from conversation store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chat not found")]
    ChatNotFound,

    #[error("session not found")]
    SessionNotFound,

    #[error("feedback already submitted for this chat")]
    FeedbackLocked,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<TableError> for StoreError {
    fn from(err: TableError) -> Self {
        // PreconditionFailed is context-dependent (chat vs session vs ok);
        // call sites map it explicitly before falling through to here.
        StoreError::Storage(err.to_string())
    }
}

/// Errors from tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("execution failed: {0}")]
    Execution(String),
}

/// Errors from the outbound channel adapter.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel is not configured")]
    Disabled,

    #[error("delivery failed: {0}")]
    Delivery(String),
}
