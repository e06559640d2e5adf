//! Best-effort trace sink hooks.
//!
//! A `TraceSink` receives per-turn callbacks (turn start, score, flush).
//! Every hook is fire-and-forget: a sink failure must never fail the turn,
//! so the trait exposes infallible methods and implementations swallow
//! their own errors.

use tracing::info;
use uuid::Uuid;

/// Context identifying one conversation turn for tracing purposes.
#[derive(Debug, Clone)]
pub struct TurnTrace {
    pub user_id: String,
    pub chat_id: Uuid,
    pub session_id: Uuid,
    pub tools_enabled: bool,
}

/// Per-turn observability hooks, all best-effort.
pub trait TraceSink: Send + Sync {
    /// A turn is starting.
    fn turn_started(&self, trace: &TurnTrace);

    /// Record a quality score or feedback value against a turn.
    fn score(&self, name: &str, value: f64, comment: Option<&str>);

    /// Flush buffered trace data (called at the end of each turn).
    fn flush(&self);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn turn_started(&self, _trace: &TurnTrace) {}
    fn score(&self, _name: &str, _value: f64, _comment: Option<&str>) {}
    fn flush(&self) {}
}

/// Sink that emits structured log events for each hook. Useful when no
/// external tracing backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn turn_started(&self, trace: &TurnTrace) {
        info!(
            user_id = %trace.user_id,
            chat_id = %trace.chat_id,
            session_id = %trace.session_id,
            tools_enabled = trace.tools_enabled,
            "turn started"
        );
    }

    fn score(&self, name: &str, value: f64, comment: Option<&str>) {
        info!(score = %name, value, comment = comment.unwrap_or(""), "turn scored");
    }

    fn flush(&self) {}
}
