//! Reasoning-loop state machine for one conversation turn.
//!
//! Given the working history, `TurnRunner` drives the model through zero
//! or more tool rounds to a final answer, emitting events in the exact
//! order transitions occur. Without tools the turn is a single model call;
//! with tools the model may alternate with tool execution until it stops
//! requesting calls, the round cap is hit, or the turn deadline expires.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use parley_types::config::ServiceConfig;
use parley_types::event::TurnEvent;
use parley_types::llm::{HistoryMessage, MessageRole, ModelTurn};

use crate::llm::ModelAccess;
use crate::tool::ToolRegistry;
use crate::trace::{TraceSink, TurnTrace};

use super::prompt;

/// Reply substituted when the backend fails mid-turn. The raw error never
/// reaches the conversation transcript.
pub const FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Tool results are cut to this many characters in `tool_result` events to
/// keep payloads small.
const TOOL_RESULT_PREVIEW_CHARS: usize = 200;

/// Execution limits for one turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnOptions {
    /// Deadline covering the whole turn.
    pub timeout: Duration,
    /// Hard cap on model-tool rounds.
    pub max_tool_rounds: u32,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_tool_rounds: 8,
        }
    }
}

impl TurnOptions {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.turn_timeout_secs),
            max_tool_rounds: config.max_tool_rounds,
        }
    }
}

/// Drives the per-turn state machine
/// `ProcessInput -> (Respond | Agent <-> Tools) -> Done`.
///
/// Lightweight coordinator: each `run_turn` call is independent, so one
/// runner is shared across all concurrent turns.
#[derive(Clone)]
pub struct TurnRunner {
    access: Arc<dyn ModelAccess>,
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn TraceSink>,
    options: TurnOptions,
}

impl TurnRunner {
    pub fn new(
        access: Arc<dyn ModelAccess>,
        registry: Arc<ToolRegistry>,
        sink: Arc<dyn TraceSink>,
        options: TurnOptions,
    ) -> Self {
        Self {
            access,
            registry,
            sink,
            options,
        }
    }

    pub fn options(&self) -> TurnOptions {
        self.options
    }

    /// Execute one turn over `history` (which already ends with the user's
    /// question) and stream events as they occur.
    ///
    /// The stream never yields `Start` or `End`; the conversation service
    /// frames the turn with those. `Error` is terminal when it appears.
    pub fn run_turn(
        &self,
        history: Vec<HistoryMessage>,
        trace: TurnTrace,
    ) -> impl Stream<Item = TurnEvent> + Send + 'static {
        let access = self.access.clone();
        let registry = self.registry.clone();
        let sink = self.sink.clone();
        let options = self.options;

        stream! {
            let deadline = Instant::now() + options.timeout;
            sink.turn_started(&trace);

            // ProcessInput: nothing to answer without a user message.
            if !history.iter().any(|m| m.role == MessageRole::User) {
                warn!(chat_id = %trace.chat_id, "no user message in history, skipping turn");
                sink.flush();
                return;
            }

            let tools = registry.descriptors();
            let system = prompt::system_prompt();
            let mut working = access.build_prompt(&history);

            if tools.is_empty() {
                // Respond: single model call, no tool cycle.
                match timeout_at(deadline, access.model().invoke(system, &working, &[])).await {
                    Err(_) => {
                        yield timeout_event(options.timeout);
                        sink.flush();
                        return;
                    }
                    Ok(Err(err)) => {
                        warn!(error = %err, "model call failed, substituting fallback reply");
                        yield TurnEvent::AgentResponse {
                            message_id: None,
                            content: FALLBACK_REPLY.to_string(),
                        };
                    }
                    Ok(Ok(turn)) => {
                        if let Some(text) = nonempty_text(&turn) {
                            yield TurnEvent::AgentResponse {
                                message_id: None,
                                content: text,
                            };
                        }
                    }
                }
                sink.flush();
                return;
            }

            // Agent <-> Tools cycle.
            let mut rounds: u32 = 0;
            loop {
                let turn = match timeout_at(
                    deadline,
                    access.model().invoke(system, &working, &tools),
                )
                .await
                {
                    Err(_) => {
                        yield timeout_event(options.timeout);
                        sink.flush();
                        return;
                    }
                    Ok(Err(err)) => {
                        warn!(error = %err, "model call failed, substituting fallback reply");
                        yield TurnEvent::AgentResponse {
                            message_id: None,
                            content: FALLBACK_REPLY.to_string(),
                        };
                        break;
                    }
                    Ok(Ok(turn)) => turn,
                };

                if let Some(text) = nonempty_text(&turn) {
                    working.push(HistoryMessage::assistant(text.clone()));
                    yield TurnEvent::AgentResponse {
                        message_id: None,
                        content: text,
                    };
                }

                if turn.tool_calls.is_empty() {
                    break;
                }

                rounds += 1;
                if rounds > options.max_tool_rounds {
                    warn!(rounds, "tool loop limit exceeded, aborting turn");
                    yield TurnEvent::Error {
                        message: format!(
                            "tool loop limit exceeded after {} rounds",
                            options.max_tool_rounds
                        ),
                    };
                    sink.flush();
                    return;
                }

                debug!(
                    round = rounds,
                    tools = ?turn.tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                    "dispatching tool calls"
                );

                for call in &turn.tool_calls {
                    yield TurnEvent::ToolCall {
                        tool: call.name.clone(),
                        args: call.arguments.clone(),
                    };
                }

                for call in turn.tool_calls {
                    let outcome = match registry.get(&call.name) {
                        Some(tool) => {
                            match timeout_at(deadline, tool.invoke(call.arguments.clone())).await {
                                Err(_) => {
                                    yield timeout_event(options.timeout);
                                    sink.flush();
                                    return;
                                }
                                Ok(Ok(result)) => result,
                                // Tool failures go back to the model as
                                // content, not up to the caller.
                                Ok(Err(err)) => format!("tool error: {err}"),
                            }
                        }
                        None => format!("unknown tool: {}", call.name),
                    };

                    working.push(HistoryMessage::tool(call.name.clone(), outcome.clone()));
                    yield TurnEvent::ToolResult {
                        tool: call.name,
                        result: truncate_chars(&outcome, TOOL_RESULT_PREVIEW_CHARS),
                    };
                }
            }

            sink.flush();
        }
    }
}

impl std::fmt::Debug for TurnRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRunner")
            .field("options", &self.options)
            .finish()
    }
}

fn timeout_event(timeout: Duration) -> TurnEvent {
    TurnEvent::Error {
        message: format!("turn timed out after {}s", timeout.as_secs()),
    }
}

fn nonempty_text(turn: &ModelTurn) -> Option<String> {
    turn.text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Cut `s` to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
