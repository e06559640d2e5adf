//! Per-turn reasoning loop.
//!
//! `TurnRunner` drives one bounded conversation turn through the model and
//! the tool registry, emitting an ordered event stream. `prompt` holds the
//! system prompt used for every call.

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{TurnOptions, TurnRunner};
