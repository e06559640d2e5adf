//! Service configuration types for Parley.
//!
//! `ServiceConfig` represents the top-level `parley.toml` controlling turn
//! execution, history fetching, channel caching, and message expiry. All
//! fields have sensible defaults so an absent or partial file still yields
//! a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Parley service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Deadline for one full conversation turn, in seconds.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Hard cap on model-tool rounds within one turn.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// How many history messages to load when invoking the model.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,

    /// Capacity of the per-channel session cache (LRU).
    #[serde(default = "default_channel_cache_capacity")]
    pub channel_cache_capacity: usize,

    /// Optional time-to-live for stored messages, in seconds.
    #[serde(default)]
    pub message_ttl_secs: Option<u64>,

    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// WhatsApp channel settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Token the channel provider echoes during webhook verification.
    pub verify_token: Option<String>,
}

fn default_turn_timeout_secs() -> u64 {
    120
}

fn default_max_tool_rounds() -> u32 {
    8
}

fn default_history_limit() -> i64 {
    1000
}

fn default_channel_cache_capacity() -> usize {
    256
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: default_turn_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            history_limit: default_history_limit(),
            channel_cache_capacity: default_channel_cache_capacity(),
            message_ttl_secs: None,
            whatsapp: WhatsAppConfig::default(),
        }
    }
}
