//! Infrastructure layer for Parley.
//!
//! Contains the implementations behind the ports defined in `parley-core`:
//! the SQLite-backed single-table storage client, the conversation store
//! built on top of it, and the TOML configuration loader.

pub mod config;
pub mod store;
pub mod table;
