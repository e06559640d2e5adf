//! Single-table storage primitives.
//!
//! One `records` table holds every entity; each record carries its
//! canonical key pair plus up to four secondary-index key pairs, so a
//! single write keeps an entity and its index visibility in sync.

pub mod client;
pub mod pool;

pub use client::{
    IndexColumn, Precondition, QueryPage, QueryRequest, TableClient, TableIndex, TableRecord,
    UpdatePatch,
};
pub use pool::DatabasePool;
