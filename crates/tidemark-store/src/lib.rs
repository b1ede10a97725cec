//! Cache store capability for the Tidemark sync engine.
//!
//! The persistent event cache is consumed as an injected capability rather
//! than a module-level singleton: the [`CacheStore`] trait exposes
//! key-addressed reads and idempotent write-merges over per-scope event
//! ranges, and [`MemoryStore`] provides a deterministic in-memory
//! implementation for tests and embedding.
//!
//! Miss detection lives in [`miss`]: given a requested range, index set, or
//! window and any [`CacheStore`], it splits the request into locally
//! available events and the indexes that must be fetched remotely.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod memory;
pub mod miss;
mod store;

pub use memory::MemoryStore;
pub use store::{CacheStore, FailedSendRecord, StoreError};
