//! Redis-backed store.
//!
//! Enables rate limiting across processes and hosts with Redis as the shared
//! counter store. Every mutating operation is one atomic Lua script.
//!
//! # Requirements
//!
//! - **Redis:** >= 6.2.0
//! - **Runtime:** Tokio (feature `redis-tokio`)

mod client;
pub use client::*;

mod redis_store;
pub use redis_store::*;
