//! In-process store.
//!
//! [`MemoryStore`] keeps counters within the current process using
//! [`DashMap`](dashmap::DashMap).
//!
//! # Key Characteristics
//!
//! - **Thread-safe:** per-key operations are atomic under the shard lock
//! - **Zero external dependencies:** no network or server required
//! - **Process-scoped:** state is not shared across processes
//!
//! # When to Use
//!
//! ✅ **Use the memory store when:**
//! - Single-process application
//! - Tests and benchmarks that need the atomic protocol without a server
//!
//! ❌ **Don't use it when:**
//! - Multiple processes or hosts must share one limit
//! - Counters must survive process restarts

mod memory_store;
pub use memory_store::*;
