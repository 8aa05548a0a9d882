//! Contract over the external key-value store.
//!
//! Every mutating operation must execute as one indivisible step on the store
//! side. Clients never read a counter and then write it back in a second call.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;

use crate::TallyguardError;

/// Reply of [`Store::conditional_increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterReply {
    /// Counter value after the increment.
    pub count: u64,
    /// Whether the pre-increment count plus the amount fit under `max`.
    pub admitted: bool,
}

/// Reply of [`Store::weighted_increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedReply {
    /// Current window counter after the increment.
    pub count: u64,
    /// Previous window counter as read inside the same atomic step.
    pub previous_count: u64,
    /// Whether the weighted pre-increment estimate left room for the amount.
    pub admitted: bool,
}

/// Atomic counter store shared by all limiter processes.
///
/// Implementations report transport failures as
/// [`TallyguardError::StoreUnavailable`] and never retry internally.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Increment `key` by `amount` and decide admission in one atomic step.
    ///
    /// - The expiry is set to `ttl` only when the key has none (first creation).
    /// - `admitted` is `pre + amount <= max`, where `pre` is the count before
    ///   this call. With `amount = 1` that is `pre < max`.
    /// - The increment is applied even when not admitted.
    async fn conditional_increment(
        &self,
        key: &str,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<CounterReply, TallyguardError>;

    /// Sliding-window form of [`Store::conditional_increment`].
    ///
    /// Reads `previous_key`, increments `key` and admits iff
    /// `pre + previous * previous_weight + amount - 1 < max`, all in one step.
    async fn weighted_increment(
        &self,
        key: &str,
        previous_key: &str,
        previous_weight: f64,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<WeightedReply, TallyguardError>;

    /// Current value of `key`; missing or expired keys read as 0.
    async fn read(&self, key: &str) -> Result<u64, TallyguardError>;

    /// Subtract `amount` from `key`, saturating at 0.
    ///
    /// Keeps the existing expiry and never creates the key. Returns the new value.
    async fn decrement(&self, key: &str, amount: u64) -> Result<u64, TallyguardError>;

    /// Remove `key` immediately.
    async fn expire_now(&self, key: &str) -> Result<(), TallyguardError>;

    /// Remove every counter in the store's namespace.
    async fn flush_all(&self) -> Result<(), TallyguardError>;
}
