use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::{Clock, CounterReply, Store, SystemClock, TallyguardError, WeightedReply};

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    count: u64,
    expires_at_ms: Option<u64>,
}

impl Counter {
    #[inline]
    fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at_ms, Some(expires_at_ms) if expires_at_ms <= now_ms)
    }
}

/// In-process [`Store`] backed by a [`DashMap`](dashmap::DashMap).
///
/// Each per-key operation runs while holding the key's shard lock, so
/// concurrent increments from any number of threads or tasks are serialized
/// exactly like script execution on a shared server. State is not shared
/// across processes.
///
/// # Expiry
///
/// Expiry is evaluated against the store's [`Clock`]. Expired counters read as 0
/// and are reset by the next increment. Every window writes a new key, so
/// expired keys are also swept from the map: at most once per
/// [`MemoryStore::SWEEP_INTERVAL`] of clock time, piggybacked on increments.
/// A store that goes idle keeps its last keys until the next increment, or
/// until [`MemoryStore::run_cleanup_loop`] reclaims them in the background.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tallyguard::{LimitConfig, MemoryStore, RateLimiter, RateLimiterOptions};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let rl = RateLimiter::new(RateLimiterOptions::new(Arc::new(MemoryStore::default())));
/// let limiter = rl
///     .limiter("api", "user_1", LimitConfig::new(2, 1).unwrap(), "fixed_window")
///     .unwrap();
///
/// assert!(limiter.increment().await.unwrap().allowed);
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    counters: DashMap<String, Counter>,
    next_sweep_ms: AtomicU64,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    /// Minimum clock time between two sweeps triggered by increments.
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

    /// Create an empty store that expires counters against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            counters: DashMap::new(),
            next_sweep_ms: AtomicU64::new(0),
            cleanup_task: Mutex::new(None),
        }
    } // end constructor

    /// Number of stored counters, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// `true` when no counter is stored.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every expired counter.
    pub fn purge_expired(&self) {
        self.purge_at(self.clock.now_ms());
    }

    /// Purge expired counters every `interval` on a background Tokio task.
    ///
    /// The task only holds a weak reference and ends once the store is dropped.
    /// Calling it while a loop is already running is a no-op. Fails with
    /// [`TallyguardError::InvalidConfig`] for a zero `interval` or outside a
    /// Tokio runtime.
    pub fn run_cleanup_loop(self: &Arc<Self>, interval: Duration) -> Result<(), TallyguardError> {
        if interval.is_zero() {
            return Err(TallyguardError::InvalidConfig(
                "cleanup interval must be greater than 0".to_string(),
            ));
        }

        let mut task = self.cleanup_task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            TallyguardError::InvalidConfig(format!("cleanup loop needs a tokio runtime: {e}"))
        })?;

        let store = Arc::downgrade(self);
        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                let Some(store) = store.upgrade() else {
                    break;
                };
                store.purge_expired();
            }
        }));

        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            "memory store cleanup loop started"
        );

        Ok(())
    } // end method run_cleanup_loop

    /// Stop the background cleanup loop, if any. Idempotent.
    pub fn stop_cleanup_loop(&self) {
        if let Some(handle) = self.cleanup_task.lock().take() {
            handle.abort();
            tracing::debug!("memory store cleanup loop stopped");
        }
    }

    fn purge_at(&self, now_ms: u64) {
        self.counters.retain(|_, counter| !counter.is_expired(now_ms));
    }

    /// Sweep if the last sweep is at least [`MemoryStore::SWEEP_INTERVAL`] old.
    fn maybe_sweep(&self, now_ms: u64) {
        let due_ms = self.next_sweep_ms.load(Ordering::Relaxed);
        if now_ms < due_ms {
            return;
        }

        let next_ms = now_ms.saturating_add(Self::SWEEP_INTERVAL.as_millis() as u64);

        // one caller wins the sweep, the others carry on
        if self
            .next_sweep_ms
            .compare_exchange(due_ms, next_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.purge_at(now_ms);
        }
    } // end method maybe_sweep

    fn read_at(&self, key: &str, now_ms: u64) -> u64 {
        let Some(counter) = self.counters.get(key) else {
            return 0;
        };

        if !counter.is_expired(now_ms) {
            return counter.count;
        }

        drop(counter);
        self.counters
            .remove_if(key, |_, counter| counter.is_expired(now_ms));

        0
    }

    fn increment_at(&self, key: &str, amount: u64, ttl: Duration, now_ms: u64) -> (u64, u64) {
        self.maybe_sweep(now_ms);

        let mut counter = self.counters.entry(key.to_string()).or_default();

        if counter.is_expired(now_ms) {
            *counter = Counter::default();
        }

        if counter.expires_at_ms.is_none() {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            counter.expires_at_ms = Some(now_ms.saturating_add(ttl_ms));
        }

        let pre = counter.count;
        counter.count = pre.saturating_add(amount);

        (pre, counter.count)
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup_task.get_mut().take() {
            handle.abort();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn conditional_increment(
        &self,
        key: &str,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<CounterReply, TallyguardError> {
        let (pre, count) = self.increment_at(key, amount, ttl, self.clock.now_ms());

        Ok(CounterReply {
            count,
            admitted: pre.saturating_add(amount) <= max,
        })
    } // end method conditional_increment

    async fn weighted_increment(
        &self,
        key: &str,
        previous_key: &str,
        previous_weight: f64,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<WeightedReply, TallyguardError> {
        let now_ms = self.clock.now_ms();

        // The previous window no longer receives increments, so reading it
        // outside the current key's lock cannot change the decision.
        let previous_count = self.read_at(previous_key, now_ms);
        let (pre, count) = self.increment_at(key, amount, ttl, now_ms);

        let effective = pre as f64 + previous_count as f64 * previous_weight;

        Ok(WeightedReply {
            count,
            previous_count,
            admitted: effective + (amount as f64) - 1f64 < max as f64,
        })
    } // end method weighted_increment

    async fn read(&self, key: &str) -> Result<u64, TallyguardError> {
        Ok(self.read_at(key, self.clock.now_ms()))
    }

    async fn decrement(&self, key: &str, amount: u64) -> Result<u64, TallyguardError> {
        let now_ms = self.clock.now_ms();

        let Some(mut counter) = self.counters.get_mut(key) else {
            return Ok(0);
        };

        if counter.is_expired(now_ms) {
            return Ok(0);
        }

        counter.count = counter.count.saturating_sub(amount);

        Ok(counter.count)
    } // end method decrement

    async fn expire_now(&self, key: &str) -> Result<(), TallyguardError> {
        self.counters.remove(key);
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), TallyguardError> {
        self.counters.clear();
        Ok(())
    }
}
