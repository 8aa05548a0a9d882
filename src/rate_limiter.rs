//! Per-process limiter context.
//!
//! A [`RateLimiter`] owns the store handle, the clock, the key prefix and the
//! store timeout. There is no global: every worker (thread, task or forked
//! process) builds its own context and hands it to the limiters it creates.
//! Store connections must never cross a fork boundary.

use std::{future::Future, sync::Arc};

use parking_lot::RwLock;

use crate::{
    Clock, KeyComponent, LimitConfig, Limiter, Store, StoreTimeoutMs, SystemClock,
    TallyguardError,
};

/// Configuration for [`RateLimiter`].
#[derive(Clone, Debug)]
pub struct RateLimiterOptions {
    /// Shared counter store.
    pub store: Arc<dyn Store>,
    /// Wall-clock source used to pick windows.
    pub clock: Arc<dyn Clock>,
    /// Optional prefix for all keys.
    ///
    /// Keys render as `<prefix>:<scope>:<identifier>:<tag>:<window>`.
    /// If `None`, defaults to `"tallyguard"`.
    pub prefix: Option<KeyComponent>,
    /// Deadline for every store round trip.
    pub timeout: StoreTimeoutMs,
}

impl RateLimiterOptions {
    /// Options with the system clock, default prefix and default timeout.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            prefix: None,
            timeout: StoreTimeoutMs::default(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    store: RwLock<Arc<dyn Store>>,
    clock: Arc<dyn Clock>,
    prefix: KeyComponent,
    timeout: StoreTimeoutMs,
}

/// Limiter context, cheap to clone.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tallyguard::{LimitConfig, MemoryStore, RateLimiter, RateLimiterOptions};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let rl = RateLimiter::new(RateLimiterOptions::new(Arc::new(MemoryStore::default())));
///
/// let limiter = rl
///     .limiter("login", "user_123", LimitConfig::new(1, 60).unwrap(), "fixed_window")
///     .unwrap();
///
/// assert!(limiter.increment().await.unwrap().allowed);
/// assert!(!limiter.increment().await.unwrap().allowed);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Shared>,
}

impl RateLimiter {
    /// Create a new [`RateLimiter`]. Performs no store I/O.
    pub fn new(options: RateLimiterOptions) -> Self {
        Self {
            inner: Arc::new(Shared {
                store: RwLock::new(options.store),
                clock: options.clock,
                prefix: options.prefix.unwrap_or_else(KeyComponent::default_prefix),
                timeout: options.timeout,
            }),
        }
    } // end constructor

    /// Connect a Redis-backed context from `settings`.
    #[cfg(feature = "redis-tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-tokio")))]
    pub async fn connect(settings: &crate::LimiterSettings) -> Result<Self, TallyguardError> {
        let store = crate::RedisStore::connect_with_connections(
            &settings.store_uri,
            settings.connection_count,
        )
        .await?;

        let mut options = RateLimiterOptions::new(Arc::new(store));
        options.prefix = Some(KeyComponent::try_from(settings.prefix.as_str())?);
        options.timeout = StoreTimeoutMs::try_from(settings.timeout_ms)?;

        tracing::info!(
            prefix = %settings.prefix,
            timeout_ms = settings.timeout_ms,
            "rate limiter connected"
        );

        Ok(Self::new(options))
    }

    /// Replace the store handle.
    ///
    /// Every limiter built from this context (and its clones) uses the new
    /// store from its next call on. Calling it again with the same target is
    /// harmless.
    pub fn configure(&self, store: Arc<dyn Store>) {
        *self.inner.store.write() = store;
        tracing::info!(prefix = %self.inner.prefix, "rate limiter store configured");
    }

    /// Current store handle.
    pub fn store(&self) -> Arc<dyn Store> {
        self.inner.store.read().clone()
    }

    /// Key prefix.
    pub fn prefix(&self) -> &KeyComponent {
        &self.inner.prefix
    }

    /// Store timeout.
    pub fn timeout(&self) -> StoreTimeoutMs {
        self.inner.timeout
    }

    /// Build a limiter for (`scope`, `identifier`). Shorthand for [`Limiter::new`].
    pub fn limiter(
        &self,
        scope: &str,
        identifier: &str,
        config: LimitConfig,
        strategy_name: &str,
    ) -> Result<Limiter, TallyguardError> {
        Limiter::new(self, scope, identifier, config, strategy_name)
    }

    /// Remove every counter in the store. Tests and resets only.
    pub async fn flush_all(&self) -> Result<(), TallyguardError> {
        let store = self.store();
        self.guarded(store.flush_all()).await
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Run a store operation under the configured timeout.
    pub(crate) async fn guarded<T, F>(&self, operation: F) -> Result<T, TallyguardError>
    where
        F: Future<Output = Result<T, TallyguardError>>,
    {
        let timeout = self.inner.timeout.as_duration();

        match tokio::time::timeout(timeout, operation).await {
            Ok(Err(TallyguardError::StoreTimeout(_))) | Err(_) => {
                Err(TallyguardError::StoreTimeout(timeout))
            }
            Ok(result) => result,
        }
    } // end method guarded
}
