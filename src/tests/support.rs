use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    CounterReply, LimitConfig, Limiter, ManualClock, MemoryStore, RateLimiter,
    RateLimiterOptions, Store, StoreTimeoutMs, TallyguardError, WeightedReply,
};

/// Start of window 100 for a 1s period and of window 10 for a 10s period.
pub(super) const T0_MS: u64 = 100_000;

pub(super) fn memory_context(clock: &ManualClock) -> (RateLimiter, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));

    let options = RateLimiterOptions {
        store: store.clone(),
        clock: Arc::new(clock.clone()),
        prefix: None,
        timeout: StoreTimeoutMs::default(),
    };

    (RateLimiter::new(options), store)
}

pub(super) fn limiter(
    rl: &RateLimiter,
    identifier: &str,
    max: u64,
    period_seconds: u64,
    strategy: &str,
) -> Limiter {
    rl.limiter(
        "test",
        identifier,
        LimitConfig::new(max, period_seconds).unwrap(),
        strategy,
    )
    .unwrap()
}

pub(super) fn context_with_store(store: Arc<dyn Store>, timeout_ms: u64) -> RateLimiter {
    let mut options = RateLimiterOptions::new(store);
    options.timeout = StoreTimeoutMs::try_from(timeout_ms).unwrap();

    RateLimiter::new(options)
}

/// Store whose every operation fails with a transport error.
#[derive(Debug)]
pub(super) struct UnreachableStore;

pub(super) fn unreachable() -> TallyguardError {
    TallyguardError::StoreUnavailable("connection refused".to_string())
}

#[async_trait]
impl Store for UnreachableStore {
    async fn conditional_increment(
        &self,
        _key: &str,
        _amount: u64,
        _max: u64,
        _ttl: Duration,
    ) -> Result<CounterReply, TallyguardError> {
        Err(unreachable())
    }

    async fn weighted_increment(
        &self,
        _key: &str,
        _previous_key: &str,
        _previous_weight: f64,
        _amount: u64,
        _max: u64,
        _ttl: Duration,
    ) -> Result<WeightedReply, TallyguardError> {
        Err(unreachable())
    }

    async fn read(&self, _key: &str) -> Result<u64, TallyguardError> {
        Err(unreachable())
    }

    async fn decrement(&self, _key: &str, _amount: u64) -> Result<u64, TallyguardError> {
        Err(unreachable())
    }

    async fn expire_now(&self, _key: &str) -> Result<(), TallyguardError> {
        Err(unreachable())
    }

    async fn flush_all(&self) -> Result<(), TallyguardError> {
        Err(unreachable())
    }
}

/// Store that applies every operation, then stalls before answering.
#[derive(Debug)]
pub(super) struct StalledStore {
    pub inner: MemoryStore,
    pub delay: Duration,
}

#[async_trait]
impl Store for StalledStore {
    async fn conditional_increment(
        &self,
        key: &str,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<CounterReply, TallyguardError> {
        let reply = self
            .inner
            .conditional_increment(key, amount, max, ttl)
            .await?;
        tokio::time::sleep(self.delay).await;
        Ok(reply)
    }

    async fn weighted_increment(
        &self,
        key: &str,
        previous_key: &str,
        previous_weight: f64,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<WeightedReply, TallyguardError> {
        let reply = self
            .inner
            .weighted_increment(key, previous_key, previous_weight, amount, max, ttl)
            .await?;
        tokio::time::sleep(self.delay).await;
        Ok(reply)
    }

    async fn read(&self, key: &str) -> Result<u64, TallyguardError> {
        let count = self.inner.read(key).await?;
        tokio::time::sleep(self.delay).await;
        Ok(count)
    }

    async fn decrement(&self, key: &str, amount: u64) -> Result<u64, TallyguardError> {
        let count = self.inner.decrement(key, amount).await?;
        tokio::time::sleep(self.delay).await;
        Ok(count)
    }

    async fn expire_now(&self, key: &str) -> Result<(), TallyguardError> {
        self.inner.expire_now(key).await
    }

    async fn flush_all(&self) -> Result<(), TallyguardError> {
        self.inner.flush_all().await
    }
}

/// Store that moves a shared clock forward after every increment of a key
/// containing `marker`, as if that round trip took `step`.
#[derive(Debug)]
pub(super) struct SlowKeyStore {
    pub inner: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub marker: &'static str,
    pub step: Duration,
}

impl SlowKeyStore {
    fn after(&self, key: &str) {
        if key.contains(self.marker) {
            self.clock.advance(self.step);
        }
    }
}

#[async_trait]
impl Store for SlowKeyStore {
    async fn conditional_increment(
        &self,
        key: &str,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<CounterReply, TallyguardError> {
        let reply = self
            .inner
            .conditional_increment(key, amount, max, ttl)
            .await?;
        self.after(key);
        Ok(reply)
    }

    async fn weighted_increment(
        &self,
        key: &str,
        previous_key: &str,
        previous_weight: f64,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<WeightedReply, TallyguardError> {
        let reply = self
            .inner
            .weighted_increment(key, previous_key, previous_weight, amount, max, ttl)
            .await?;
        self.after(key);
        Ok(reply)
    }

    async fn read(&self, key: &str) -> Result<u64, TallyguardError> {
        self.inner.read(key).await
    }

    async fn decrement(&self, key: &str, amount: u64) -> Result<u64, TallyguardError> {
        self.inner.decrement(key, amount).await
    }

    async fn expire_now(&self, key: &str) -> Result<(), TallyguardError> {
        self.inner.expire_now(key).await
    }

    async fn flush_all(&self) -> Result<(), TallyguardError> {
        self.inner.flush_all().await
    }
}

/// Context over a [`SlowKeyStore`] sharing `store` and `clock`.
pub(super) fn slow_key_context(
    clock: &ManualClock,
    store: &Arc<MemoryStore>,
    marker: &'static str,
    step: Duration,
) -> RateLimiter {
    let slow = Arc::new(SlowKeyStore {
        inner: store.clone(),
        clock: clock.clone(),
        marker,
        step,
    });

    RateLimiter::new(RateLimiterOptions {
        store: slow,
        clock: Arc::new(clock.clone()),
        prefix: None,
        timeout: StoreTimeoutMs::default(),
    })
}
