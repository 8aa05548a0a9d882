use crate::{Decision, KeyContext, LimitConfig, RateLimitKey, Store, TallyguardError};

/// One counter per period-aligned window.
///
/// # Algorithm
///
/// 1. **Key:** `window_id = now / period`; every call in the window shares it
/// 2. **Admission:** one atomic [`Store::conditional_increment`] with `max`
/// 3. **Expiry:** the counter's TTL is one period, set when the key is created
///
/// # Window boundary bursts
///
/// Windows are independent, so a caller can spend `max` at the very end of one
/// window and `max` again at the start of the next: up to `2 * max` actions in
/// any span of one period. Use [`SlidingWindowStrategy`](crate::SlidingWindowStrategy)
/// when that is too loose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindowStrategy {
    config: LimitConfig,
}

impl FixedWindowStrategy {
    /// Tag embedded in every key written by this strategy.
    pub const TAG: &'static str = "fw";

    /// No store I/O happens here.
    pub fn new(config: LimitConfig) -> Self {
        Self { config }
    }

    /// Limit this strategy enforces.
    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    pub(crate) fn key(&self, ctx: &KeyContext, now_ms: u64) -> RateLimitKey {
        ctx.key(Self::TAG, self.config.period, now_ms)
    }

    pub(crate) async fn increment(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
        amount: u64,
    ) -> Result<Decision, TallyguardError> {
        let key = self.key(ctx, now_ms).to_string();

        let reply = store
            .conditional_increment(
                &key,
                amount,
                *self.config.max,
                self.config.period.as_duration(),
            )
            .await?;

        Ok(Decision {
            allowed: reply.admitted,
            current_count: reply.count,
        })
    } // end method increment

    pub(crate) async fn count(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<u64, TallyguardError> {
        store.read(&self.key(ctx, now_ms).to_string()).await
    }

    pub(crate) async fn decrement(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
        amount: u64,
    ) -> Result<u64, TallyguardError> {
        store
            .decrement(&self.key(ctx, now_ms).to_string(), amount)
            .await
    }

    pub(crate) async fn reset(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<(), TallyguardError> {
        store.expire_now(&self.key(ctx, now_ms).to_string()).await
    }
}
