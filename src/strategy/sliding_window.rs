use crate::{
    Decision, KeyContext, LimitConfig, RateLimitKey, Store, TallyguardError,
    key::elapsed_fraction,
};

/// Weighted blend of the current and previous fixed windows.
///
/// # Algorithm
///
/// `effective = current + previous * (1 - elapsed_fraction_of_current_window)`
///
/// A call for `amount` is admitted iff `effective + amount - 1 < max`, evaluated
/// with the pre-increment `current` inside one atomic
/// [`Store::weighted_increment`]. The admission boundary is approximate
/// (non-integer) but never lets more than `max` actions into one window.
///
/// Counters live for two periods so the current window can still be read as
/// the previous one after the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindowStrategy {
    config: LimitConfig,
}

impl SlidingWindowStrategy {
    /// Tag embedded in every key written by this strategy.
    pub const TAG: &'static str = "sw";

    /// No store I/O happens here.
    pub fn new(config: LimitConfig) -> Self {
        Self { config }
    }

    /// Limit this strategy enforces.
    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    pub(crate) fn keys(&self, ctx: &KeyContext, now_ms: u64) -> (RateLimitKey, RateLimitKey) {
        let current = ctx.key(Self::TAG, self.config.period, now_ms);
        let previous = current.previous();

        (current, previous)
    }

    /// Weight of the previous window at `now_ms`.
    #[inline]
    fn previous_weight(&self, current: &RateLimitKey, now_ms: u64) -> f64 {
        // window 0 has no predecessor; `previous()` saturates onto itself
        if current.window_id() == 0 {
            return 0f64;
        }

        1f64 - elapsed_fraction(self.config.period, now_ms)
    }

    pub(crate) async fn increment(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
        amount: u64,
    ) -> Result<Decision, TallyguardError> {
        let (current, previous) = self.keys(ctx, now_ms);
        let weight = self.previous_weight(&current, now_ms);

        let reply = store
            .weighted_increment(
                &current.to_string(),
                &previous.to_string(),
                weight,
                amount,
                *self.config.max,
                self.config.period.as_duration() * 2,
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
        let (current, _) = self.keys(ctx, now_ms);
        store.read(&current.to_string()).await
    }

    /// `current + floor(previous * weight)`, two reads.
    pub(crate) async fn used(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<u64, TallyguardError> {
        let (current, previous) = self.keys(ctx, now_ms);
        let weight = self.previous_weight(&current, now_ms);

        let current_count = store.read(&current.to_string()).await?;
        if weight <= 0f64 {
            return Ok(current_count);
        }

        let previous_count = store.read(&previous.to_string()).await?;
        let weighted = (previous_count as f64 * weight).floor() as u64;

        Ok(current_count.saturating_add(weighted))
    } // end method used

    pub(crate) async fn decrement(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
        amount: u64,
    ) -> Result<u64, TallyguardError> {
        let (current, _) = self.keys(ctx, now_ms);
        store.decrement(&current.to_string(), amount).await
    }

    pub(crate) async fn reset(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<(), TallyguardError> {
        let (current, previous) = self.keys(ctx, now_ms);

        store.expire_now(&current.to_string()).await?;
        store.expire_now(&previous.to_string()).await
    } // end method reset
}
