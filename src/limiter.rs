use crate::{
    Decision, KeyContext, LimitConfig, Outcome, RateLimitKey, RateLimiter, Strategy,
    TallyguardError,
};

/// Rate limiter for one (scope, identifier) pair.
///
/// Construction validates the key components, the config and the strategy name
/// but performs no store I/O. All I/O happens in the async methods, each
/// bounded by the context's store timeout.
///
/// # State per window
///
/// `absent → counting (1..=max) → limited (> max) → expired`. Denied increments
/// are still recorded, so the count keeps growing in the limited state. Expiry is
/// done by the store's TTL, or explicitly by [`Limiter::reset`].
///
/// # Store failures
///
/// [`TallyguardError::StoreUnavailable`] and [`TallyguardError::StoreTimeout`]
/// are returned unchanged. The limiter never guesses a decision; whether to fail
/// open or fail closed is the caller's call. A timeout means the increment may
/// or may not have been applied; [`Limiter::try_increment`] reports it as
/// [`Outcome::Unknown`].
#[derive(Clone, Debug)]
pub struct Limiter {
    context: RateLimiter,
    key_ctx: KeyContext,
    strategy: Strategy,
}

impl Limiter {
    /// Validate inputs and resolve `strategy_name`.
    ///
    /// Fails with [`TallyguardError::InvalidKeyComponent`] or
    /// [`TallyguardError::UnknownStrategy`].
    pub fn new(
        context: &RateLimiter,
        scope: &str,
        identifier: &str,
        config: LimitConfig,
        strategy_name: &str,
    ) -> Result<Self, TallyguardError> {
        let strategy = Strategy::resolve(strategy_name, config)?;
        let key_ctx = KeyContext::new(context.prefix().clone(), scope, identifier)?;

        Ok(Self {
            context: context.clone(),
            key_ctx,
            strategy,
        })
    } // end constructor

    /// Resolved strategy.
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Limit being enforced.
    pub fn config(&self) -> &LimitConfig {
        self.strategy.config()
    }

    /// Key the next increment would touch.
    pub fn current_key(&self) -> RateLimitKey {
        self.strategy
            .current_key(&self.key_ctx, self.context.now_ms())
    }

    /// Record one action and decide whether it may proceed.
    pub async fn increment(&self) -> Result<Decision, TallyguardError> {
        self.increment_by(1).await
    }

    /// Record `amount` actions at once.
    ///
    /// Admitted only if all of them fit. `amount` must be > 0.
    pub async fn increment_by(&self, amount: u64) -> Result<Decision, TallyguardError> {
        let (decision, _) = self.increment_keyed(amount).await?;
        Ok(decision)
    }

    /// Increment and return the key of the window that was charged.
    ///
    /// The key is derived from the same clock reading as the store call, so it
    /// names the charged window even when the call straddles a window edge.
    pub(crate) async fn increment_keyed(
        &self,
        amount: u64,
    ) -> Result<(Decision, RateLimitKey), TallyguardError> {
        if amount == 0 {
            return Err(TallyguardError::InvalidConfig(
                "increment amount must be greater than 0".to_string(),
            ));
        }

        let store = self.context.store();
        let now_ms = self.context.now_ms();
        let key = self.strategy.current_key(&self.key_ctx, now_ms);

        let result = self
            .context
            .guarded(
                self.strategy
                    .increment(store.as_ref(), &self.key_ctx, now_ms, amount),
            )
            .await;

        match &result {
            Ok(decision) => tracing::debug!(
                key = %key,
                strategy = %self.strategy.kind(),
                amount,
                allowed = decision.allowed,
                count = decision.current_count,
                "rate limit decision"
            ),
            Err(err) => tracing::warn!(
                key = %key,
                strategy = %self.strategy.kind(),
                error = %err,
                "rate limit increment failed"
            ),
        }

        result.map(|decision| (decision, key))
    } // end method increment_keyed

    /// [`Limiter::increment`] with a three-valued result.
    ///
    /// A store timeout becomes [`Outcome::Unknown`]. Other errors, including
    /// [`TallyguardError::StoreUnavailable`], are still returned as errors.
    pub async fn try_increment(&self) -> Result<Outcome, TallyguardError> {
        match self.increment().await {
            Ok(decision) => Ok(Outcome::from(decision)),
            Err(TallyguardError::StoreTimeout(_)) => Ok(Outcome::Unknown),
            Err(err) => Err(err),
        }
    }

    /// [`Limiter::increment`], turning a denial into
    /// [`TallyguardError::LimitExceeded`].
    pub async fn increment_strict(&self) -> Result<Decision, TallyguardError> {
        let (decision, key) = self.increment_keyed(1).await?;

        if !decision.allowed {
            return Err(TallyguardError::LimitExceeded {
                key: key.to_string(),
                max: *self.config().max,
            });
        }

        Ok(decision)
    }

    /// Counter of the current window. Does not mutate.
    pub async fn count(&self) -> Result<u64, TallyguardError> {
        let store = self.context.store();
        let now_ms = self.context.now_ms();

        self.context
            .guarded(self.strategy.count(store.as_ref(), &self.key_ctx, now_ms))
            .await
    }

    /// Slots left before the admission rule starts denying.
    pub async fn remaining(&self) -> Result<u64, TallyguardError> {
        let used = self.used().await?;
        Ok(self.config().max.saturating_sub(used))
    }

    /// Whether `amount` more actions would be denied right now. Does not mutate.
    pub async fn is_exceeded(&self, amount: u64) -> Result<bool, TallyguardError> {
        let used = self.used().await?;
        Ok(used.saturating_add(amount) > *self.config().max)
    }

    /// Give back `amount` actions in the current window, saturating at 0.
    pub async fn decrement_by(&self, amount: u64) -> Result<u64, TallyguardError> {
        let store = self.context.store();
        let now_ms = self.context.now_ms();

        self.context
            .guarded(
                self.strategy
                    .decrement(store.as_ref(), &self.key_ctx, now_ms, amount),
            )
            .await
    }

    /// Give back `amount` actions charged to `key`, whatever window is current now.
    pub(crate) async fn decrement_key(
        &self,
        key: &RateLimitKey,
        amount: u64,
    ) -> Result<u64, TallyguardError> {
        let store = self.context.store();

        self.context
            .guarded(store.decrement(&key.to_string(), amount))
            .await
    }

    /// Remove this limiter's counters. Intended for tests and administrative resets.
    pub async fn reset(&self) -> Result<(), TallyguardError> {
        let store = self.context.store();
        let now_ms = self.context.now_ms();

        self.context
            .guarded(self.strategy.reset(store.as_ref(), &self.key_ctx, now_ms))
            .await?;

        tracing::debug!(
            scope = %self.key_ctx.scope(),
            identifier = %self.key_ctx.identifier(),
            strategy = %self.strategy.kind(),
            "rate limit reset"
        );

        Ok(())
    }

    async fn used(&self) -> Result<u64, TallyguardError> {
        let store = self.context.store();
        let now_ms = self.context.now_ms();

        self.context
            .guarded(self.strategy.used(store.as_ref(), &self.key_ctx, now_ms))
            .await
    }
}
