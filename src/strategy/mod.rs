//! Limiting strategies.
//!
//! The set of strategies is closed: names resolve through [`STRATEGY_TABLE`]
//! and an unknown name fails at construction with
//! [`TallyguardError::UnknownStrategy`], never at first use.

use std::{fmt, str::FromStr};

use crate::{Decision, KeyContext, LimitConfig, RateLimitKey, Store, TallyguardError};

mod fixed_window;
pub use fixed_window::*;

mod sliding_window;
pub use sliding_window::*;

/// Name of a limiting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// See [`FixedWindowStrategy`].
    FixedWindow,
    /// See [`SlidingWindowStrategy`].
    SlidingWindow,
}

/// Registered strategy names.
pub const STRATEGY_TABLE: &[(&str, StrategyKind)] = &[
    ("fixed_window", StrategyKind::FixedWindow),
    ("fixed", StrategyKind::FixedWindow),
    ("sliding_window", StrategyKind::SlidingWindow),
    ("sliding", StrategyKind::SlidingWindow),
];

impl StrategyKind {
    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::FixedWindow => "fixed_window",
            StrategyKind::SlidingWindow => "sliding_window",
        }
    }

    /// Tag embedded in store keys.
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyKind::FixedWindow => FixedWindowStrategy::TAG,
            StrategyKind::SlidingWindow => SlidingWindowStrategy::TAG,
        }
    }
}

impl FromStr for StrategyKind {
    type Err = TallyguardError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        STRATEGY_TABLE
            .iter()
            .find(|(registered, _)| registered.eq_ignore_ascii_case(name.trim()))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| TallyguardError::UnknownStrategy(name.to_string()))
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved strategy bound to its [`LimitConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fixed, period-aligned windows.
    FixedWindow(FixedWindowStrategy),
    /// Weighted current + previous window.
    SlidingWindow(SlidingWindowStrategy),
}

impl Strategy {
    /// Build the strategy for `kind`. Performs no store I/O.
    pub fn new(kind: StrategyKind, config: LimitConfig) -> Self {
        match kind {
            StrategyKind::FixedWindow => Strategy::FixedWindow(FixedWindowStrategy::new(config)),
            StrategyKind::SlidingWindow => {
                Strategy::SlidingWindow(SlidingWindowStrategy::new(config))
            }
        }
    }

    /// Resolve `name` through [`STRATEGY_TABLE`].
    pub fn resolve(name: &str, config: LimitConfig) -> Result<Self, TallyguardError> {
        Ok(Self::new(name.parse()?, config))
    }

    /// Which strategy this is.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::FixedWindow(_) => StrategyKind::FixedWindow,
            Strategy::SlidingWindow(_) => StrategyKind::SlidingWindow,
        }
    }

    /// Limit this strategy enforces.
    pub fn config(&self) -> &LimitConfig {
        match self {
            Strategy::FixedWindow(strategy) => strategy.config(),
            Strategy::SlidingWindow(strategy) => strategy.config(),
        }
    }

    /// Key of the counter the next increment at `now_ms` would touch.
    pub fn current_key(&self, ctx: &KeyContext, now_ms: u64) -> RateLimitKey {
        match self {
            Strategy::FixedWindow(strategy) => strategy.key(ctx, now_ms),
            Strategy::SlidingWindow(strategy) => strategy.keys(ctx, now_ms).0,
        }
    }

    pub(crate) async fn increment(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
        amount: u64,
    ) -> Result<Decision, TallyguardError> {
        match self {
            Strategy::FixedWindow(strategy) => strategy.increment(store, ctx, now_ms, amount).await,
            Strategy::SlidingWindow(strategy) => {
                strategy.increment(store, ctx, now_ms, amount).await
            }
        }
    }

    pub(crate) async fn count(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<u64, TallyguardError> {
        match self {
            Strategy::FixedWindow(strategy) => strategy.count(store, ctx, now_ms).await,
            Strategy::SlidingWindow(strategy) => strategy.count(store, ctx, now_ms).await,
        }
    }

    /// Usage the admission rule compares against `max`.
    pub(crate) async fn used(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<u64, TallyguardError> {
        match self {
            Strategy::FixedWindow(strategy) => strategy.count(store, ctx, now_ms).await,
            Strategy::SlidingWindow(strategy) => strategy.used(store, ctx, now_ms).await,
        }
    }

    pub(crate) async fn decrement(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
        amount: u64,
    ) -> Result<u64, TallyguardError> {
        match self {
            Strategy::FixedWindow(strategy) => strategy.decrement(store, ctx, now_ms, amount).await,
            Strategy::SlidingWindow(strategy) => {
                strategy.decrement(store, ctx, now_ms, amount).await
            }
        }
    }

    pub(crate) async fn reset(
        &self,
        store: &dyn Store,
        ctx: &KeyContext,
        now_ms: u64,
    ) -> Result<(), TallyguardError> {
        match self {
            Strategy::FixedWindow(strategy) => strategy.reset(store, ctx, now_ms).await,
            Strategy::SlidingWindow(strategy) => strategy.reset(store, ctx, now_ms).await,
        }
    }
}
