use std::{ops::Deref, time::Duration};

use crate::TallyguardError;

/// Maximum number of actions admitted per window.
///
/// Must be greater than 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Max(u64);

impl Deref for Max {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for Max {
    type Error = TallyguardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(TallyguardError::InvalidConfig(
                "max must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Window length in whole seconds.
///
/// Must be at least 1. Windows are aligned to multiples of the period since the
/// Unix epoch, so every caller with the same period agrees on window boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodSeconds(u64);

impl PeriodSeconds {
    /// Period in milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0.saturating_mul(1000)
    }

    /// Period as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Deref for PeriodSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for PeriodSeconds {
    type Error = TallyguardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(TallyguardError::InvalidConfig(
                "period must be at least 1 second".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Deadline applied to every store round trip.
///
/// Must be greater than 0. Defaults to 500ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreTimeoutMs(u64);

impl StoreTimeoutMs {
    /// Timeout as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl Default for StoreTimeoutMs {
    fn default() -> Self {
        Self(500)
    }
}

impl Deref for StoreTimeoutMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for StoreTimeoutMs {
    type Error = TallyguardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(TallyguardError::InvalidConfig(
                "store timeout must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// `max` actions per `period`, validated once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitConfig {
    /// Maximum admitted actions per window.
    pub max: Max,
    /// Window length.
    pub period: PeriodSeconds,
}

impl LimitConfig {
    /// Validate raw values into a [`LimitConfig`].
    ///
    /// Fails with [`TallyguardError::InvalidConfig`] when `max` or `period` is 0.
    pub fn new(max: u64, period_seconds: u64) -> Result<Self, TallyguardError> {
        Ok(Self {
            max: Max::try_from(max)?,
            period: PeriodSeconds::try_from(period_seconds)?,
        })
    }
}

/// Result of one limiter call. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// Counter value of the current window after this call.
    ///
    /// Denied calls are still recorded, so this can exceed `max`.
    pub current_count: u64,
}

impl Decision {
    /// Slots left in the current window given `max`.
    pub fn remaining(&self, max: u64) -> u64 {
        max.saturating_sub(self.current_count)
    }
}

/// Three-valued admission result.
///
/// A store timeout is reported as [`Outcome::Unknown`]: the increment may or may
/// not have been applied, so it is neither an admission nor a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The action may proceed.
    Admitted(Decision),
    /// The action is over the limit.
    Denied(Decision),
    /// The store did not answer in time.
    Unknown,
}

impl Outcome {
    /// `true` only for [`Outcome::Admitted`].
    pub fn is_admitted(&self) -> bool {
        matches!(self, Outcome::Admitted(_))
    }
}

impl From<Decision> for Outcome {
    fn from(decision: Decision) -> Self {
        if decision.allowed {
            Outcome::Admitted(decision)
        } else {
            Outcome::Denied(decision)
        }
    }
}
