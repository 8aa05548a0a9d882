use std::time::Duration;

/// Error type for this crate.
///
/// Construction errors (`InvalidConfig`, `UnknownStrategy`, `InvalidKeyComponent`)
/// are caller bugs. Store errors (`StoreUnavailable`, `StoreTimeout`) are reported
/// as-is and never turned into an allow or deny decision.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TallyguardError {
    /// `max`, `period` or an increment amount is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The strategy name is not in the registration table.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A key component is empty, too long, or contains the `:` separator.
    #[error("invalid key component: {0}")]
    InvalidKeyComponent(String),

    /// The store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store did not answer in time.
    ///
    /// The outcome is unknown: the increment may have been applied server-side.
    #[error("store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    /// Returned by [`Limiter::increment_strict`](crate::Limiter::increment_strict)
    /// when the action is denied.
    #[error("rate limit exceeded for {key} (max {max})")]
    LimitExceeded {
        /// Rendered key of the window that denied the action.
        key: String,
        /// Configured maximum per period.
        max: u64,
    },
}

impl TallyguardError {
    /// `true` for errors that come from the store rather than from the caller.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            TallyguardError::StoreUnavailable(_) | TallyguardError::StoreTimeout(_)
        )
    }
}

#[cfg(feature = "redis-tokio")]
impl From<redis::RedisError> for TallyguardError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            // redis does not report the configured deadline
            TallyguardError::StoreTimeout(Duration::ZERO)
        } else {
            TallyguardError::StoreUnavailable(err.to_string())
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TallyguardError>;
