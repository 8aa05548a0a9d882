//! Canonical store keys.
//!
//! A key renders as `prefix:scope:identifier:tag:window_id`. No component may
//! contain `:`, so two distinct tuples can never render to the same string.

use std::{fmt, ops::Deref, sync::Arc};

use crate::{PeriodSeconds, TallyguardError};

/// Separator reserved by the key layout.
pub const KEY_SEPARATOR: char = ':';

/// A validated key component (prefix, scope or identifier).
///
/// This is a string with the following constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
/// - Must not contain colons
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq)]
pub struct KeyComponent(Arc<str>);

impl KeyComponent {
    /// Default key prefix.
    pub fn default_prefix() -> Self {
        Self(Arc::from("tallyguard"))
    }
}

impl Deref for KeyComponent {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for KeyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for KeyComponent {
    type Error = TallyguardError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(TallyguardError::InvalidKeyComponent(
                "key component must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(TallyguardError::InvalidKeyComponent(
                "key component must not be longer than 255 bytes".to_string(),
            ))
        } else if value.contains(KEY_SEPARATOR) {
            Err(TallyguardError::InvalidKeyComponent(format!(
                "key component must not contain '{KEY_SEPARATOR}': {value}"
            )))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<String> for KeyComponent {
    type Error = TallyguardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Store key of one counter: a (prefix, scope, identifier, strategy, window) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    prefix: KeyComponent,
    scope: KeyComponent,
    identifier: KeyComponent,
    strategy_tag: &'static str,
    window_id: u64,
}

impl RateLimitKey {
    /// Build the key for the window containing `now_ms`.
    ///
    /// `window_id = now_ms / period_ms`, so every call inside the same
    /// period-aligned bucket yields the same key.
    pub fn build(
        prefix: &KeyComponent,
        scope: &KeyComponent,
        identifier: &KeyComponent,
        strategy_tag: &'static str,
        period: PeriodSeconds,
        now_ms: u64,
    ) -> Self {
        Self {
            prefix: prefix.clone(),
            scope: scope.clone(),
            identifier: identifier.clone(),
            strategy_tag,
            window_id: window_id(period, now_ms),
        }
    }

    /// Key of the immediately preceding window.
    pub fn previous(&self) -> Self {
        Self {
            window_id: self.window_id.saturating_sub(1),
            ..self.clone()
        }
    }

    /// Window this key belongs to.
    pub fn window_id(&self) -> u64 {
        self.window_id
    }

    /// Strategy tag embedded in the key.
    pub fn strategy_tag(&self) -> &'static str {
        self.strategy_tag
    }

    /// Scope component.
    pub fn scope(&self) -> &KeyComponent {
        &self.scope
    }

    /// Identifier component.
    pub fn identifier(&self) -> &KeyComponent {
        &self.identifier
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.prefix,
            self.scope,
            self.identifier,
            self.strategy_tag,
            self.window_id,
            sep = KEY_SEPARATOR
        )
    }
}

/// Period-aligned window containing `now_ms`.
#[inline]
pub(crate) fn window_id(period: PeriodSeconds, now_ms: u64) -> u64 {
    now_ms / period.as_millis()
}

/// Fraction of the current window already elapsed at `now_ms`, in `[0, 1)`.
#[inline]
pub(crate) fn elapsed_fraction(period: PeriodSeconds, now_ms: u64) -> f64 {
    let period_ms = period.as_millis();
    (now_ms % period_ms) as f64 / period_ms as f64
}

/// The caller-supplied part of a key: everything except strategy and window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyContext {
    prefix: KeyComponent,
    scope: KeyComponent,
    identifier: KeyComponent,
}

impl KeyContext {
    /// Validate `scope` and `identifier` under `prefix`.
    pub fn new(
        prefix: KeyComponent,
        scope: &str,
        identifier: &str,
    ) -> Result<Self, TallyguardError> {
        Ok(Self {
            prefix,
            scope: KeyComponent::try_from(scope)?,
            identifier: KeyComponent::try_from(identifier)?,
        })
    }

    /// Key of the window containing `now_ms`.
    pub fn key(
        &self,
        strategy_tag: &'static str,
        period: PeriodSeconds,
        now_ms: u64,
    ) -> RateLimitKey {
        RateLimitKey::build(
            &self.prefix,
            &self.scope,
            &self.identifier,
            strategy_tag,
            period,
            now_ms,
        )
    }

    /// Scope component.
    pub fn scope(&self) -> &KeyComponent {
        &self.scope
    }

    /// Identifier component.
    pub fn identifier(&self) -> &KeyComponent {
        &self.identifier
    }
}
