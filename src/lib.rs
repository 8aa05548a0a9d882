#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod rate_limiter;
pub use rate_limiter::*;

mod limiter;
pub use limiter::*;

mod limit_group;
pub use limit_group::*;

pub mod strategy;
pub use strategy::*;

mod store;
pub use store::*;

pub mod local;
pub use local::*;

#[cfg(feature = "redis-tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-tokio")))]
pub mod redis;
#[cfg(feature = "redis-tokio")]
pub use crate::redis::*;

mod key;
pub use key::{KEY_SEPARATOR, KeyComponent, KeyContext, RateLimitKey};

mod clock;
pub use clock::*;

mod settings;
pub use settings::*;

mod error;
pub use error::*;

mod common;
pub use common::{Decision, LimitConfig, Max, Outcome, PeriodSeconds, StoreTimeoutMs};

#[cfg(test)]
mod tests;
