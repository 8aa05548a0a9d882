use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::{CounterReply, RedisClient, Store, TallyguardError, WeightedReply};

const CONDITIONAL_INCREMENT: &str = r#"
    local key = KEYS[1]

    local amount = tonumber(ARGV[1])
    local max = tonumber(ARGV[2])
    local ttl_ms = tonumber(ARGV[3])

    local count = redis.call("INCRBY", key, amount)

    if redis.call("PTTL", key) < 0 then
        redis.call("PEXPIRE", key, ttl_ms)
    end

    -- count is the pre-increment value plus amount
    local admitted = 0
    if count <= max then
        admitted = 1
    end

    return {count, admitted}
"#;

const WEIGHTED_INCREMENT: &str = r#"
    local key = KEYS[1]
    local previous_key = KEYS[2]

    local amount = tonumber(ARGV[1])
    local max = tonumber(ARGV[2])
    local ttl_ms = tonumber(ARGV[3])
    local previous_weight = tonumber(ARGV[4])

    local previous_count = tonumber(redis.call("GET", previous_key)) or 0
    local count = redis.call("INCRBY", key, amount)

    if redis.call("PTTL", key) < 0 then
        redis.call("PEXPIRE", key, ttl_ms)
    end

    local effective = (count - amount) + previous_count * previous_weight

    local admitted = 0
    if effective + amount - 1 < max then
        admitted = 1
    end

    return {count, previous_count, admitted}
"#;

const DECREMENT: &str = r#"
    local key = KEYS[1]
    local amount = tonumber(ARGV[1])

    local count = tonumber(redis.call("GET", key))
    if count == nil then
        return 0
    end

    local next_count = count - amount
    if next_count < 0 then
        next_count = 0
    end

    redis.call("SET", key, next_count, "KEEPTTL")

    return next_count
"#;

/// A [`Store`] backed by Redis.
///
/// # Requirements
///
/// - **Redis version:** >= 6.2.0 (`SET ... KEEPTTL`)
///
/// # Consistency Semantics
///
/// - Every mutating operation is a single Lua script, executed atomically by
///   the server. Concurrent callers on any number of hosts are serialized per
///   script invocation.
/// - Counters expire server-side through `PEXPIRE`; nothing is garbage
///   collected by the client.
/// - [`Store::flush_all`] runs `FLUSHDB` on the database selected by the URI.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use tallyguard::{RateLimiter, RateLimiterOptions, RedisStore};
///
/// let store = RedisStore::connect("redis://127.0.0.1:6379/0").await?;
/// let rl = RateLimiter::new(RateLimiterOptions::new(Arc::new(store)));
/// ```
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: RedisClient,
    conditional_increment: redis::Script,
    weighted_increment: redis::Script,
    decrement: redis::Script,
}

impl RedisStore {
    /// Wrap an existing connection pool.
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            conditional_increment: redis::Script::new(CONDITIONAL_INCREMENT),
            weighted_increment: redis::Script::new(WEIGHTED_INCREMENT),
            decrement: redis::Script::new(DECREMENT),
        }
    }

    /// Connect to `uri` with a single connection.
    pub async fn connect(uri: &str) -> Result<Self, TallyguardError> {
        Ok(Self::new(RedisClient::open(uri).await?))
    }

    /// Connect to `uri` with `connection_count` connections.
    pub async fn connect_with_connections(
        uri: &str,
        connection_count: usize,
    ) -> Result<Self, TallyguardError> {
        Ok(Self::new(
            RedisClient::open_with_connections(uri, connection_count).await?,
        ))
    }

    /// Underlying connection pool.
    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// Same store over a freshly opened pool. Call it in a forked child.
    pub async fn reconnect(&self) -> Result<Self, TallyguardError> {
        Ok(Self::new(self.client.reconnect().await?))
    }
}

#[inline]
fn ttl_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl Store for RedisStore {
    async fn conditional_increment(
        &self,
        key: &str,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<CounterReply, TallyguardError> {
        let mut connection_manager = self.client.connection()?;

        let (count, admitted): (u64, i64) = self
            .conditional_increment
            .key(key)
            .arg(amount)
            .arg(max)
            .arg(ttl_ms(ttl))
            .invoke_async(&mut connection_manager)
            .await?;

        Ok(CounterReply {
            count,
            admitted: admitted == 1,
        })
    } // end method conditional_increment

    async fn weighted_increment(
        &self,
        key: &str,
        previous_key: &str,
        previous_weight: f64,
        amount: u64,
        max: u64,
        ttl: Duration,
    ) -> Result<WeightedReply, TallyguardError> {
        let mut connection_manager = self.client.connection()?;

        let (count, previous_count, admitted): (u64, u64, i64) = self
            .weighted_increment
            .key(key)
            .key(previous_key)
            .arg(amount)
            .arg(max)
            .arg(ttl_ms(ttl))
            .arg(previous_weight)
            .invoke_async(&mut connection_manager)
            .await?;

        Ok(WeightedReply {
            count,
            previous_count,
            admitted: admitted == 1,
        })
    } // end method weighted_increment

    async fn read(&self, key: &str) -> Result<u64, TallyguardError> {
        let mut connection_manager = self.client.connection()?;
        let count: Option<u64> = connection_manager.get(key).await?;

        Ok(count.unwrap_or(0))
    }

    async fn decrement(&self, key: &str, amount: u64) -> Result<u64, TallyguardError> {
        let mut connection_manager = self.client.connection()?;

        let count: u64 = self
            .decrement
            .key(key)
            .arg(amount)
            .invoke_async(&mut connection_manager)
            .await?;

        Ok(count)
    } // end method decrement

    async fn expire_now(&self, key: &str) -> Result<(), TallyguardError> {
        let mut connection_manager = self.client.connection()?;
        let _: () = connection_manager.del(key).await?;

        Ok(())
    }

    async fn flush_all(&self) -> Result<(), TallyguardError> {
        let mut connection_manager = self.client.connection()?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut connection_manager)
            .await?;

        tracing::warn!("flushed every counter in the selected redis database");

        Ok(())
    }
}
