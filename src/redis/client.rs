use std::{
    fmt, process,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use redis::{Client, aio::ConnectionManager};

use crate::TallyguardError;

struct Pool {
    connections: Vec<ConnectionManager>,
    next: AtomicUsize,
}

/// Connection pool for one process.
///
/// Holds `connection_count` [`ConnectionManager`]s handed out in rotation, and
/// remembers the process that opened them. A pool inherited across a `fork`
/// refuses to hand out connections and reports
/// [`TallyguardError::StoreUnavailable`]; call [`RedisClient::reconnect`] in the
/// child instead.
///
/// Clones share the same connections and the same rotation.
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    pool: Arc<Pool>,
    owner_pid: u32,
}

impl RedisClient {
    /// Open `uri` with a single connection.
    ///
    /// The URI follows `redis://[:password@]host:port[/db]`.
    pub async fn open(uri: &str) -> Result<Self, TallyguardError> {
        Self::open_with_connections(uri, 1).await
    }

    /// Open `uri` with `connection_count` multiplexed connections.
    pub async fn open_with_connections(
        uri: &str,
        connection_count: usize,
    ) -> Result<Self, TallyguardError> {
        Self::from_client(Client::open(uri)?, connection_count).await
    }

    /// Establish `connection_count` connections through `client`.
    ///
    /// Fails with [`TallyguardError::InvalidConfig`] when `connection_count` is 0,
    /// before any I/O.
    pub async fn from_client(
        client: Client,
        connection_count: usize,
    ) -> Result<Self, TallyguardError> {
        if connection_count == 0 {
            return Err(TallyguardError::InvalidConfig(
                "redis connection count must be greater than 0".to_string(),
            ));
        }

        let mut connections = Vec::with_capacity(connection_count);
        for _ in 0..connection_count {
            connections.push(client.get_connection_manager().await?);
        }

        let owner_pid = process::id();
        tracing::info!(connection_count, owner_pid, "redis connection pool established");

        Ok(Self {
            client,
            pool: Arc::new(Pool {
                connections,
                next: AtomicUsize::new(0),
            }),
            owner_pid,
        })
    } // end constructor

    /// Open a fresh pool of the same size against the same server.
    ///
    /// Use this in a forked child, or after the server was replaced.
    pub async fn reconnect(&self) -> Result<Self, TallyguardError> {
        Self::from_client(self.client.clone(), self.connection_count()).await
    }

    /// Number of pooled connections.
    pub fn connection_count(&self) -> usize {
        self.pool.connections.len()
    }

    /// Whether the pool was opened by the calling process.
    pub fn is_owned_by_current_process(&self) -> bool {
        self.owner_pid == process::id()
    }

    /// Next connection in rotation.
    pub(crate) fn connection(&self) -> Result<ConnectionManager, TallyguardError> {
        if !self.is_owned_by_current_process() {
            tracing::warn!(
                owner_pid = self.owner_pid,
                pid = process::id(),
                "redis connection pool used across a fork"
            );

            return Err(TallyguardError::StoreUnavailable(format!(
                "redis connections were opened by process {}; reconnect after fork",
                self.owner_pid
            )));
        }

        let index = self.pool.next.fetch_add(1, Ordering::Relaxed);
        Ok(self.pool.connections[index % self.pool.connections.len()].clone())
    } // end method connection
} // end impl RedisClient

impl fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisClient")
            .field("connections", &self.pool.connections.len())
            .field("owner_pid", &self.owner_pid)
            .finish_non_exhaustive()
    }
}
