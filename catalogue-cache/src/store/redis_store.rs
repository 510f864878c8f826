//! Redis-backed cache store.
//!
//! Uses a multiplexed `ConnectionManager`, which reconnects on its own and
//! can be cloned freely, so concurrent requests share one connection without
//! caller-visible locking. Every command is bounded by the configured I/O
//! timeout; connecting is bounded by the connect timeout.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};

use super::traits::{CacheStore, ScanPage};
use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};

/// Cache store talking to a Redis server.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
    io_timeout: Duration,
}

impl fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("conn", &"<ConnectionManager>")
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

impl RedisCacheStore {
    /// Connect to `redis_url`.
    ///
    /// Fails with [`CacheError::Timeout`] if the connection is not
    /// established within `connect_timeout`.
    pub async fn connect(
        redis_url: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Connection(format!("invalid address {}: {}", redis_url, e)))?;

        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout {
                operation: "CONNECT",
                after: connect_timeout,
            })??;

        tracing::info!(redis_url, "Connected to cache store");
        Ok(Self { conn, io_timeout })
    }

    /// Connect using the address and timeouts in `settings`.
    pub async fn from_settings(settings: &CacheSettings) -> CacheResult<Self> {
        Self::connect(
            &settings.redis_url,
            settings.connect_timeout,
            settings.io_timeout,
        )
        .await
    }

    /// Run one command under the I/O timeout.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(result) => result.map_err(|e| command_error(operation, e)),
            Err(_) => Err(CacheError::Timeout {
                operation,
                after: self.io_timeout,
            }),
        }
    }
}

fn command_error(command: &'static str, e: redis::RedisError) -> CacheError {
    match CacheError::from(e) {
        CacheError::Command { reason, .. } => CacheError::Command { command, reason },
        CacheError::Timeout { after, .. } => CacheError::Timeout {
            operation: command,
            after,
        },
        other => other,
    }
}

/// Escape Redis glob metacharacters so `prefix` matches literally.
pub(crate) fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\' | '^') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        self.bounded("GET", async move { conn.get(key).await }).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        // PX keeps sub-second TTLs exact; Redis rejects a zero expiry.
        let ttl_ms = ttl.as_millis().max(1) as u64;
        self.bounded("SET", async move {
            let result: RedisResult<()> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await;
            result
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.bounded("DEL", async move { conn.del(keys).await }).await
    }

    async fn scan_prefix(&self, prefix: &str, cursor: u64, count: usize) -> CacheResult<ScanPage> {
        let mut conn = self.conn.clone();
        let pattern = escape_glob(prefix);
        let (next, keys): (u64, Vec<String>) = self
            .bounded("SCAN", async move {
                let result: RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(count)
                    .query_async(&mut conn)
                    .await;
                result
            })
            .await?;

        Ok(ScanPage {
            keys,
            next_cursor: (next != 0).then_some(next),
        })
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _pong: String = self
            .bounded("PING", async move {
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                result
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob_plain_prefix() {
        assert_eq!(escape_glob("catalogue:"), "catalogue:*");
    }

    #[test]
    fn test_escape_glob_metacharacters() {
        assert_eq!(escape_glob("catalogue:count:a*b"), "catalogue:count:a\\*b*");
        assert_eq!(escape_glob("x?[y]"), "x\\?\\[y\\]*");
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let err = RedisCacheStore::connect(
            "not a url",
            Duration::from_millis(50),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CacheError::Connection(_)));
    }
}
