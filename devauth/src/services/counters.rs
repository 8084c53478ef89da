//! Counter store boundary for the rate limiter and brute-force guard.
//!
//! Every operation is a single atomic round trip (Redis pipelines /
//! increment-with-expire), never read-then-write across calls, so the
//! counters stay correct under concurrent access from many processes.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::config::RedisConfig;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("counter store error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Sliding-window hit: evict entries older than the window, record the
    /// current request, refresh the key TTL, and return how many requests
    /// were already inside the window (the recorded one excluded).
    async fn record_request(&self, key: &str, window: Duration) -> Result<u64, CounterError>;

    /// Current number of entries in a window key, without recording.
    async fn window_count(&self, key: &str) -> Result<u64, CounterError>;

    /// Atomic increment with TTL refresh; returns the new counter value.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, CounterError>;

    async fn get_counter(&self, key: &str) -> Result<Option<i64>, CounterError>;

    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<(), CounterError>;

    async fn flag_exists(&self, key: &str) -> Result<bool, CounterError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), CounterError>;

    async fn health_check(&self) -> Result<(), CounterError>;
}

/// Redis-backed counter store.
#[derive(Clone)]
pub struct RedisCounterStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisCounterStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, CounterError> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects automatically.
        let manager = client.get_connection_manager().await?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

fn epoch_seconds() -> Result<f64, CounterError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .map_err(|e| CounterError::Internal(format!("system clock before epoch: {}", e)))
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn record_request(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let mut conn = self.manager.clone();
        let now = epoch_seconds()?;
        let window_start = now - window.as_secs_f64();
        // Nanosecond member strings keep concurrent entries distinct.
        let member = format!("{:.9}", now);

        let (_, count, _, _): (i64, u64, i64, i64) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0f64)
            .arg(window_start)
            .cmd("ZCARD")
            .arg(key)
            .cmd("ZADD")
            .arg(key)
            .arg(now)
            .arg(member)
            .cmd("EXPIRE")
            .arg(key)
            .arg(window.as_secs())
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn window_count(&self, key: &str) -> Result<u64, CounterError> {
        let mut conn = self.manager.clone();
        let count: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, CounterError> {
        let mut conn = self.manager.clone();
        let (value, _): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn get_counter(&self, key: &str) -> Result<Option<i64>, CounterError> {
        let mut conn = self.manager.clone();
        let value: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<(), CounterError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn flag_exists(&self, key: &str) -> Result<bool, CounterError> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(exists)
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CounterError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(*key);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CounterError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCounters {
    windows: HashMap<String, (Vec<Instant>, Duration)>,
    counters: HashMap<String, (i64, Instant)>,
    flags: HashMap<String, Instant>,
}

/// In-memory counter store with the same semantics as the Redis one,
/// TTLs included. Used by tests and local harnesses.
#[derive(Default)]
pub struct InMemoryCounterStore {
    inner: Mutex<MemoryCounters>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryCounters>, CounterError> {
        self.inner
            .lock()
            .map_err(|_| CounterError::Internal("counter mutex poisoned".to_string()))
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn record_request(&self, key: &str, window: Duration) -> Result<u64, CounterError> {
        let mut inner = self.lock()?;
        let now = Instant::now();
        let entry = inner
            .windows
            .entry(key.to_string())
            .or_insert_with(|| (Vec::new(), window));
        entry.1 = window;
        entry.0.retain(|t| now.duration_since(*t) < window);
        let count = entry.0.len() as u64;
        entry.0.push(now);
        Ok(count)
    }

    async fn window_count(&self, key: &str) -> Result<u64, CounterError> {
        let mut inner = self.lock()?;
        let now = Instant::now();
        Ok(match inner.windows.get_mut(key) {
            Some((entries, window)) => {
                let window = *window;
                entries.retain(|t| now.duration_since(*t) < window);
                entries.len() as u64
            }
            None => 0,
        })
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, CounterError> {
        let mut inner = self.lock()?;
        let now = Instant::now();
        let entry = inner.counters.entry(key.to_string()).or_insert((0, now));
        if now >= entry.1 && entry.0 > 0 {
            entry.0 = 0;
        }
        entry.0 += 1;
        entry.1 = now + ttl;
        Ok(entry.0)
    }

    async fn get_counter(&self, key: &str) -> Result<Option<i64>, CounterError> {
        let inner = self.lock()?;
        let now = Instant::now();
        Ok(inner
            .counters
            .get(key)
            .filter(|(_, expiry)| *expiry > now)
            .map(|(value, _)| *value))
    }

    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<(), CounterError> {
        let mut inner = self.lock()?;
        inner.flags.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn flag_exists(&self, key: &str) -> Result<bool, CounterError> {
        let inner = self.lock()?;
        Ok(inner
            .flags
            .get(key)
            .map_or(false, |expiry| *expiry > Instant::now()))
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), CounterError> {
        let mut inner = self.lock()?;
        for key in keys {
            inner.windows.remove(*key);
            inner.counters.remove(*key);
            inner.flags.remove(*key);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CounterError> {
        self.lock().map(|_| ())
    }
}
