//! Redis-backed implementation of the shared state store port.
//!
//! Every method maps to a single Redis command, so each call is atomic
//! on its own. Failures are reported as `DomainError::StoreUnavailable`;
//! the triggering client action is aborted, and a client retry with the
//! same event id will be treated as a fresh attempt because nothing was
//! recorded.

use async_trait::async_trait;
use duo_core::{DomainError, DomainResult, StateStore};
use redis::AsyncCommands;

use crate::pool::RedisPool;

/// `StateStore` implementation over a Redis connection pool
#[derive(Debug, Clone)]
pub struct RedisStateStore {
    pool: RedisPool,
}

impl RedisStateStore {
    /// Create a new store over the given pool
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> DomainResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))
    }
}

fn store_err(e: redis::RedisError) -> DomainError {
    DomainError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl StateStore for RedisStateStore {
    // === FIFO queue (LPUSH head / RPOP tail keeps insertion order) ===

    async fn queue_push(&self, queue: &str, value: &str) -> DomainResult<()> {
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(queue, value).await.map_err(store_err)
    }

    async fn queue_pop(&self, queue: &str) -> DomainResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.rpop::<_, Option<String>>(queue, None)
            .await
            .map_err(store_err)
    }

    async fn queue_remove(&self, queue: &str, value: &str) -> DomainResult<u64> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.lrem(queue, 0, value).await.map_err(store_err)?;
        Ok(removed.max(0) as u64)
    }

    async fn queue_len(&self, queue: &str) -> DomainResult<u64> {
        let mut conn = self.conn().await?;
        let len: i64 = conn.llen(queue).await.map_err(store_err)?;
        Ok(len.max(0) as u64)
    }

    // === Hash ===

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> DomainResult<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(store_err)
    }

    async fn hash_get(&self, key: &str, field: &str) -> DomainResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.hget::<_, _, Option<String>>(key, field)
            .await
            .map_err(store_err)
    }

    async fn hash_del(&self, key: &str, field: &str) -> DomainResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn.hdel(key, field).await.map_err(store_err)?;
        Ok(deleted > 0)
    }

    async fn hash_get_all(&self, key: &str) -> DomainResult<Vec<(String, String)>> {
        let mut conn = self.conn().await?;
        conn.hgetall::<_, Vec<(String, String)>>(key)
            .await
            .map_err(store_err)
    }

    // === Set ===

    async fn set_add(&self, key: &str, member: &str) -> DomainResult<bool> {
        let mut conn = self.conn().await?;
        let added: i64 = conn.sadd(key, member).await.map_err(store_err)?;
        Ok(added > 0)
    }

    async fn set_contains(&self, key: &str, member: &str) -> DomainResult<bool> {
        let mut conn = self.conn().await?;
        conn.sismember::<_, _, bool>(key, member)
            .await
            .map_err(store_err)
    }

    async fn set_remove(&self, key: &str, member: &str) -> DomainResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.srem(key, member).await.map_err(store_err)?;
        Ok(removed > 0)
    }

    // === Sorted set ===

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> DomainResult<()> {
        let mut conn = self.conn().await?;
        conn.zadd::<_, _, _, ()>(key, member, score)
            .await
            .map_err(store_err)
    }

    async fn zset_score(&self, key: &str, member: &str) -> DomainResult<Option<f64>> {
        let mut conn = self.conn().await?;
        conn.zscore::<_, _, Option<f64>>(key, member)
            .await
            .map_err(store_err)
    }

    async fn zset_remove_below(&self, key: &str, max_score: f64) -> DomainResult<u64> {
        let mut conn = self.conn().await?;
        // Exclusive upper bound: members with score < max_score
        let removed: i64 = redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(format!("({max_score}"))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(removed.max(0) as u64)
    }

    // === Plain keys ===

    async fn string_set(&self, key: &str, value: &str) -> DomainResult<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value).await.map_err(store_err)
    }

    async fn string_get(&self, key: &str) -> DomainResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key).await.map_err(store_err)
    }

    async fn string_del(&self, key: &str) -> DomainResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn.del(key).await.map_err(store_err)?;
        Ok(deleted > 0)
    }

    // === Append-only list ===

    async fn list_append(&self, key: &str, value: &str) -> DomainResult<u64> {
        let mut conn = self.conn().await?;
        let len: i64 = conn.rpush(key, value).await.map_err(store_err)?;
        Ok(len.max(0) as u64)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> DomainResult<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.lrange::<_, Vec<String>>(key, start as isize, stop as isize)
            .await
            .map_err(store_err)
    }

    async fn list_trim_to_latest(&self, key: &str, max_len: u64) -> DomainResult<()> {
        let mut conn = self.conn().await?;
        // Keep the newest `max_len` entries at the end of the list
        conn.ltrim::<_, ()>(key, -(max_len as isize), -1)
            .await
            .map_err(store_err)
    }

    async fn list_len(&self, key: &str) -> DomainResult<u64> {
        let mut conn = self.conn().await?;
        let len: i64 = conn.llen(key).await.map_err(store_err)?;
        Ok(len.max(0) as u64)
    }

    // === Keys ===

    async fn delete_key(&self, key: &str) -> DomainResult<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn.del(key).await.map_err(store_err)?;
        Ok(deleted > 0)
    }
}
