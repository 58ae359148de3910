//! Shared state store port
//!
//! Key-value store primitives shared by all workers. Each call is
//! individually atomic; no multi-key transactions are offered, and the
//! services are written not to need any. Failures surface as
//! [`DomainError::StoreUnavailable`].

use async_trait::async_trait;

use crate::error::DomainResult;

#[allow(unused_imports)] // doc link
use crate::error::DomainError;

/// Shared key-value store primitives
///
/// Queue operations are FIFO: `queue_push` enqueues at the tail,
/// `queue_pop` dequeues at the head. List operations are an append-only
/// log: `list_append` adds at the end, `list_range` reads in insertion
/// order, `list_trim_to_latest` keeps only the newest entries.
#[async_trait]
pub trait StateStore: Send + Sync {
    // === FIFO queue ===

    /// Enqueue a value at the tail
    async fn queue_push(&self, queue: &str, value: &str) -> DomainResult<()>;

    /// Dequeue the head value, if any
    async fn queue_pop(&self, queue: &str) -> DomainResult<Option<String>>;

    /// Remove all occurrences of a value; returns how many were removed
    async fn queue_remove(&self, queue: &str, value: &str) -> DomainResult<u64>;

    /// Current queue length
    async fn queue_len(&self, queue: &str) -> DomainResult<u64>;

    // === Hash ===

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> DomainResult<()>;

    async fn hash_get(&self, key: &str, field: &str) -> DomainResult<Option<String>>;

    /// Delete a field; returns whether it existed
    async fn hash_del(&self, key: &str, field: &str) -> DomainResult<bool>;

    /// All (field, value) pairs of a hash
    async fn hash_get_all(&self, key: &str) -> DomainResult<Vec<(String, String)>>;

    // === Set ===

    /// Add a member; returns `true` if it was newly added
    async fn set_add(&self, key: &str, member: &str) -> DomainResult<bool>;

    async fn set_contains(&self, key: &str, member: &str) -> DomainResult<bool>;

    async fn set_remove(&self, key: &str, member: &str) -> DomainResult<bool>;

    // === Sorted set ===

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> DomainResult<()>;

    async fn zset_score(&self, key: &str, member: &str) -> DomainResult<Option<f64>>;

    /// Remove members with score strictly below `max_score`; returns count
    async fn zset_remove_below(&self, key: &str, max_score: f64) -> DomainResult<u64>;

    // === Plain keys ===

    async fn string_set(&self, key: &str, value: &str) -> DomainResult<()>;

    async fn string_get(&self, key: &str) -> DomainResult<Option<String>>;

    async fn string_del(&self, key: &str) -> DomainResult<bool>;

    // === Append-only list ===

    /// Append a value; returns the new list length
    async fn list_append(&self, key: &str, value: &str) -> DomainResult<u64>;

    /// Read a range in insertion order; `stop = -1` means the last entry
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> DomainResult<Vec<String>>;

    /// Keep only the newest `max_len` entries, evicting oldest first
    async fn list_trim_to_latest(&self, key: &str, max_len: u64) -> DomainResult<()>;

    async fn list_len(&self, key: &str) -> DomainResult<u64>;

    // === Keys ===

    /// Delete a key of any type; returns whether it existed
    async fn delete_key(&self, key: &str) -> DomainResult<bool>;
}
