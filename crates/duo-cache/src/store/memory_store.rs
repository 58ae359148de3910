//! In-memory implementation of the shared state store port.
//!
//! Backs the service-layer tests and single-process development runs.
//! One mutex over all namespaces gives the same per-call atomicity the
//! Redis store offers; it is not meant to be shared across processes.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use duo_core::{DomainResult, StateStore};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    queues: HashMap<String, VecDeque<String>>,
    hashes: HashMap<String, Vec<(String, String)>>,
    sets: HashMap<String, HashSet<String>>,
    zsets: HashMap<String, HashMap<String, f64>>,
    strings: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

/// Single-process `StateStore`
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    // === FIFO queue ===

    async fn queue_push(&self, queue: &str, value: &str) -> DomainResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn queue_pop(&self, queue: &str) -> DomainResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.queues.get_mut(queue).and_then(VecDeque::pop_front))
    }

    async fn queue_remove(&self, queue: &str, value: &str) -> DomainResult<u64> {
        let mut inner = self.inner.lock().await;
        let Some(q) = inner.queues.get_mut(queue) else {
            return Ok(0);
        };
        let before = q.len();
        q.retain(|v| v != value);
        Ok((before - q.len()) as u64)
    }

    async fn queue_len(&self, queue: &str) -> DomainResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.queues.get(queue).map_or(0, |q| q.len() as u64))
    }

    // === Hash ===

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> DomainResult<()> {
        let mut inner = self.inner.lock().await;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        if let Some(entry) = hash.iter_mut().find(|(f, _)| f == field) {
            entry.1 = value.to_string();
        } else {
            hash.push((field.to_string(), value.to_string()));
        }
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> DomainResult<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.hashes.get(key).and_then(|hash| {
            hash.iter()
                .find(|(f, _)| f == field)
                .map(|(_, v)| v.clone())
        }))
    }

    async fn hash_del(&self, key: &str, field: &str) -> DomainResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(hash) = inner.hashes.get_mut(key) else {
            return Ok(false);
        };
        let before = hash.len();
        hash.retain(|(f, _)| f != field);
        Ok(hash.len() < before)
    }

    async fn hash_get_all(&self, key: &str) -> DomainResult<Vec<(String, String)>> {
        let inner = self.inner.lock().await;
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    // === Set ===

    async fn set_add(&self, key: &str, member: &str) -> DomainResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_contains(&self, key: &str, member: &str) -> DomainResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.sets.get(key).is_some_and(|s| s.contains(member)))
    }

    async fn set_remove(&self, key: &str, member: &str) -> DomainResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.sets.get_mut(key).is_some_and(|s| s.remove(member)))
    }

    // === Sorted set ===

    async fn zset_add(&self, key: &str, member: &str, score: f64) -> DomainResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zset_score(&self, key: &str, member: &str) -> DomainResult<Option<f64>> {
        let inner = self.inner.lock().await;
        Ok(inner.zsets.get(key).and_then(|z| z.get(member).copied()))
    }

    async fn zset_remove_below(&self, key: &str, max_score: f64) -> DomainResult<u64> {
        let mut inner = self.inner.lock().await;
        let Some(z) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = z.len();
        z.retain(|_, score| *score >= max_score);
        Ok((before - z.len()) as u64)
    }

    // === Plain keys ===

    async fn string_set(&self, key: &str, value: &str) -> DomainResult<()> {
        let mut inner = self.inner.lock().await;
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn string_get(&self, key: &str) -> DomainResult<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.strings.get(key).cloned())
    }

    async fn string_del(&self, key: &str) -> DomainResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.strings.remove(key).is_some())
    }

    // === Append-only list ===

    async fn list_append(&self, key: &str, value: &str) -> DomainResult<u64> {
        let mut inner = self.inner.lock().await;
        let list = inner.lists.entry(key.to_string()).or_default();
        list.push(value.to_string());
        Ok(list.len() as u64)
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> DomainResult<Vec<String>> {
        let inner = self.inner.lock().await;
        let Some(list) = inner.lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;
        let resolve = |idx: i64| -> i64 {
            if idx < 0 {
                (len + idx).max(0)
            } else {
                idx.min(len)
            }
        };
        let start = resolve(start) as usize;
        let stop = resolve(stop) as usize;
        if start > stop || start >= list.len() {
            return Ok(Vec::new());
        }
        Ok(list[start..=stop.min(list.len() - 1)].to_vec())
    }

    async fn list_trim_to_latest(&self, key: &str, max_len: u64) -> DomainResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(list) = inner.lists.get_mut(key) {
            let max_len = max_len as usize;
            if list.len() > max_len {
                let drop = list.len() - max_len;
                list.drain(0..drop);
            }
        }
        Ok(())
    }

    async fn list_len(&self, key: &str) -> DomainResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.lists.get(key).map_or(0, |l| l.len() as u64))
    }

    // === Keys ===

    async fn delete_key(&self, key: &str) -> DomainResult<bool> {
        let mut inner = self.inner.lock().await;
        let mut existed = false;
        existed |= inner.queues.remove(key).is_some();
        existed |= inner.hashes.remove(key).is_some();
        existed |= inner.sets.remove(key).is_some();
        existed |= inner.zsets.remove(key).is_some();
        existed |= inner.strings.remove(key).is_some();
        existed |= inner.lists.remove(key).is_some();
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let store = MemoryStateStore::new();
        store.queue_push("q", "a").await.unwrap();
        store.queue_push("q", "b").await.unwrap();

        assert_eq!(store.queue_pop("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.queue_pop("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.queue_pop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queue_remove_all_occurrences() {
        let store = MemoryStateStore::new();
        store.queue_push("q", "a").await.unwrap();
        store.queue_push("q", "b").await.unwrap();
        store.queue_push("q", "a").await.unwrap();

        assert_eq!(store.queue_remove("q", "a").await.unwrap(), 2);
        assert_eq!(store.queue_len("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hash_set_overwrites() {
        let store = MemoryStateStore::new();
        store.hash_set("h", "f", "1").await.unwrap();
        store.hash_set("h", "f", "2").await.unwrap();

        assert_eq!(store.hash_get("h", "f").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.hash_get_all("h").await.unwrap().len(), 1);

        assert!(store.hash_del("h", "f").await.unwrap());
        assert!(!store.hash_del("h", "f").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStateStore::new();
        assert!(store.set_add("s", "m").await.unwrap());
        assert!(!store.set_add("s", "m").await.unwrap());
        assert!(store.set_contains("s", "m").await.unwrap());
        assert!(store.set_remove("s", "m").await.unwrap());
        assert!(!store.set_contains("s", "m").await.unwrap());
    }

    #[tokio::test]
    async fn test_zset_remove_below_is_exclusive() {
        let store = MemoryStateStore::new();
        store.zset_add("z", "old", 10.0).await.unwrap();
        store.zset_add("z", "edge", 20.0).await.unwrap();
        store.zset_add("z", "new", 30.0).await.unwrap();

        assert_eq!(store.zset_remove_below("z", 20.0).await.unwrap(), 1);
        assert!(store.zset_score("z", "old").await.unwrap().is_none());
        assert!(store.zset_score("z", "edge").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_append_range_trim() {
        let store = MemoryStateStore::new();
        for i in 0..5 {
            store.list_append("l", &i.to_string()).await.unwrap();
        }

        let all = store.list_range("l", 0, -1).await.unwrap();
        assert_eq!(all, vec!["0", "1", "2", "3", "4"]);

        store.list_trim_to_latest("l", 2).await.unwrap();
        let kept = store.list_range("l", 0, -1).await.unwrap();
        assert_eq!(kept, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_delete_key_spans_namespaces() {
        let store = MemoryStateStore::new();
        store.list_append("k", "v").await.unwrap();
        assert!(store.delete_key("k").await.unwrap());
        assert!(!store.delete_key("k").await.unwrap());
        assert_eq!(store.list_len("k").await.unwrap(), 0);
    }
}
