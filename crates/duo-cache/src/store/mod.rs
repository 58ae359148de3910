//! State store implementations of the `duo_core::StateStore` port.

mod memory_store;
mod redis_store;

pub use memory_store::MemoryStateStore;
pub use redis_store::RedisStateStore;
