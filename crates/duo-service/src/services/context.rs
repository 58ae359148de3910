//! Service context - dependency container for services
//!
//! Holds the shared state store, the cross-worker broadcaster, and the
//! chat tunables. Services borrow the context instead of owning their
//! dependencies, so one context is built at startup and shared.

use std::sync::Arc;

use duo_common::ChatConfig;
use duo_core::{ChannelBroadcaster, StateStore};

/// Service context containing all dependencies
///
/// Both ports are trait objects: production wires the Redis-backed
/// implementations, tests wire the in-memory store and a recording
/// broadcaster.
#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn StateStore>,
    broadcaster: Arc<dyn ChannelBroadcaster>,
    chat: ChatConfig,
}

impl ServiceContext {
    /// Create a new service context
    pub fn new(
        store: Arc<dyn StateStore>,
        broadcaster: Arc<dyn ChannelBroadcaster>,
        chat: ChatConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            chat,
        }
    }

    /// Get the shared state store
    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Get the cross-worker broadcaster
    pub fn broadcaster(&self) -> &dyn ChannelBroadcaster {
        self.broadcaster.as_ref()
    }

    /// Get the chat tunables
    pub fn chat(&self) -> &ChatConfig {
        &self.chat
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("store", &"dyn StateStore")
            .field("broadcaster", &"dyn ChannelBroadcaster")
            .field("chat", &self.chat)
            .finish()
    }
}
