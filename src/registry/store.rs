//! Subscriber registry implementation
//!
//! Thread-safe set of live subscriber connections. This is the only state
//! in the relay touched by more than one concurrent actor (the dispatcher
//! adds, the broadcast engine removes), so the backing map never leaves
//! the lock; everything else goes through the synchronized methods here.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::Subscriber;

/// Registry of currently connected subscribers
///
/// Presence in the registry means "eligible to receive broadcasts".
/// Membership only changes between broadcast rounds: the engine works from
/// a [`snapshot`](SubscriberRegistry::snapshot) taken under the lock, so a
/// single round is never affected by concurrent add/remove.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<u64, Arc<Subscriber>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber
    pub async fn add(&self, subscriber: Arc<Subscriber>) {
        let mut subscribers = self.subscribers.write().await;
        let count = subscribers.len() + 1;

        tracing::info!(
            session_id = subscriber.id(),
            peer = %subscriber.peer_addr(),
            client_id = subscriber.client_id(),
            subscribers = count,
            "Subscriber added"
        );

        subscribers.insert(subscriber.id(), subscriber);
    }

    /// Remove a subscriber by session id
    ///
    /// No-op if the id is not present. Returns the removed handle so the
    /// caller can log it; the connection closes when the last `Arc` drops.
    pub async fn remove(&self, id: u64) -> Option<Arc<Subscriber>> {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(&id);

        if let Some(ref subscriber) = removed {
            tracing::info!(
                session_id = subscriber.id(),
                peer = %subscriber.peer_addr(),
                subscribers = subscribers.len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Point-in-time copy of the current membership
    pub async fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Current number of subscribers
    pub async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drop every subscriber, closing all connections
    ///
    /// Used on shutdown.
    pub async fn clear(&self) {
        let mut subscribers = self.subscribers.write().await;
        let dropped = subscribers.len();
        subscribers.clear();

        if dropped > 0 {
            tracing::info!(dropped = dropped, "Registry cleared");
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
