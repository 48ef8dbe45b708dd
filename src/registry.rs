//! Table of active subscriptions, keyed by node id.
//!
//! The registry holds the long-lived strong reference to each subscription
//! handle; a controller signals completion and the owner drops the
//! reference, never the subscription itself from inside its own callback.
//! Shutdown requests only cancel tokens; the
//! driver task delivers the "done" callback and, unless the subscription
//! was configured to keep its bookkeeping, deregisters itself. Tokens are
//! cancelled outside the table lock so callbacks never run under it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{error::RegistryError, subscription::SubscriptionHandle};

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<u64, Vec<Arc<SubscriptionHandle>>>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a handle. The same node may carry any number of distinct
    /// subscriptions; only registering the exact same handle twice fails.
    pub(crate) fn register(&self, handle: Arc<SubscriptionHandle>) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().unwrap();
        let bucket = entries.entry(handle.node_id()).or_default();
        if bucket.iter().any(|h| Arc::ptr_eq(h, &handle)) {
            return Err(RegistryError::AlreadyExists);
        }
        bucket.push(handle);
        Ok(())
    }

    /// Remove a specific handle, by identity. No-op when absent (the
    /// handle may already have been removed by an explicit shutdown).
    pub(crate) fn deregister(&self, handle: &Arc<SubscriptionHandle>) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(bucket) = entries.get_mut(&handle.node_id()) {
            bucket.retain(|h| !Arc::ptr_eq(h, handle));
            if bucket.is_empty() {
                entries.remove(&handle.node_id());
            }
        }
    }

    /// Request graceful termination of one subscription. Removal from the
    /// table is synchronous; the "done" callback is the asynchronous
    /// completion signal.
    pub fn shutdown_one(&self, node_id: u64, subscription_id: u32) -> Result<(), RegistryError> {
        let handle = {
            let mut entries = self.entries.lock().unwrap();
            let bucket = entries.get_mut(&node_id).ok_or(RegistryError::NotFound)?;
            let pos = bucket
                .iter()
                .position(|h| h.subscription_id() == subscription_id)
                .ok_or(RegistryError::NotFound)?;
            let handle = bucket.remove(pos);
            if bucket.is_empty() {
                entries.remove(&node_id);
            }
            handle
        };
        log::debug!("shutdown of subscription {} to node {} requested", subscription_id, node_id);
        handle.request_shutdown();
        Ok(())
    }

    /// Terminate every subscription to one node. Best-effort; succeeds
    /// even when the node has none.
    pub fn shutdown_all_for_node(&self, node_id: u64) {
        let handles = self.entries.lock().unwrap().remove(&node_id).unwrap_or_default();
        log::debug!("shutting down {} subscription(s) to node {}", handles.len(), node_id);
        for handle in handles {
            handle.request_shutdown();
        }
    }

    /// Terminate every subscription in the registry.
    pub fn shutdown_all(&self) {
        let buckets: Vec<_> = self.entries.lock().unwrap().drain().collect();
        for (node_id, handles) in buckets {
            log::debug!("shutting down {} subscription(s) to node {}", handles.len(), node_id);
            for handle in handles {
                handle.request_shutdown();
            }
        }
    }

    /// Number of registered subscriptions across all nodes.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub(crate) fn contains(&self, node_id: u64, subscription_id: u32) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&node_id)
            .map(|bucket| bucket.iter().any(|h| h.subscription_id() == subscription_id))
            .unwrap_or(false)
    }
}
