//! Session resolution with a per-node cache.
//!
//! Resolving a node either reuses the cached open session or asks the
//! transport to establish a new one. Retry policy belongs to callers (the
//! subscription controller retries, the command dispatcher does not).

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    error::SessionError,
    transport::{SessionHandle, SessionTransport},
};

pub struct SessionResolver {
    transport: Arc<dyn SessionTransport>,
    // lock held across establishment so concurrent resolves to one node
    // produce a single session
    cache: Mutex<HashMap<u64, Arc<SessionHandle>>>,
}

impl SessionResolver {
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve an open session to `node_id`. Exactly one of success or
    /// failure per call; no retries here.
    pub async fn resolve(&self, node_id: u64) -> Result<Arc<SessionHandle>, SessionError> {
        let mut cache = self.cache.lock().await;
        if let Some(session) = cache.get(&node_id) {
            if !session.is_closed() {
                log::trace!("reusing session {} to node {}", session.session_id, node_id);
                return Ok(session.clone());
            }
            log::debug!("cached session to node {} is closed, re-establishing", node_id);
            cache.remove(&node_id);
        }
        match self.transport.open_session(node_id).await {
            Ok(session) => {
                log::debug!("established session {} to node {}", session.session_id, node_id);
                let session = Arc::new(session);
                cache.insert(node_id, session.clone());
                Ok(session)
            }
            Err(e) => {
                log::debug!("session establishment to node {} failed: {}", node_id, e);
                Err(e)
            }
        }
    }

    /// Drop the cached session for a node; the next resolve re-establishes.
    pub async fn invalidate(&self, node_id: u64) {
        if self.cache.lock().await.remove(&node_id).is_some() {
            log::debug!("invalidated cached session to node {}", node_id);
        }
    }
}
