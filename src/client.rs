//! Interaction client: the context object tying the engine together.
//!
//! One [Client] owns the session resolver, the subscription registry and
//! the response decoder table for one transport. Multiple independent
//! clients can coexist; nothing here is process-global.
//!
//! Subscribe/unsubscribe return values only mean accepted-for-processing;
//! the subscription callbacks ("done", "connection failed") are the
//! authoritative completion signals. The client must run under a tokio
//! runtime - subscription controllers are spawned tasks.

use std::{sync::Arc, time::Duration};

use crate::{
    clusters,
    error::{InvalidArgument, InvokeError, RegistryError},
    invoke::{CommandDispatcher, DecoderRegistry, Destination, InvokeOptions},
    paths::{CommandPath, PathSet},
    registry::SubscriptionRegistry,
    resolver::SessionResolver,
    subscription::{self, SubscribeOptions, SubscriptionHandle},
    transport::SessionTransport,
};

#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Local fabric index used for group invokes without an explicit one.
    pub fabric_index: u8,
    /// Deadline for unicast invokes that do not carry their own.
    pub default_invoke_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            fabric_index: 1,
            default_invoke_timeout: Duration::from_secs(15),
        }
    }
}

pub struct Client {
    transport: Arc<dyn SessionTransport>,
    resolver: Arc<SessionResolver>,
    registry: Arc<SubscriptionRegistry>,
    decoders: Arc<DecoderRegistry>,
    dispatcher: CommandDispatcher,
}

impl Client {
    pub fn new(transport: Arc<dyn SessionTransport>, config: ClientConfig) -> Arc<Self> {
        let resolver = Arc::new(SessionResolver::new(transport.clone()));
        let registry = Arc::new(SubscriptionRegistry::new());
        let decoders = Arc::new(DecoderRegistry::new());
        clusters::decoders::register_builtin(&decoders);
        let dispatcher = CommandDispatcher::new(
            transport.clone(),
            resolver.clone(),
            decoders.clone(),
            config.fabric_index,
            config.default_invoke_timeout,
        );
        Arc::new(Self {
            transport,
            resolver,
            registry,
            decoders,
            dispatcher,
        })
    }

    /// Start a subscription to `node_id`. Returns as soon as the request
    /// is accepted; establishment runs on a spawned controller task and is
    /// reported through the callbacks in `options`.
    pub fn subscribe(
        &self,
        node_id: u64,
        paths: PathSet,
        options: SubscribeOptions,
    ) -> Result<Arc<SubscriptionHandle>, InvalidArgument> {
        if paths.is_empty() {
            return Err(InvalidArgument("subscription path set is empty".to_owned()));
        }
        let handle = SubscriptionHandle::new(node_id);
        if let Err(e) = self.registry.register(handle.clone()) {
            // fresh handle, cannot collide
            log::warn!("registering new subscription handle failed: {}", e);
        }
        log::debug!(
            "subscribing to node {} ({} attribute path(s), {} event path(s))",
            node_id,
            paths.attributes().len(),
            paths.events().len()
        );
        tokio::spawn(subscription::drive(
            handle.clone(),
            paths,
            options,
            self.resolver.clone(),
            self.transport.clone(),
            self.registry.clone(),
        ));
        Ok(handle)
    }

    /// Request termination of one subscription. Asynchronous: the "done"
    /// callback signals completion, not this call's return.
    pub fn unsubscribe(&self, node_id: u64, subscription_id: u32) -> Result<(), RegistryError> {
        self.registry.shutdown_one(node_id, subscription_id)
    }

    /// Terminate every subscription to one node.
    pub fn unsubscribe_all(&self, node_id: u64) {
        self.registry.shutdown_all_for_node(node_id)
    }

    /// Terminate every subscription of this client.
    pub fn unsubscribe_everything(&self) {
        self.registry.shutdown_all()
    }

    /// Invoke a cluster command. Unicast destinations wait for the peer
    /// response; group destinations return after local enqueue.
    pub async fn invoke_command(
        &self,
        destination: Destination,
        path: CommandPath,
        payload: &[u8],
        options: InvokeOptions,
    ) -> Result<(), InvokeError> {
        self.dispatcher.invoke(destination, path, payload, options).await
    }

    /// Response decoder table, for registering cluster-specific decoders.
    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    /// Subscription table, for inspection.
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}
