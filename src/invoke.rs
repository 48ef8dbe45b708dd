//! Command invocation: unicast request/response and group fire-and-forget.
//!
//! Unicast invokes resolve a session first and are bounded by an
//! interaction deadline; group invokes bypass sessions entirely and only
//! ever fail locally. Typed command responses are decoded by per-cluster
//! decoders registered in a [DecoderRegistry] and surfaced through the log
//! inspection sink; a response without a registered decoder is simply
//! acknowledged.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    error::InvokeError,
    paths::CommandPath,
    resolver::SessionResolver,
    transport::{InvokeResponse, SessionTransport},
};

/// Where an invoke goes: one node over a session, or a multicast group.
/// A group destination without an explicit fabric index uses the client's
/// configured local fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Node(u64),
    Group {
        group_id: u16,
        fabric_index: Option<u8>,
    },
}

/// Per-invoke options. `timeout` bounds the whole unicast interaction;
/// `None` uses the client default.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeOptions {
    pub timed_interaction_timeout_s: Option<u16>,
    pub timeout: Option<Duration>,
}

/// Decoder for one cluster command response payload.
pub trait ResponseDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> anyhow::Result<serde_json::Value>;
}

/// Table of response decoders keyed by (cluster id, response command id).
#[derive(Default)]
pub struct DecoderRegistry {
    table: Mutex<HashMap<(u32, u32), Arc<dyn ResponseDecoder>>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder; replaces any previous entry for the same key.
    pub fn register(&self, cluster_id: u32, command_id: u32, decoder: Arc<dyn ResponseDecoder>) {
        self.table.lock().unwrap().insert((cluster_id, command_id), decoder);
    }

    pub fn lookup(&self, cluster_id: u32, command_id: u32) -> Option<Arc<dyn ResponseDecoder>> {
        self.table.lock().unwrap().get(&(cluster_id, command_id)).cloned()
    }
}

pub(crate) struct CommandDispatcher {
    transport: Arc<dyn SessionTransport>,
    resolver: Arc<SessionResolver>,
    decoders: Arc<DecoderRegistry>,
    fabric_index: u8,
    default_timeout: Duration,
}

impl CommandDispatcher {
    pub(crate) fn new(
        transport: Arc<dyn SessionTransport>,
        resolver: Arc<SessionResolver>,
        decoders: Arc<DecoderRegistry>,
        fabric_index: u8,
        default_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            resolver,
            decoders,
            fabric_index,
            default_timeout,
        }
    }

    /// Dispatch one invoke. Exactly one success or error per call.
    pub(crate) async fn invoke(
        &self,
        destination: Destination,
        path: CommandPath,
        payload: &[u8],
        options: InvokeOptions,
    ) -> Result<(), InvokeError> {
        match destination {
            Destination::Group { group_id, fabric_index } => {
                let fabric_index = fabric_index.unwrap_or(self.fabric_index);
                log::debug!(
                    "group invoke group:{} fabric:{} cluster:{} command:{}",
                    group_id,
                    fabric_index,
                    path.cluster_id,
                    path.command_id
                );
                // fire-and-forget - no session, no response expected
                self.transport
                    .send_group_invoke(group_id, fabric_index, &path, payload)
                    .await
            }
            Destination::Node(node_id) => {
                let session = self
                    .resolver
                    .resolve(node_id)
                    .await
                    .map_err(InvokeError::SessionUnavailable)?;
                log::debug!(
                    "invoke node:{} endpoint:{} cluster:{} command:{} payload:{}",
                    node_id,
                    path.endpoint_id,
                    path.cluster_id,
                    path.command_id,
                    hex::encode(payload)
                );
                let deadline = options.timeout.unwrap_or(self.default_timeout);
                let response = tokio::time::timeout(
                    deadline,
                    self.transport.send_invoke_request(
                        &session,
                        &path,
                        payload,
                        options.timed_interaction_timeout_s,
                    ),
                )
                .await
                .map_err(|_| InvokeError::Timeout)??;
                if response.status != 0 {
                    return Err(InvokeError::PeerError(response.status));
                }
                self.surface_response(node_id, &response);
                Ok(())
            }
        }
    }

    /// Route a successful response payload through the decoder table.
    /// A missing decoder or a decoder failure never fails the invoke.
    fn surface_response(&self, node_id: u64, response: &InvokeResponse) {
        let path = &response.path;
        if response.payload.is_empty() {
            log::trace!(
                "node {}: command ({}, {}) acknowledged without payload",
                node_id,
                path.cluster_id,
                path.command_id
            );
            return;
        }
        match self.decoders.lookup(path.cluster_id, path.command_id) {
            Some(decoder) => match decoder.decode(&response.payload) {
                Ok(json) => log::info!(
                    "node {}: response ({}, {}): {}",
                    node_id,
                    path.cluster_id,
                    path.command_id,
                    json
                ),
                Err(e) => log::warn!(
                    "node {}: response ({}, {}) decode failed: {:#}, payload: {}",
                    node_id,
                    path.cluster_id,
                    path.command_id,
                    e,
                    hex::encode(&response.payload)
                ),
            },
            None => log::debug!(
                "node {}: no decoder for response ({}, {}), acknowledged",
                node_id,
                path.cluster_id,
                path.command_id
            ),
        }
    }
}
