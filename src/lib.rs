//! Matter interaction model client engine
//!
//! This library implements the controller-side interaction model: long-lived
//! subscriptions to attribute/event reports and single-shot command invokes.
//! Library uses asynchronous Rust and depends on Tokio. Following are main
//! parts of api:
//! - [SessionTransport](transport::SessionTransport) - Trait representing the
//!                      wire-level session layer. The engine resolves sessions,
//!                      sends subscribe/invoke requests and receives report
//!                      streams through it; adapters supply the actual secure
//!                      channel.
//! - [Client](client::Client) - Engine context object. Owns the session cache,
//!                      the subscription registry and the response decoder
//!                      table; exposes [subscribe](client::Client::subscribe),
//!                      [unsubscribe](client::Client::unsubscribe) and
//!                      [invoke_command](client::Client::invoke_command).
//! - [PathSet](paths::PathSet) - Builder for attribute/event path lists,
//!                      from single triples or parallel arrays, with wildcard
//!                      support.
//! - [SubscribeOptions](subscription::SubscribeOptions) - Named-field
//!                      configuration of one subscription: report intervals,
//!                      resubscription policy and the per-subscription
//!                      callbacks.
//! - [report] - Report entry stream decoding; tolerant of chunked delivery.
//! - [clusters] - Cluster id constants and built-in command response decoders.
//!
//! Example subscribing to the on/off attribute of endpoint 1 and reacting to
//! pushed state changes:
//! ```no_run
//! # use std::sync::Arc;
//! # use matim::{client, clusters, paths, subscription, transport};
//! # fn example(session_layer: Arc<dyn transport::SessionTransport>) -> anyhow::Result<()> {
//! let client = client::Client::new(session_layer, client::ClientConfig::default());
//! let paths = paths::PathSet::single_attribute(
//!     1,
//!     clusters::defs::CLUSTER_ID_ON_OFF,
//!     clusters::defs::CLUSTER_ON_OFF_ATTR_ID_ONOFF,
//! );
//! let mut options = subscription::SubscribeOptions::new(1, 10);
//! options.on_attribute = Some(Box::new(|report| {
//!     println!("{:?} = {:?}", report.path, report.value);
//! }));
//! options.on_done = Some(Box::new(|node, id| {
//!     println!("subscription {} to node {} ended", id, node);
//! }));
//! let handle = client.subscribe(0x1234, paths, options)?;
//! # Ok(())
//! # }
//! ```
//!
//! Example invoking the Toggle command, unicast and as a group multicast:
//! ```no_run
//! # use std::sync::Arc;
//! # use matim::{client, clusters, invoke, paths, transport};
//! # async fn example(session_layer: Arc<dyn transport::SessionTransport>) -> anyhow::Result<()> {
//! let client = client::Client::new(session_layer, client::ClientConfig::default());
//! let path = paths::CommandPath {
//!     endpoint_id: 1,
//!     cluster_id: clusters::defs::CLUSTER_ID_ON_OFF,
//!     command_id: clusters::defs::CLUSTER_ON_OFF_CMD_ID_TOGGLE,
//! };
//! // unicast - waits for the peer response
//! client
//!     .invoke_command(invoke::Destination::Node(0x1234), path, &[], Default::default())
//!     .await?;
//! // group multicast - fire and forget, returns after local enqueue
//! client
//!     .invoke_command(
//!         invoke::Destination::Group { group_id: 5, fabric_index: None },
//!         path,
//!         &[],
//!         Default::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//!
#![doc = include_str!("../readme.md")]

pub mod client;
pub mod clusters;
pub mod error;
pub mod invoke;
pub mod paths;
pub mod registry;
pub mod report;
mod resolver;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod testutil;
