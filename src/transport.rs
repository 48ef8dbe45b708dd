//! Seam to the wire-level session layer.
//!
//! The engine does not speak the secure channel itself - session
//! establishment, encryption and message retransmission live behind the
//! [SessionTransport] trait. Adapters implement it on top of a real Matter
//! session layer; tests and demos implement it in-process.
//!
//! Unsolicited traffic for one subscription (report chunks, termination
//! notices) arrives on the mpsc channel handed back with [SubscribeAck].

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{InvokeError, SessionError},
    paths::{CommandPath, PathSet},
};

/// Authenticated session to one remote node.
///
/// The transport cancels `closed` when the underlying secure session dies;
/// holders must not reuse a closed handle.
#[derive(Debug)]
pub struct SessionHandle {
    pub node_id: u64,
    pub session_id: u16,
    closed: CancellationToken,
}

impl SessionHandle {
    pub fn new(node_id: u64, session_id: u16) -> Self {
        Self {
            node_id,
            session_id,
            closed: CancellationToken::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token the transport cancels when the session terminates.
    pub fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }
}

/// Why a subscription stream ended, as reported by the transport or peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Transport lost contact with the peer.
    LinkLoss,
    /// Peer restarted and dropped its subscription table.
    PeerRestart,
    /// Peer ended the subscription with a failure status.
    PeerFatal(u32),
    /// Local explicit shutdown.
    Shutdown,
}

impl TerminationReason {
    /// Recoverable reasons allow automatic resubscription; the rest are
    /// terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TerminationReason::LinkLoss | TerminationReason::PeerRestart)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::LinkLoss => write!(f, "LINK_LOSS"),
            TerminationReason::PeerRestart => write!(f, "PEER_RESTART"),
            TerminationReason::PeerFatal(status) => write!(f, "PEER_FATAL status={}", status),
            TerminationReason::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// One notification from the transport for an active subscription.
#[derive(Debug)]
pub enum TransportEvent {
    /// Raw report entry bytes; frames may be split at any byte boundary.
    ReportChunk(Vec<u8>),
    /// Subscription ended. `retry_delay` carries a peer-proposed delay
    /// before resubscribing, when the peer sent one.
    Terminated {
        reason: TerminationReason,
        retry_delay: Option<Duration>,
    },
}

/// Successful subscribe response: peer-assigned id plus the event stream
/// carrying this subscription's notifications.
pub struct SubscribeAck {
    pub subscription_id: u32,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Response to a unicast invoke. `path` is the response path as reported by
/// the peer (response commands carry their own command id).
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub path: CommandPath,
    pub status: u32,
    pub payload: Vec<u8>,
}

/// Session layer as consumed by the engine.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Establish (or re-establish) an authenticated session to a node.
    async fn open_session(&self, node_id: u64) -> Result<SessionHandle, SessionError>;

    /// Send a subscribe request over an open session and wait for the
    /// peer's acknowledgement.
    async fn send_subscribe_request(
        &self,
        session: &Arc<SessionHandle>,
        paths: &PathSet,
        min_interval_s: u16,
        max_interval_s: u16,
    ) -> Result<SubscribeAck, SessionError>;

    /// Send a unicast invoke and wait for the peer response. When
    /// `timed_interaction_timeout_s` is set the transport performs the
    /// timed-request exchange before the invoke itself.
    async fn send_invoke_request(
        &self,
        session: &Arc<SessionHandle>,
        path: &CommandPath,
        payload: &[u8],
        timed_interaction_timeout_s: Option<u16>,
    ) -> Result<InvokeResponse, InvokeError>;

    /// Enqueue a group invoke. Fire-and-forget: no session, no response.
    /// Errors only reflect local enqueue failure.
    async fn send_group_invoke(
        &self,
        group_id: u16,
        fabric_index: u8,
        path: &CommandPath,
        payload: &[u8],
    ) -> Result<(), InvokeError>;
}
