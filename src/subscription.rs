//! Subscription controller.
//!
//! One logical subscription to one remote node, driven by a background
//! task spawned at subscribe time. The task owns the path set and all
//! bound callbacks; the registry holds the only long-lived handle, so
//! nothing deletes itself from inside its own callback.
//!
//! State machine: Pending -> Established -> Resubscribing -> Terminated.
//! The "done" callback fires exactly once on entering Terminated and is
//! always the last callback; a subscription that never established fires
//! "connection failed" instead and nothing after it.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    error::SessionError,
    paths::PathSet,
    registry::SubscriptionRegistry,
    report::{AttributeReport, EventReport, ReportDecoder, ReportEntry, StreamError},
    resolver::SessionResolver,
    transport::{SessionTransport, TerminationReason, TransportEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Pending,
    Established,
    Resubscribing,
    Terminated,
}

/// Shared identity of one subscription. The registry and the driver task
/// hold it; `subscription_id` stays 0 until the peer assigns one.
pub struct SubscriptionHandle {
    node_id: u64,
    subscription_id: AtomicU32,
    state: Mutex<SubscriptionState>,
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    pub(crate) fn new(node_id: u64) -> Arc<Self> {
        Arc::new(Self {
            node_id,
            subscription_id: AtomicU32::new(0),
            state: Mutex::new(SubscriptionState::Pending),
            cancel: CancellationToken::new(),
        })
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Peer-assigned id; 0 before establishment.
    pub fn subscription_id(&self) -> u32 {
        self.subscription_id.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SubscriptionState {
        *self.state.lock().unwrap()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == SubscriptionState::Terminated
    }

    pub(crate) fn set_subscription_id(&self, id: u32) {
        self.subscription_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: SubscriptionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Request asynchronous termination; the "done" callback is the
    /// completion signal, not this call.
    pub(crate) fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn cancelled_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("node_id", &self.node_id)
            .field("subscription_id", &self.subscription_id())
            .field("state", &self.state())
            .finish()
    }
}

pub type AttributeReportCallback = Box<dyn FnMut(&AttributeReport) + Send>;
pub type EventReportCallback = Box<dyn FnMut(&EventReport) + Send>;
pub type EstablishedCallback = Box<dyn FnMut(u32) + Send>;
pub type DoneCallback = Box<dyn FnOnce(u64, u32) + Send>;
pub type ConnectionFailedCallback = Box<dyn FnOnce(u64, SessionError) + Send>;
pub type SubscriptionErrorCallback = Box<dyn FnMut(&StreamError) + Send>;

/// Backoff applied between resubscription attempts when the peer does not
/// propose its own delay: capped exponential with random jitter.
#[derive(Debug, Clone, Copy)]
pub struct ResubscribePolicy {
    pub initial: Duration,
    pub cap: Duration,
    pub max_retries: u8,
}

impl Default for ResubscribePolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(300),
            max_retries: 10,
        }
    }
}

impl ResubscribePolicy {
    /// Delay before attempt number `retry` (1-based). Jitter keeps a fleet
    /// of controllers from reconnecting in lockstep.
    pub fn delay_for(&self, retry: u8) -> Duration {
        let exp = self
            .initial
            .saturating_mul(1u32 << (retry.saturating_sub(1)).min(16));
        let full = exp.min(self.cap);
        full.mul_f64(0.5 + 0.5 * rand::random::<f64>())
    }
}

/// Configuration of one subscription: intervals, lifecycle flags and the
/// optional callbacks, all named fields.
#[derive(Default)]
pub struct SubscribeOptions {
    pub min_interval_s: u16,
    pub max_interval_s: u16,
    pub auto_resubscribe: bool,
    pub keep_on_termination: bool,
    pub resubscribe: ResubscribePolicy,
    pub on_attribute: Option<AttributeReportCallback>,
    pub on_event: Option<EventReportCallback>,
    pub on_established: Option<EstablishedCallback>,
    pub on_done: Option<DoneCallback>,
    pub on_connection_failed: Option<ConnectionFailedCallback>,
    pub on_error: Option<SubscriptionErrorCallback>,
}

impl SubscribeOptions {
    pub fn new(min_interval_s: u16, max_interval_s: u16) -> Self {
        Self {
            min_interval_s,
            max_interval_s,
            auto_resubscribe: true,
            ..Default::default()
        }
    }
}

enum Outcome {
    /// Entered Terminated after running; "done" fires.
    Done,
    /// Never established; "connection failed" fires, nothing after it.
    ConnectionFailed(SessionError),
}

/// How one establishment ended.
enum StreamEnd {
    Transport(TerminationReason, Option<Duration>),
    /// Event channel dropped without a termination notice.
    ChannelClosed,
    /// Framing corruption; the stream is unusable but a fresh
    /// subscription can replace it.
    Corrupt,
}

impl StreamEnd {
    fn is_recoverable(&self) -> bool {
        match self {
            StreamEnd::Transport(reason, _) => reason.is_recoverable(),
            StreamEnd::ChannelClosed | StreamEnd::Corrupt => true,
        }
    }

    fn retry_delay(&self) -> Option<Duration> {
        match self {
            StreamEnd::Transport(_, delay) => *delay,
            _ => None,
        }
    }
}

/// Driver task body; spawned once per subscription by the client.
pub(crate) async fn drive(
    handle: Arc<SubscriptionHandle>,
    paths: PathSet,
    mut options: SubscribeOptions,
    resolver: Arc<SessionResolver>,
    transport: Arc<dyn SessionTransport>,
    registry: Arc<SubscriptionRegistry>,
) {
    let node_id = handle.node_id();
    let mut retries: u8 = 0;
    let mut established_once = false;

    let outcome = 'machine: loop {
        // Pending or Resubscribing: resolve a session, send the subscribe
        // request, wait for the peer ack.
        let session = tokio::select! {
            _ = handle.cancelled_token().cancelled() => break 'machine Outcome::Done,
            r = resolver.resolve(node_id) => r,
        };
        let ack = match session {
            Ok(session) => {
                tokio::select! {
                    _ = handle.cancelled_token().cancelled() => break 'machine Outcome::Done,
                    r = transport.send_subscribe_request(
                        &session,
                        &paths,
                        options.min_interval_s,
                        options.max_interval_s,
                    ) => r,
                }
            }
            Err(e) => Err(e),
        };
        let mut ack = match ack {
            Ok(ack) => ack,
            Err(e) => {
                if !established_once {
                    break 'machine Outcome::ConnectionFailed(e);
                }
                retries = retries.saturating_add(1);
                if retries > options.resubscribe.max_retries {
                    log::debug!("node {}: resubscription attempts exhausted", node_id);
                    break 'machine Outcome::Done;
                }
                let delay = options.resubscribe.delay_for(retries);
                log::debug!(
                    "node {}: resubscribe attempt {} failed ({}), next in {:?}",
                    node_id,
                    retries,
                    e,
                    delay
                );
                tokio::select! {
                    _ = handle.cancelled_token().cancelled() => break 'machine Outcome::Done,
                    _ = tokio::time::sleep(delay) => {}
                }
                continue 'machine;
            }
        };

        retries = 0;
        established_once = true;
        handle.set_subscription_id(ack.subscription_id);
        handle.set_state(SubscriptionState::Established);
        log::debug!("node {}: subscription {} established", node_id, ack.subscription_id);
        if let Some(cb) = options.on_established.as_mut() {
            cb(ack.subscription_id);
        }

        // Established: stream reports until the transport says otherwise.
        let mut decoder = ReportDecoder::new();
        let end = loop {
            let event = tokio::select! {
                _ = handle.cancelled_token().cancelled() => break 'machine Outcome::Done,
                ev = ack.events.recv() => ev,
            };
            match event {
                None => break StreamEnd::ChannelClosed,
                Some(TransportEvent::ReportChunk(chunk)) => match decoder.feed(&chunk) {
                    Ok(entries) => deliver(&mut options, entries),
                    Err(e) => {
                        log::debug!("node {}: {}", node_id, e);
                        if let Some(cb) = options.on_error.as_mut() {
                            cb(&e);
                        }
                        break StreamEnd::Corrupt;
                    }
                },
                Some(TransportEvent::Terminated { reason, retry_delay }) => {
                    log::debug!("node {}: subscription terminated: {}", node_id, reason);
                    break StreamEnd::Transport(reason, retry_delay);
                }
            }
        };

        if !(end.is_recoverable() && options.auto_resubscribe) {
            break 'machine Outcome::Done;
        }
        retries = retries.saturating_add(1);
        if retries > options.resubscribe.max_retries {
            log::debug!("node {}: resubscription attempts exhausted", node_id);
            break 'machine Outcome::Done;
        }
        handle.set_state(SubscriptionState::Resubscribing);
        resolver.invalidate(node_id).await;
        let delay = end
            .retry_delay()
            .unwrap_or_else(|| options.resubscribe.delay_for(retries));
        log::debug!("node {}: resubscribing in {:?} (attempt {})", node_id, delay, retries);
        tokio::select! {
            _ = handle.cancelled_token().cancelled() => break 'machine Outcome::Done,
            _ = tokio::time::sleep(delay) => {}
        }
    };

    handle.set_state(SubscriptionState::Terminated);
    if !options.keep_on_termination {
        registry.deregister(&handle);
    }
    match outcome {
        Outcome::ConnectionFailed(e) => {
            log::debug!("node {}: connection failed: {}", node_id, e);
            if let Some(cb) = options.on_connection_failed.take() {
                cb(node_id, e);
            }
        }
        Outcome::Done => {
            log::debug!("node {}: subscription {} done", node_id, handle.subscription_id());
            if let Some(cb) = options.on_done.take() {
                cb(node_id, handle.subscription_id());
            }
        }
    }
}

fn deliver(options: &mut SubscribeOptions, entries: Vec<ReportEntry>) {
    for entry in entries {
        match entry {
            ReportEntry::Attribute(report) => {
                log::trace!("attribute report {:?}", report);
                if let Some(cb) = options.on_attribute.as_mut() {
                    cb(&report);
                }
            }
            ReportEntry::Event(report) => {
                log::trace!("event report {:?}", report);
                if let Some(cb) = options.on_event.as_mut() {
                    cb(&report);
                }
            }
        }
    }
}
