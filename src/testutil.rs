//! Scriptable in-process transport for tests.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    error::{InvokeError, SessionError},
    paths::{CommandPath, PathSet},
    transport::{
        InvokeResponse, SessionHandle, SessionTransport, SubscribeAck, TerminationReason,
        TransportEvent,
    },
};

#[derive(Debug, Clone)]
pub(crate) struct RecordedInvoke {
    pub node_id: u64,
    pub path: CommandPath,
    pub payload: Vec<u8>,
    pub timed_interaction_timeout_s: Option<u16>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedGroupInvoke {
    pub group_id: u16,
    pub fabric_index: u8,
    pub path: CommandPath,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedSubscribe {
    pub node_id: u64,
    pub attribute_count: usize,
    pub event_count: usize,
    pub min_interval_s: u16,
    pub max_interval_s: u16,
    pub subscription_id: u32,
}

struct FakeSubscription {
    node_id: u64,
    tx: mpsc::Sender<TransportEvent>,
}

/// Fake session layer. Sessions always open unless a failure is queued;
/// subscriptions receive whatever the test pushes; invokes answer with a
/// configurable response.
pub(crate) struct FakeTransport {
    opened: AtomicUsize,
    next_session_id: AtomicU32,
    session_failures: Mutex<VecDeque<SessionError>>,
    subscribe_failures: Mutex<VecDeque<SessionError>>,
    next_subscription_id: AtomicU32,
    subscriptions: Mutex<Vec<FakeSubscription>>,
    subscribes: Mutex<Vec<RecordedSubscribe>>,
    invoke_response: Mutex<Option<InvokeResponse>>,
    invoke_status: AtomicU32,
    invoke_delay: Mutex<Option<Duration>>,
    invokes: Mutex<Vec<RecordedInvoke>>,
    group_failure: Mutex<Option<InvokeError>>,
    group_invokes: Mutex<Vec<RecordedGroupInvoke>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            opened: AtomicUsize::new(0),
            next_session_id: AtomicU32::new(1),
            session_failures: Mutex::new(VecDeque::new()),
            subscribe_failures: Mutex::new(VecDeque::new()),
            next_subscription_id: AtomicU32::new(42),
            subscriptions: Mutex::new(Vec::new()),
            subscribes: Mutex::new(Vec::new()),
            invoke_response: Mutex::new(None),
            invoke_status: AtomicU32::new(0),
            invoke_delay: Mutex::new(None),
            invokes: Mutex::new(Vec::new()),
            group_failure: Mutex::new(None),
            group_invokes: Mutex::new(Vec::new()),
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn fail_next_session(&self, error: SessionError) {
        self.session_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_subscribe(&self, error: SessionError) {
        self.subscribe_failures.lock().unwrap().push_back(error);
    }

    pub fn subscribes(&self) -> Vec<RecordedSubscribe> {
        self.subscribes.lock().unwrap().clone()
    }

    pub fn subscriptions_created(&self) -> usize {
        self.subscribes.lock().unwrap().len()
    }

    /// Push a report chunk into the newest subscription stream of a node.
    pub fn push_report(&self, node_id: u64, chunk: Vec<u8>) {
        let subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .iter()
            .rev()
            .find(|s| s.node_id == node_id)
            .expect("no subscription for node");
        sub.tx.try_send(TransportEvent::ReportChunk(chunk)).unwrap();
    }

    /// Terminate the newest subscription stream of a node.
    pub fn terminate_subscription(
        &self,
        node_id: u64,
        reason: TerminationReason,
        retry_delay: Option<Duration>,
    ) {
        let subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .iter()
            .rev()
            .find(|s| s.node_id == node_id)
            .expect("no subscription for node");
        sub.tx
            .try_send(TransportEvent::Terminated { reason, retry_delay })
            .unwrap();
    }

    /// Drop the newest subscription stream of a node without a notice.
    pub fn drop_stream(&self, node_id: u64) {
        let mut subs = self.subscriptions.lock().unwrap();
        if let Some(pos) = subs.iter().rposition(|s| s.node_id == node_id) {
            subs.remove(pos);
        }
    }

    pub fn set_invoke_status(&self, status: u32) {
        self.invoke_status.store(status, Ordering::SeqCst);
    }

    pub fn set_invoke_response(&self, response: InvokeResponse) {
        *self.invoke_response.lock().unwrap() = Some(response);
    }

    pub fn set_invoke_delay(&self, delay: Duration) {
        *self.invoke_delay.lock().unwrap() = Some(delay);
    }

    pub fn invokes(&self) -> Vec<RecordedInvoke> {
        self.invokes.lock().unwrap().clone()
    }

    pub fn fail_group_invoke(&self, error: InvokeError) {
        *self.group_failure.lock().unwrap() = Some(error);
    }

    pub fn group_invokes(&self) -> Vec<RecordedGroupInvoke> {
        self.group_invokes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionTransport for FakeTransport {
    async fn open_session(&self, node_id: u64) -> Result<SessionHandle, SessionError> {
        if let Some(error) = self.session_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst) as u16;
        Ok(SessionHandle::new(node_id, session_id))
    }

    async fn send_subscribe_request(
        &self,
        session: &Arc<SessionHandle>,
        paths: &PathSet,
        min_interval_s: u16,
        max_interval_s: u16,
    ) -> Result<SubscribeAck, SessionError> {
        if let Some(error) = self.subscribe_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = mpsc::channel(64);
        self.subscriptions.lock().unwrap().push(FakeSubscription {
            node_id: session.node_id,
            tx,
        });
        self.subscribes.lock().unwrap().push(RecordedSubscribe {
            node_id: session.node_id,
            attribute_count: paths.attributes().len(),
            event_count: paths.events().len(),
            min_interval_s,
            max_interval_s,
            subscription_id,
        });
        Ok(SubscribeAck {
            subscription_id,
            events,
        })
    }

    async fn send_invoke_request(
        &self,
        session: &Arc<SessionHandle>,
        path: &CommandPath,
        payload: &[u8],
        timed_interaction_timeout_s: Option<u16>,
    ) -> Result<InvokeResponse, InvokeError> {
        let delay = *self.invoke_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.invokes.lock().unwrap().push(RecordedInvoke {
            node_id: session.node_id,
            path: *path,
            payload: payload.to_vec(),
            timed_interaction_timeout_s,
        });
        if let Some(response) = self.invoke_response.lock().unwrap().clone() {
            return Ok(response);
        }
        Ok(InvokeResponse {
            path: *path,
            status: self.invoke_status.load(Ordering::SeqCst),
            payload: Vec::new(),
        })
    }

    async fn send_group_invoke(
        &self,
        group_id: u16,
        fabric_index: u8,
        path: &CommandPath,
        payload: &[u8],
    ) -> Result<(), InvokeError> {
        if let Some(error) = *self.group_failure.lock().unwrap() {
            return Err(error);
        }
        self.group_invokes.lock().unwrap().push(RecordedGroupInvoke {
            group_id,
            fabric_index,
            path: *path,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
