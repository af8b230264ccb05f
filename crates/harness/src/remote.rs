use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use resync_core::{OpId, QueuedOperation, Record};
use resync_engine::{GatewayRequest, RemoteGateway, SyncError};
use tokio::sync::{Notify, Semaphore};

/// Scripted answer for one gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Succeed,
    Reject(u16),
    Unreachable,
    Timeout,
    NoCredentials,
}

/// In-process stand-in for the remote backend.
///
/// Answers with the default reply unless a reply was scripted for the
/// operation. Records every request, and can hold requests in flight until
/// released.
pub struct StubGateway {
    default: Mutex<Reply>,
    scripted: Mutex<HashMap<OpId, VecDeque<Reply>>>,
    calls: Mutex<Vec<(OpId, GatewayRequest)>>,
    in_flight: Mutex<HashSet<OpId>>,
    overlaps: AtomicUsize,
    next_id: AtomicI64,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new(Reply::Succeed)
    }
}

impl StubGateway {
    pub fn new(default: Reply) -> Self {
        Self {
            default: Mutex::new(default),
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            overlaps: AtomicUsize::new(0),
            next_id: AtomicI64::new(1000),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::new(Reply::Succeed))
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default.lock() = reply;
    }

    /// Answer the next call for `op_id` with `reply`.
    pub fn script(&self, op_id: OpId, reply: Reply) {
        self.scripted.lock().entry(op_id).or_default().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<(OpId, GatewayRequest)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, op_id: OpId) -> usize {
        self.calls.lock().iter().filter(|(id, _)| *id == op_id).count()
    }

    /// Times a request arrived for an operation already in flight.
    pub fn overlapping_requests(&self) -> usize {
        self.overlaps.load(Ordering::Acquire)
    }

    /// Park every subsequent request until [`StubGateway::release`].
    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let held and future requests through.
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Resolves once a request has reached the stub.
    pub async fn wait_for_request(&self) {
        self.entered.notified().await;
    }

    fn reply_for(&self, op_id: OpId) -> Reply {
        self.scripted
            .lock()
            .get_mut(&op_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.lock().clone())
    }
}

#[async_trait]
impl RemoteGateway for StubGateway {
    async fn send(&self, op: &QueuedOperation) -> Result<Record, SyncError> {
        let reply = self.reply_for(op.id);
        if reply == Reply::NoCredentials {
            return Err(SyncError::CredentialsMissing);
        }

        let request = GatewayRequest::for_operation(op);
        self.calls.lock().push((op.id, request));
        if !self.in_flight.lock().insert(op.id) {
            self.overlaps.fetch_add(1, Ordering::AcqRel);
        }
        self.entered.notify_one();

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.in_flight.lock().remove(&op.id);

        match reply {
            Reply::Succeed => {
                let mut record = op.payload.clone();
                if record.remote_id().is_none() {
                    record.id = Some(self.next_id.fetch_add(1, Ordering::AcqRel));
                }
                Ok(record)
            }
            Reply::Reject(status) => Err(SyncError::RemoteRejected {
                status,
                body: "rejected by stub".into(),
            }),
            Reply::Unreachable => Err(SyncError::NetworkUnreachable("stub offline".into())),
            Reply::Timeout => Err(SyncError::TimeoutExceeded),
            Reply::NoCredentials => Err(SyncError::CredentialsMissing),
        }
    }
}
