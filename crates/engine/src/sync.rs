//! Drains the pending operation queue against the remote gateway.
//!
//! Each table is a lane with a single-slot "drain in progress" flag. A drain
//! claims every free lane before it snapshots the queue, so an operation is
//! never in flight twice: a wake-up that finds a lane busy leaves that lane to
//! the drain already running it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use resync_core::{OpId, QueuedOperation, Record, RecordKey, Table};
use resync_storage::LocalStore;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::gateway::RemoteGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Draining,
}

/// Summary of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Operations handed to the gateway.
    pub attempted: usize,
    pub delivered: Vec<OpId>,
    /// Operations the remote refused; they stay queued.
    pub rejected: Vec<(OpId, String)>,
    /// Operations not attempted because the cycle aborted.
    pub skipped: usize,
    /// Lanes already being drained by another cycle.
    pub coalesced: Vec<Table>,
    /// Why the cycle stopped early, if it did.
    pub aborted: Option<String>,
}

impl DrainReport {
    pub fn is_noop(&self) -> bool {
        self.attempted == 0
    }

    pub fn fully_coalesced(&self) -> bool {
        self.attempted == 0 && !self.coalesced.is_empty()
    }
}

#[derive(Default)]
struct LaneOutcome {
    attempted: usize,
    delivered: Vec<OpId>,
    rejected: Vec<(OpId, String)>,
    skipped: usize,
}

/// Cycle-wide stop signal shared by all lanes of one drain.
#[derive(Default)]
struct CycleAbort {
    reason: Mutex<Option<String>>,
}

impl CycleAbort {
    fn trip(&self, reason: String) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(reason);
        }
    }

    fn is_tripped(&self) -> bool {
        self.reason.lock().is_some()
    }

    fn take(&self) -> Option<String> {
        self.reason.lock().take()
    }
}

struct LaneGuard<'a> {
    table: Table,
    flag: &'a AtomicBool,
}

impl Drop for LaneGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct ActiveDrain<'a>(&'a AtomicUsize);

impl<'a> ActiveDrain<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ActiveDrain<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    lanes: BTreeMap<Table, AtomicBool>,
    active_drains: AtomicUsize,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn LocalStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            store,
            gateway,
            lanes: Table::ALL.iter().map(|t| (*t, AtomicBool::new(false))).collect(),
            active_drains: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn state(&self) -> EngineState {
        if self.active_drains.load(Ordering::Acquire) > 0 {
            EngineState::Draining
        } else {
            EngineState::Idle
        }
    }

    pub fn lane_busy(&self, table: Table) -> bool {
        self.lanes
            .get(&table)
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    fn try_claim(&self, table: Table) -> Option<LaneGuard<'_>> {
        let flag = self.lanes.get(&table)?;
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LaneGuard { table, flag })
    }

    /// Run one drain cycle. Never fails: every error is logged and reflected
    /// in the report, and undelivered operations stay queued.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let mut guards = Vec::new();
        for table in Table::ALL {
            match self.try_claim(table) {
                Some(guard) => guards.push(guard),
                None => report.coalesced.push(table),
            }
        }
        if guards.is_empty() {
            debug!(lanes = ?report.coalesced, "drain already in progress, coalescing wake-up");
            return report;
        }

        let active = ActiveDrain::enter(&self.active_drains);
        let started = Instant::now();
        self.drain_claimed(&guards, &mut report).await;
        drop(guards);
        drop(active);

        if !report.is_noop() {
            info!(
                attempted = report.attempted,
                delivered = report.delivered.len(),
                rejected = report.rejected.len(),
                skipped = report.skipped,
                aborted = report.aborted.as_deref().unwrap_or(""),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "drain cycle finished"
            );
        }
        report
    }

    async fn drain_claimed(&self, guards: &[LaneGuard<'_>], report: &mut DrainReport) {
        let snapshot = match self.store.list_all() {
            Ok(ops) => ops,
            Err(e) => {
                error!(error = %e, "cannot read pending queue");
                report.aborted = Some(e.to_string());
                return;
            }
        };

        let mut lanes: BTreeMap<Table, Vec<QueuedOperation>> = BTreeMap::new();
        for op in snapshot {
            if guards.iter().any(|g| g.table == op.table) {
                lanes.entry(op.table).or_default().push(op);
            }
        }
        if lanes.is_empty() {
            info!("nothing to sync");
            return;
        }

        let abort = CycleAbort::default();
        let outcomes = join_all(
            lanes
                .into_iter()
                .map(|(table, ops)| self.run_lane(table, ops, &abort)),
        )
        .await;

        for outcome in outcomes {
            report.attempted += outcome.attempted;
            report.delivered.extend(outcome.delivered);
            report.rejected.extend(outcome.rejected);
            report.skipped += outcome.skipped;
        }
        report.aborted = abort.take();
    }

    async fn run_lane(
        &self,
        table: Table,
        ops: Vec<QueuedOperation>,
        abort: &CycleAbort,
    ) -> LaneOutcome {
        let mut outcome = LaneOutcome::default();
        let total = ops.len();

        for (index, op) in ops.into_iter().enumerate() {
            if abort.is_tripped() {
                outcome.skipped += total - index;
                break;
            }
            outcome.attempted += 1;

            match self.gateway.send(&op).await {
                Ok(record) => {
                    self.acknowledge(&op, record);
                    outcome.delivered.push(op.id);
                }
                Err(err) if err.aborts_cycle() => {
                    warn!(op_id = %op.id, %table, error = %err, "remote unreachable, stopping drain");
                    if !matches!(err, SyncError::CredentialsMissing) {
                        self.note_failure(&op, &err);
                    }
                    abort.trip(err.to_string());
                    outcome.skipped += total - index - 1;
                    break;
                }
                Err(err) => {
                    warn!(op_id = %op.id, %table, error = %err, "operation failed, keeping it queued");
                    self.note_failure(&op, &err);
                    outcome.rejected.push((op.id, err.to_string()));
                }
            }
        }
        outcome
    }

    /// Dequeue a delivered operation and mirror the server's representation,
    /// unless a newer local write to the same record is still queued.
    fn acknowledge(&self, op: &QueuedOperation, record: Record) {
        if let Err(e) = self.store.remove(op.id) {
            error!(op_id = %op.id, error = %e, "delivered operation could not be dequeued");
        }

        let Some(id) = record.remote_id() else {
            debug!(op_id = %op.id, table = %op.table, "remote returned no identifier, keeping local copy");
            return;
        };
        let key = RecordKey::remote(op.table, id);
        if self.has_pending_write(&key) {
            debug!(op_id = %op.id, %key, "newer local write queued, not mirroring");
        } else if let Err(e) = self.store.put_all(&[(key, record)]) {
            warn!(op_id = %op.id, error = %e, "cannot mirror remote record");
        }
        if op.is_create() {
            if let Err(e) = self.store.delete(&RecordKey::local(op.table, op.id)) {
                warn!(op_id = %op.id, error = %e, "cannot drop local placeholder");
            }
        }
        debug!(op_id = %op.id, table = %op.table, "operation delivered");
    }

    fn has_pending_write(&self, key: &RecordKey) -> bool {
        match self.store.list_all() {
            Ok(ops) => ops
                .iter()
                .any(|op| RecordKey::for_record(op.table, &op.payload, op.id) == *key),
            Err(e) => {
                warn!(%key, error = %e, "cannot read pending queue, keeping local copy");
                true
            }
        }
    }

    fn note_failure(&self, op: &QueuedOperation, err: &SyncError) {
        if let Err(e) = self.store.record_failure(op.id, &err.to_string()) {
            warn!(op_id = %op.id, error = %e, "cannot record failed attempt");
        }
    }
}
