//! Periodic chain rotation.
//!
//! A single tokio task owns the timeline: it sleeps to the next absolute
//! boundary, runs one synchronous [`Rotator::rotate`], and repeats. Because
//! the rotation itself never awaits, a stop signal can only be observed
//! between rotations.
//!
//! # State machine
//!
//! ```text
//!          start()                cancel() / cancel_and_wait()
//!   Idle ──────────► Scheduled ─────────────────────────────► Idle
//!    ▲  start() while Scheduled: warn, Unchanged              │
//!    └── cancel() while Idle: warn, Unchanged ◄───────────────┘
//! ```

use beacon_core::{ChainRecord, Environment, RotationClock};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::{
    error::BeaconError,
    head::{HeadCache, is_backed},
    storage::{PreferenceStore, RecordStore},
};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No worker running
    Idle,
    /// Worker firing on every boundary
    Scheduled,
}

impl SchedulerState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
        }
    }
}

/// Result of a start or cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The scheduler moved into this state.
    Changed(SchedulerState),
    /// The request was out of sequence; the scheduler stayed in this state.
    Unchanged(SchedulerState),
}

impl Transition {
    /// Treat an out-of-sequence request as an error.
    ///
    /// # Errors
    ///
    /// `SchedulerStateMisuse` if the transition was `Unchanged`.
    pub fn require_changed(self, operation: &'static str) -> Result<SchedulerState, BeaconError> {
        match self {
            Self::Changed(state) => Ok(state),
            Self::Unchanged(state) => {
                Err(BeaconError::SchedulerStateMisuse { operation, state: state.as_str() })
            },
        }
    }
}

/// What a single firing did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new pending record was created.
    Rotated {
        /// Timestamp of the new record
        timestamp: u64,
        /// Whether a previously pending record got its identifier
        filled: bool,
    },
    /// Nothing was written.
    Skipped(SkipReason),
}

/// Why a firing wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No chain head exists yet; bootstrap has not run
    NoHead,
    /// The cached head matches no stored record; an exposure report was
    /// interrupted and must be rerun before the chain can advance
    OrphanedHead {
        /// Timestamp of the cached head
        head_timestamp: u64,
    },
    /// The firing boundary is not after the head
    NotAdvanced {
        /// Boundary of this firing
        boundary: u64,
        /// Timestamp of the cached head
        head_timestamp: u64,
    },
}

/// One rotation step against the stores.
///
/// Cheap to clone; the worker task owns one copy.
#[derive(Clone)]
pub struct Rotator<E, R, P> {
    env: E,
    records: R,
    head: HeadCache<P>,
    clock: RotationClock,
}

impl<E, R, P> Rotator<E, R, P>
where
    E: Environment,
    R: RecordStore,
    P: PreferenceStore,
{
    /// Build a rotator.
    pub fn new(env: E, records: R, head: HeadCache<P>, clock: RotationClock) -> Self {
        Self { env, records, head, clock }
    }

    /// Advance the chain by one step at the current boundary.
    ///
    /// 1. Fill the pending record's identifier from the cached head's seed
    /// 2. Insert a new pending record carrying the next seed
    /// 3. Point the cached head at it
    ///
    /// A head left behind by an earlier partial tick (step 2 succeeded, step
    /// 3 did not) is repaired from the pending record first, so the ratchet
    /// never forks. A head whose record is gone is never advanced: the chain
    /// it belonged to was wiped by a report that did not finish.
    ///
    /// # Errors
    ///
    /// Any store or cipher failure.
    pub fn rotate(&self) -> Result<TickOutcome, BeaconError> {
        let boundary = self.clock.align_previous_boundary(self.env.wall_clock_millis());

        let Some(mut head) = self.head.load()? else {
            return Ok(TickOutcome::Skipped(SkipReason::NoHead));
        };

        let pending = self.records.latest_pending()?;
        if let Some(record) = pending.as_ref().filter(|r| r.timestamp > head.timestamp) {
            tracing::warn!(
                head = head.timestamp,
                pending = record.timestamp,
                "Cached head behind newest record, repairing"
            );
            head = record.head();
            self.head.store(&head)?;
        } else if !is_backed(&head, &self.records)? {
            return Ok(TickOutcome::Skipped(SkipReason::OrphanedHead {
                head_timestamp: head.timestamp,
            }));
        }

        if boundary <= head.timestamp {
            return Ok(TickOutcome::Skipped(SkipReason::NotAdvanced {
                boundary,
                head_timestamp: head.timestamp,
            }));
        }

        let link = head.seed.next_link();

        let filled = match pending {
            Some(mut record) => {
                record.identifier = Some(link.identifier);
                self.records.update_identifier(&record)?;
                true
            },
            None => false,
        };

        let record = ChainRecord::pending(boundary, link.seed);
        self.records.insert(&record)?;
        self.head.store(&record.head())?;

        Ok(TickOutcome::Rotated { timestamp: boundary, filled })
    }

    /// Rotation clock.
    pub fn clock(&self) -> RotationClock {
        self.clock
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

/// Drives [`Rotator::rotate`] on every boundary.
pub struct RotationScheduler<E, R, P> {
    rotator: Rotator<E, R, P>,
    worker: Option<Worker>,
}

impl<E, R, P> RotationScheduler<E, R, P>
where
    E: Environment,
    R: RecordStore,
    P: PreferenceStore,
{
    /// Idle scheduler around `rotator`.
    pub fn new(rotator: Rotator<E, R, P>) -> Self {
        Self { rotator, worker: None }
    }

    /// Current state.
    ///
    /// A worker that exited on its own (it panicked) counts as idle.
    pub fn state(&self) -> SchedulerState {
        match &self.worker {
            Some(worker) if !worker.handle.is_finished() => SchedulerState::Scheduled,
            _ => SchedulerState::Idle,
        }
    }

    /// Start firing on absolute boundaries of the rotation period.
    ///
    /// The first firing lands `period - (now mod period)` from now. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self) -> Transition {
        if self.state() == SchedulerState::Scheduled {
            tracing::warn!("Rotation start requested while already scheduled");
            return Transition::Unchanged(SchedulerState::Scheduled);
        }

        let (stop, stopped) = oneshot::channel();
        let handle = tokio::spawn(run_worker(self.rotator.clone(), stopped));
        self.worker = Some(Worker { handle, stop });

        tracing::info!(period_ms = self.rotator.clock.period_millis(), "Rotation scheduled");
        Transition::Changed(SchedulerState::Scheduled)
    }

    /// Stop future firings, aborting one in flight.
    pub fn cancel(&mut self) -> Transition {
        let Some(worker) = self.take_live_worker("cancel") else {
            return Transition::Unchanged(SchedulerState::Idle);
        };

        worker.handle.abort();
        tracing::info!("Rotation cancelled");
        Transition::Changed(SchedulerState::Idle)
    }

    /// Stop future firings and wait until none is in flight.
    ///
    /// Returns only once the worker task has exited, so every write it made
    /// happens before anything the caller does next.
    pub async fn cancel_and_wait(&mut self) -> Transition {
        let Some(worker) = self.take_live_worker("blocking cancel") else {
            return Transition::Unchanged(SchedulerState::Idle);
        };

        // A send error means the worker already dropped its receiver
        let _ = worker.stop.send(());
        if let Err(e) = worker.handle.await {
            tracing::error!(error = %e, "Rotation worker ended abnormally");
        }

        tracing::info!("Rotation stopped and quiescent");
        Transition::Changed(SchedulerState::Idle)
    }

    fn take_live_worker(&mut self, operation: &'static str) -> Option<Worker> {
        match self.worker.take() {
            Some(worker) if !worker.handle.is_finished() => Some(worker),
            _ => {
                tracing::warn!("Rotation {operation} requested while idle");
                None
            },
        }
    }
}

async fn run_worker<E, R, P>(rotator: Rotator<E, R, P>, mut stopped: oneshot::Receiver<()>)
where
    E: Environment,
    R: RecordStore,
    P: PreferenceStore,
{
    loop {
        let delay = rotator.clock.delay_to_next_boundary(rotator.env.wall_clock_millis());

        tokio::select! {
            biased;
            _ = &mut stopped => break,
            () = rotator.env.sleep(delay) => {},
        }

        match rotator.rotate() {
            Ok(TickOutcome::Rotated { timestamp, filled }) => {
                tracing::debug!(timestamp, filled, "Rotated");
            },
            Ok(TickOutcome::Skipped(reason)) => {
                tracing::warn!(?reason, "Rotation skipped");
            },
            Err(e) => {
                tracing::warn!(error = %e, "Rotation failed, retrying at next boundary");
            },
        }
    }
}
