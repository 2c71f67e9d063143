//! Owned runtime state for one device.
//!
//! `BeaconManager` is built once at startup and passed by reference. It holds
//! the scheduler and the cipher as fields, so there are no process-wide
//! handles to reach for.

use std::sync::Arc;

use beacon_core::{ChainConfig, ChainHead, ChainRecord, Environment, RotationClock};
use beacon_crypto::{AtRestCipher, Identifier, SecureKeyStore, StrategyKind};

use crate::{
    error::BeaconError,
    head::{HeadCache, is_backed},
    report::{ExposureReportHandler, RegeneratedChain},
    scheduler::{RotationScheduler, Rotator, SchedulerState, Transition},
    storage::{PreferenceStore, RecordStore},
};

/// What [`BeaconManager::bootstrap`] found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// First run: a random seed was drawn and the first record written.
    Created {
        /// Timestamp of the first record
        timestamp: u64,
    },
    /// A readable head already existed; nothing was written.
    Existing {
        /// Timestamp of the cached head
        timestamp: u64,
    },
    /// The head was missing or unreadable and was rebuilt from the newest
    /// record.
    Repaired {
        /// Timestamp of the rebuilt head
        timestamp: u64,
    },
}

/// Device-wide owner of configuration, stores, scheduler and cipher.
pub struct BeaconManager<E, R, P> {
    config: ChainConfig,
    clock: RotationClock,
    env: E,
    records: R,
    head: HeadCache<P>,
    cipher: Arc<AtRestCipher>,
    scheduler: RotationScheduler<E, R, P>,
    reports: ExposureReportHandler<E, R, P>,
}

impl<E, R, P> BeaconManager<E, R, P>
where
    E: Environment,
    R: RecordStore,
    P: PreferenceStore,
{
    /// Validate `config`, select and initialize the at-rest cipher, and wire
    /// up an idle scheduler.
    ///
    /// The cipher strategy is chosen here from `key_store`'s capabilities and
    /// kept for the lifetime of the manager.
    ///
    /// # Errors
    ///
    /// - `Config`: `config` failed validation
    /// - `CryptoProviderFailure`: key generation failed
    pub fn new<K>(
        config: ChainConfig,
        env: E,
        records: R,
        prefs: P,
        key_store: K,
    ) -> Result<Self, BeaconError>
    where
        K: SecureKeyStore + 'static,
    {
        config.validate()?;
        let clock = config.clock()?;

        let cipher = AtRestCipher::select(key_store);
        cipher.init()?;
        tracing::info!(strategy = ?cipher.strategy_kind(), "At-rest cipher ready");
        let cipher = Arc::new(cipher);

        let head = HeadCache::new(prefs, Arc::clone(&cipher));
        let rotator = Rotator::new(env.clone(), records.clone(), head.clone(), clock);
        let reports =
            ExposureReportHandler::new(env.clone(), records.clone(), head.clone(), clock, &config);

        Ok(Self {
            config,
            clock,
            env,
            records,
            head,
            cipher,
            scheduler: RotationScheduler::new(rotator),
            reports,
        })
    }

    /// Make sure a chain exists. Safe to call on every start.
    ///
    /// With a readable head backed by its record this writes nothing. Without
    /// a head, the head is rebuilt from the newest record if any exist; a
    /// head sealed under a key the store no longer holds is treated the same
    /// way. Only an empty store with no head at all gets a fresh random seed,
    /// recorded as a pending record at the current boundary.
    ///
    /// # Errors
    ///
    /// `InterruptedReport` when a head exists but its record does not. A
    /// report wiped the chain and failed before finishing, so neither the old
    /// chain nor a fresh one may be used; run
    /// [`trigger_report`](Self::trigger_report) again.
    pub fn bootstrap(&self) -> Result<Bootstrap, BeaconError> {
        let mut head_unreadable = false;
        match self.head.load() {
            Ok(Some(head)) => {
                if is_backed(&head, &self.records)? {
                    return Ok(Bootstrap::Existing { timestamp: head.timestamp });
                }
                tracing::error!(head = head.timestamp, "Cached head has no record");
                return Err(BeaconError::InterruptedReport {
                    head_timestamp: Some(head.timestamp),
                });
            },
            Ok(None) => {},
            Err(BeaconError::CryptoProviderFailure(e)) => {
                tracing::warn!(error = %e, "Cached head unreadable, rebuilding from records");
                head_unreadable = true;
            },
            Err(e) => return Err(e),
        }

        let newest = self.records.all_sorted_records()?.pop();
        if head_unreadable && newest.is_none() {
            // Bootstrap writes a record before the head, so a head over an
            // empty store can only come from a wipe
            return Err(BeaconError::InterruptedReport { head_timestamp: None });
        }

        if let Some(newest) = newest {
            self.head.store(&newest.head())?;
            tracing::info!(timestamp = newest.timestamp, "Chain head rebuilt from records");
            return Ok(Bootstrap::Repaired { timestamp: newest.timestamp });
        }

        let timestamp = self.clock.align_previous_boundary(self.env.wall_clock_millis());
        let record = ChainRecord::pending(timestamp, self.env.random_seed());
        self.records.insert(&record)?;
        self.head.store(&record.head())?;

        tracing::info!(timestamp, "Chain bootstrapped");
        Ok(Bootstrap::Created { timestamp })
    }

    /// Start periodic rotation.
    pub fn start_rotation(&mut self) -> Transition {
        self.scheduler.start()
    }

    /// Stop periodic rotation, aborting a firing in flight.
    pub fn cancel_rotation(&mut self) -> Transition {
        self.scheduler.cancel()
    }

    /// Stop periodic rotation and wait for the worker to exit.
    pub async fn shutdown(&mut self) -> Transition {
        self.scheduler.cancel_and_wait().await
    }

    /// Scheduler state.
    pub fn rotation_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Run the exposure-report regeneration protocol.
    ///
    /// Do not confirm a report to the user unless this returns `Ok`. On error
    /// rotation is left stopped; retry the whole call.
    pub async fn trigger_report(&mut self) -> Result<RegeneratedChain, BeaconError> {
        self.reports.trigger_report(&mut self.scheduler).await
    }

    /// Identifiers of the current disclosure window, oldest first.
    ///
    /// Covers records newer than `aligned_now - disclosure_window` whose
    /// identifier is known. The pending record is never included.
    pub fn disclosure_identifiers(&self) -> Result<Vec<Identifier>, BeaconError> {
        let aligned_now = self.clock.align_previous_boundary(self.env.wall_clock_millis());
        let window_start = aligned_now.saturating_sub(self.config.window_millis());

        Ok(self
            .records
            .all_sorted_records()?
            .into_iter()
            .filter(|record| record.timestamp > window_start)
            .filter_map(|record| record.identifier)
            .collect())
    }

    /// Cached chain head.
    pub fn head(&self) -> Result<Option<ChainHead>, BeaconError> {
        self.head.load()
    }

    /// Every stored record, oldest first.
    pub fn records(&self) -> Result<Vec<ChainRecord>, BeaconError> {
        Ok(self.records.all_sorted_records()?)
    }

    /// The at-rest cipher, for sealing other cached secrets.
    pub fn cipher(&self) -> &AtRestCipher {
        &self.cipher
    }

    /// Which cipher strategy was selected at construction.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.cipher.strategy_kind()
    }

    /// Active configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}
