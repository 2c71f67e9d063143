//! Exposure-report regeneration.
//!
//! Replaces the whole chain with a freshly seeded window ending at the current
//! boundary. The steps run strictly in order and never resume halfway: a
//! failure leaves the scheduler stopped, and the caller retries from the top.

use beacon_core::{ChainConfig, ChainRecord, Environment, RotationClock, Violation, check_chain};
use beacon_crypto::derive_chain;

use crate::{
    error::BeaconError,
    head::HeadCache,
    scheduler::RotationScheduler,
    storage::{PreferenceStore, RecordStore},
};

/// Summary of a successful regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegeneratedChain {
    /// Number of records written.
    pub records: usize,
    /// `aligned_now - disclosure_window`; the first record sits one period
    /// after it.
    pub window_start: u64,
    /// Timestamp of the last record and of the new head.
    pub head_timestamp: u64,
}

/// Runs the regeneration protocol against the stores.
#[derive(Clone)]
pub struct ExposureReportHandler<E, R, P> {
    env: E,
    records: R,
    head: HeadCache<P>,
    clock: RotationClock,
    window_ms: u64,
    window_records: usize,
}

impl<E, R, P> ExposureReportHandler<E, R, P>
where
    E: Environment,
    R: RecordStore,
    P: PreferenceStore,
{
    /// Handler for `config`, which must already be validated.
    pub fn new(
        env: E,
        records: R,
        head: HeadCache<P>,
        clock: RotationClock,
        config: &ChainConfig,
    ) -> Self {
        Self {
            env,
            records,
            head,
            clock,
            window_ms: config.window_millis(),
            window_records: config.records_per_window() as usize,
        }
    }

    /// Wipe the chain and rebuild a full disclosure window.
    ///
    /// 1. Blocking-cancel `scheduler`
    /// 2. Delete every record
    /// 3. Draw a fresh seed
    /// 4. `window_start = aligned_now - disclosure_window`
    /// 5. Derive N links, the i-th (1-based) at `window_start + i * period`
    /// 6. Insert them as one batch and read them back
    /// 7. Point the head at the last record
    /// 8. Restart `scheduler`
    ///
    /// # Errors
    ///
    /// - `StoreUnavailable`: the wipe, the batch insert, the read-back or the
    ///   head write failed
    /// - `CryptoProviderFailure`: the head could not be sealed
    /// - `RegenerationUnverified`: the read-back did not match what was
    ///   written
    ///
    /// On any error the scheduler stays stopped and the device has no valid
    /// current identifier until a retry succeeds.
    pub async fn trigger_report(
        &self,
        scheduler: &mut RotationScheduler<E, R, P>,
    ) -> Result<RegeneratedChain, BeaconError> {
        scheduler.cancel_and_wait().await;

        let result = self.regenerate();
        match &result {
            Ok(chain) => {
                scheduler.start();
                tracing::info!(
                    records = chain.records,
                    window_start = chain.window_start,
                    head = chain.head_timestamp,
                    "Exposure report regeneration complete"
                );
            },
            Err(e) => {
                tracing::error!(error = %e, "Exposure report regeneration failed, rotation stopped");
            },
        }
        result
    }

    /// Steps 2 to 7. Must only run while the scheduler is quiescent.
    fn regenerate(&self) -> Result<RegeneratedChain, BeaconError> {
        let deleted = self.records.delete_all()?;
        tracing::info!(deleted, "Chain wiped");

        let seed = self.env.random_seed();

        let aligned_now = self.clock.align_previous_boundary(self.env.wall_clock_millis());
        let window_start = aligned_now.saturating_sub(self.window_ms);
        let period = self.clock.period_millis();

        let batch: Vec<ChainRecord> = derive_chain(seed.as_bytes(), self.window_records)?
            .into_iter()
            .zip(1u64..)
            .map(|(link, i)| ChainRecord::from_link(window_start + i * period, link))
            .collect();

        self.records.insert_batch(&batch)?;
        self.verify(&batch)?;

        let last = batch.last().ok_or_else(|| {
            Violation {
                invariant: "Completeness",
                message: "disclosure window produced no records".to_string(),
            }
        })?;
        self.head.store(&last.head())?;

        Ok(RegeneratedChain {
            records: batch.len(),
            window_start,
            head_timestamp: last.timestamp,
        })
    }

    /// Read the store back and check it holds exactly `batch`.
    fn verify(&self, batch: &[ChainRecord]) -> Result<(), BeaconError> {
        let stored = self.records.all_sorted_records()?;
        if stored.as_slice() != batch {
            return Err(Violation {
                invariant: "Completeness",
                message: format!("wrote {} records, read back {}", batch.len(), stored.len()),
            }
            .into());
        }
        check_chain(&stored, self.clock.period_millis())?;
        Ok(())
    }
}
