//! Shared fixtures for node integration tests.
//!
//! `SimEnv` reads wall-clock time off tokio's clock, so under
//! `#[tokio::test(start_paused = true)]` whole days of rotations run
//! instantly and in a fixed order.

#![allow(dead_code, clippy::disallowed_types)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use beacon_core::{ChainConfig, Environment};
use beacon_crypto::MemoryKeyStore;
use beacon_node::{BeaconManager, PreferenceStore, RecordStore};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// 2023-11-14T22:13:20Z, 800s past a 15-minute boundary.
pub const EPOCH_MS: u64 = 1_700_000_000_000;

pub const PERIOD_MS: u64 = 15 * 60 * 1000;

/// Simulated environment on tokio's (paused) clock with a seeded RNG.
#[derive(Clone)]
pub struct SimEnv {
    epoch_ms: u64,
    start: tokio::time::Instant,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Must be called inside the tokio runtime whose clock it reads.
    pub fn new(seed: u64) -> Self {
        Self::at(EPOCH_MS, seed)
    }

    pub fn at(epoch_ms: u64, seed: u64) -> Self {
        Self {
            epoch_ms,
            start: tokio::time::Instant::now(),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Sleep until the wall clock reads `target_ms`.
    pub async fn sleep_until(&self, target_ms: u64) {
        let now = self.wall_clock_millis();
        assert!(target_ms >= now, "cannot sleep into the past");
        tokio::time::sleep(Duration::from_millis(target_ms - now)).await;
    }

    /// Sleep until half a period after the `n`-th boundary from now.
    ///
    /// Landing mid-period keeps test wake-ups away from worker firings.
    pub async fn sleep_past_boundaries(&self, n: u64, period_ms: u64) {
        let now = self.wall_clock_millis();
        let next = now - now % period_ms + period_ms;
        self.sleep_until(next + (n - 1) * period_ms + period_ms / 2).await;
    }

    pub fn aligned_now(&self, period_ms: u64) -> u64 {
        let now = self.wall_clock_millis();
        now - now % period_ms
    }
}

impl Environment for SimEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.epoch_ms + self.start.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }
}

/// 15-minute period and a 1-day window: 96 records per window.
pub fn day_config() -> ChainConfig {
    ChainConfig {
        rotation_period: Duration::from_millis(PERIOD_MS),
        disclosure_window: Duration::from_secs(24 * 60 * 60),
    }
}

pub fn manager<R, P>(
    config: ChainConfig,
    env: &SimEnv,
    records: R,
    prefs: P,
) -> BeaconManager<SimEnv, R, P>
where
    R: RecordStore,
    P: PreferenceStore,
{
    BeaconManager::new(config, env.clone(), records, prefs, MemoryKeyStore::with_symmetric_support())
        .unwrap()
}
