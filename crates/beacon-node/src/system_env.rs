//! Production Environment implementation using the system clock and RNG.
//!
//! `SystemEnv` reads the real wall clock, sleeps on tokio timers and draws
//! randomness from the OS. Production behavior is therefore
//! non-deterministic; tests substitute a paused-clock environment.

use std::time::Duration;

use beacon_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Every seed the
/// device ever holds comes from here.
///
/// # Panics
///
/// Panics if the OS RNG fails. A device that cannot draw a fresh seed must not
/// fall back to a predictable one, and RNG failure indicates OS-level issues.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot draw a secret seed");
    }
}
