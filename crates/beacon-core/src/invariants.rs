//! Structural checks over a sorted slice of chain records.
//!
//! Each check returns a [`Violation`] naming the broken property and the
//! offending position. The report handler runs [`check_chain`] over a freshly
//! regenerated window before it confirms success, and tests run the same
//! checks after every simulated rotation.

use beacon_crypto::derive_next;

use crate::ChainRecord;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl Violation {
    fn new(invariant: &'static str, message: String) -> Self {
        Self { invariant, message }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// Consecutive records differ by exactly `period_ms`.
///
/// Also rejects out-of-order or duplicate timestamps.
pub fn check_spacing(records: &[ChainRecord], period_ms: u64) -> InvariantResult {
    for (i, pair) in records.windows(2).enumerate() {
        let (earlier, later) = (pair[0].timestamp, pair[1].timestamp);
        if later <= earlier || later - earlier != period_ms {
            return Err(Violation::new(
                "Spacing",
                format!(
                    "records {i} and {} are {}ms apart, expected {period_ms}ms",
                    i + 1,
                    later as i128 - earlier as i128
                ),
            ));
        }
    }
    Ok(())
}

/// At most one record is pending, and only the newest.
pub fn check_pending(records: &[ChainRecord]) -> InvariantResult {
    let last = records.len().saturating_sub(1);
    match records.iter().position(ChainRecord::is_pending) {
        Some(i) if i != last => Err(Violation::new(
            "SinglePending",
            format!("record {i} is pending but is not the newest of {}", records.len()),
        )),
        _ => Ok(()),
    }
}

/// Each seed is the ratchet successor of the one before it.
pub fn check_ratchet(records: &[ChainRecord]) -> InvariantResult {
    for (i, pair) in records.windows(2).enumerate() {
        let expected = derive_next(pair[0].seed.as_bytes())
            .map_err(|e| Violation::new("Ratchet", format!("record {i}: {e}")))?;
        if expected.seed != pair[1].seed {
            return Err(Violation::new(
                "Ratchet",
                format!("seed of record {} does not follow from record {i}", i + 1),
            ));
        }
    }
    Ok(())
}

/// All structural checks for an uninterrupted chain.
pub fn check_chain(records: &[ChainRecord], period_ms: u64) -> InvariantResult {
    check_spacing(records, period_ms)?;
    check_pending(records)?;
    check_ratchet(records)
}
