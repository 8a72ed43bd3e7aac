//! Record generators.
//!
//! Proptest strategies for property tests, and seeded `rand` workloads for
//! tests that need a reproducible stream of records too long to shrink.

use crate::fixtures::{test_record, TEST_RECORD_TYPE};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use segwal_core::WalRecord;

/// Returns a seeded RNG.
///
/// Print the seed in assertion messages so a failure can be replayed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generates a test record with a random payload of `1..=max_payload` bytes.
pub fn random_record(rng: &mut impl Rng, max_payload: usize) -> WalRecord {
    let len = rng.gen_range(1..=max_payload.max(1));
    let mut payload = vec![0u8; len];
    rng.fill(&mut payload[..]);
    test_record(payload)
}

/// A reproducible stream of random test records.
#[derive(Debug, Clone, Copy)]
pub struct RecordWorkload {
    /// RNG seed.
    pub seed: u64,
    /// Number of records.
    pub count: usize,
    /// Largest payload size.
    pub max_payload: usize,
}

impl RecordWorkload {
    /// Creates a workload.
    pub fn new(seed: u64, count: usize, max_payload: usize) -> Self {
        Self {
            seed,
            count,
            max_payload,
        }
    }

    /// Materializes the records.
    pub fn records(&self) -> Vec<WalRecord> {
        let mut rng = seeded_rng(self.seed);
        (0..self.count)
            .map(|_| random_record(&mut rng, self.max_payload))
            .collect()
    }
}

/// Strategy for payloads of `0..max` bytes.
pub fn payload_strategy(max: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..max)
}

/// Strategy for test records with payloads of `0..max` bytes.
pub fn record_strategy(max: usize) -> impl Strategy<Value = WalRecord> {
    payload_strategy(max).prop_map(|payload| WalRecord::data(TEST_RECORD_TYPE, payload))
}

/// Strategy for record batches, empty records mixed in.
pub fn record_batch_strategy(max_payload: usize, max_len: usize) -> impl Strategy<Value = Vec<WalRecord>> {
    prop::collection::vec(
        prop_oneof![
            1 => Just(WalRecord::Empty),
            9 => record_strategy(max_payload),
        ],
        1..max_len,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_is_reproducible() {
        let workload = RecordWorkload::new(42, 50, 300);
        assert_eq!(workload.records(), workload.records());
        assert_ne!(
            workload.records(),
            RecordWorkload::new(43, 50, 300).records()
        );
    }

    #[test]
    fn test_random_record_sizes() {
        let mut rng = seeded_rng(7);
        for _ in 0..200 {
            let record = random_record(&mut rng, 100);
            let len = record.payload().len();
            assert!((1..=100).contains(&len));
            assert_eq!(record.record_type(), TEST_RECORD_TYPE);
        }
    }

    proptest! {
        #[test]
        fn test_record_strategy_uses_test_type(record in record_strategy(64)) {
            prop_assert_eq!(record.record_type(), TEST_RECORD_TYPE);
            prop_assert!(record.payload().len() < 64);
        }
    }
}
