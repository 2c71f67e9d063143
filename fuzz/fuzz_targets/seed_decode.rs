//! Fuzz target for seed and identifier text decoding
//!
//! # Invariants
//!
//! - Decoding NEVER panics on arbitrary input
//! - A seed that decodes re-encodes to a string that decodes to the same seed
//! - Any 16 bytes ratchet without error, and the next link is deterministic

#![no_main]

use beacon_crypto::{Identifier, Seed, derive_next};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(seed) = Seed::decode(text) {
            let again = Seed::decode(&seed.encode()).expect("encoded seed must decode");
            assert_eq!(again, seed);
        }
        let _ = text.parse::<Identifier>();
    }

    if let Ok(seed) = Seed::from_slice(data) {
        let first = derive_next(seed.as_bytes()).expect("16-byte seed must ratchet");
        let second = seed.next_link();
        assert_eq!(first, second);
    }
});
