//! Fuzz target for persisted record decoding
//!
//! Feeds arbitrary bytes through the CBOR decoder and the conversion back
//! into a `ChainRecord`, the path every record read from disk takes.
//!
//! # Invariants
//!
//! - Malformed CBOR or malformed seed text is an error, NEVER a panic
//! - A record that converts survives a second store/load cycle unchanged

#![no_main]

use beacon_core::ChainRecord;
use beacon_node::StoredRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(stored) = ciborium::from_reader::<StoredRecord, _>(data) else {
        return;
    };
    let Ok(record) = ChainRecord::try_from(stored) else {
        return;
    };

    let again = ChainRecord::try_from(StoredRecord::from(&record))
        .expect("a converted record must convert again");
    assert_eq!(again, record);
});
