#![no_main]

//! Fuzz target for the four-tier analytics parser.
//!
//! The parser's contract is that it never fails for any input; this
//! target hunts for inputs that panic a tier or make the tolerant
//! converter emit text that is not strict JSON.

use libfuzzer_sys::fuzz_target;
use voxlead_ingest::{analytics, tolerant};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // Never panics, never errors; the worst input degrades to tier 4.
    let parsed = analytics::parse(input);

    // Capping must hold for any turn count the payload could imply.
    for turns in [0usize, 2, 3, 100] {
        let mut capped = parsed.clone();
        capped.apply_engagement_cap(turns);
    }

    // Whatever the converter accepts, its output must be strict JSON.
    if let Some(repaired) = tolerant::repair_to_json(input) {
        serde_json::from_str::<serde_json::Value>(&repaired)
            .expect("tolerant converter emitted invalid JSON");
    }
});
