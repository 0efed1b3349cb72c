#![no_main]

use libfuzzer_sys::fuzz_target;

use kiket_sdk::auth::{compute_signature, verify_signature_at, VerificationOutcome};

const SECRET: &str = "fuzz-secret";
const NOW: i64 = 1_700_000_000;

// Input layout: <signature>\n<timestamp>\n<body bytes...>
fuzz_target!(|data: &[u8]| {
    let mut parts = data.splitn(3, |b| *b == b'\n');
    let signature = parts.next().and_then(|s| std::str::from_utf8(s).ok());
    let timestamp = parts.next().and_then(|s| std::str::from_utf8(s).ok());
    let body = parts.next().unwrap_or_default();

    // Arbitrary headers must never panic, whatever they contain.
    let outcome = verify_signature_at(Some(SECRET), signature, timestamp, body, NOW);

    if let (Some(sig), Some(ts)) = (signature, timestamp) {
        if outcome == VerificationOutcome::Valid {
            assert_eq!(compute_signature(SECRET, ts, body).as_deref(), Some(sig));
        }
    }

    // A body signed with the current timestamp always verifies.
    let ts = NOW.to_string();
    let sig = compute_signature(SECRET, &ts, body).unwrap();
    assert_eq!(
        verify_signature_at(Some(SECRET), Some(&sig), Some(&ts), body, NOW),
        VerificationOutcome::Valid
    );
});
