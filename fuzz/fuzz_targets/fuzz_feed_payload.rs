// Fuzz target exploring feed callback decoding under arbitrary input.
#![no_main]

use evac_protocol::feed::{parse_feed, sanitize_nan};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let cleaned = sanitize_nan(data);
    if std::str::from_utf8(data).is_ok() {
        assert!(std::str::from_utf8(&cleaned).is_ok());
    }
    if serde_json::from_slice::<serde_json::Value>(data).is_ok() {
        // Valid JSON never contains bare NaN tokens, so nothing changes.
        assert_eq!(&cleaned[..], data);
    }

    match parse_feed(data) {
        Ok(payload) => {
            assert!(!payload.data.network_id.trim().is_empty());
            for observation in &payload.data.observations {
                if let Some((lat, lng)) = observation.latest_fix().and_then(|fix| fix.coordinates()) {
                    assert!(lat.is_finite() && lng.is_finite());
                }
            }
        }
        Err(err) => {
            let _ = err.expected_shape();
        }
    }
});
