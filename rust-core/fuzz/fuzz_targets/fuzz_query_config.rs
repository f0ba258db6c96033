// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for query configuration parsing.
// Run with: cargo +nightly fuzz run fuzz_query_config
//
// Arbitrary text must either parse into a valid configuration or be
// rejected with an error.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() <= 4096 {
            if let Ok(config) = factql_query::QueryConfig::from_json(input) {
                assert!(config.validate().is_ok());
            }
        }
    }
});
