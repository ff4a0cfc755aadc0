#![no_main]
use std::time::Instant;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match miscale_core::decode(data, Instant::now()) {
        Ok(s) => {
            assert!(data.len() >= 13);
            assert!(s.weight_kg >= 0.0 && s.weight_kg <= f64::from(u16::MAX) / 200.0);
        }
        Err(_) => assert!(data.len() < 13),
    }
});
