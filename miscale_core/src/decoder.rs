//! Body composition measurement frame decoding.
//!
//! Field offsets live in [`miscale_traits::frame`] so the simulated scale
//! writes exactly what this module reads.

use std::time::Instant;

use crate::error::ScaleError;

pub use miscale_traits::frame::{
    IMPEDANCE_OFFSET, MIN_PAYLOAD_LEN, WEIGHT_DIVISOR, WEIGHT_OFFSET, encode,
};

/// One decoded notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub weight_kg: f64,
    pub impedance: u16,
    pub observed_at: Instant,
}

#[inline]
fn le_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

/// Decode a raw notification; bytes past the minimum length are ignored.
pub fn decode(raw: &[u8], observed_at: Instant) -> Result<Sample, ScaleError> {
    if raw.len() < MIN_PAYLOAD_LEN {
        return Err(ScaleError::MalformedPayload {
            len: raw.len(),
            min: MIN_PAYLOAD_LEN,
        });
    }
    Ok(Sample {
        weight_kg: f64::from(le_u16(raw, WEIGHT_OFFSET)) / WEIGHT_DIVISOR,
        impedance: le_u16(raw, IMPEDANCE_OFFSET),
        observed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_bytes() {
        // 0x36B0 = 14000 counts = 70.00 kg; 0x01F4 = 500 ohms
        let mut raw = [0u8; 13];
        raw[9] = 0xF4;
        raw[10] = 0x01;
        raw[11] = 0xB0;
        raw[12] = 0x36;
        let s = decode(&raw, Instant::now()).unwrap();
        assert_eq!(s.weight_kg, 70.0);
        assert_eq!(s.impedance, 500);
    }

    #[test]
    fn rejects_short_buffers() {
        let err = decode(&[0u8; 12], Instant::now()).unwrap_err();
        assert_eq!(err, ScaleError::MalformedPayload { len: 12, min: 13 });
        assert!(decode(&[], Instant::now()).is_err());
    }

    #[test]
    fn encode_clamps_out_of_range_weight() {
        let raw = encode(400.0, 0);
        assert_eq!(decode(&raw, Instant::now()).unwrap().weight_kg, 327.675);
        let raw = encode(-1.0, 0);
        assert_eq!(decode(&raw, Instant::now()).unwrap().weight_kg, 0.0);
    }
}
