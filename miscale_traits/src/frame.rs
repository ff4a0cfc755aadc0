//! Wire layout of a body composition notification, shared by the decoder and
//! the simulated transport.
//!
//! Little-endian, 13 bytes minimum:
//!
//! | bytes  | field                         |
//! |--------|-------------------------------|
//! | 0..2   | control flags                 |
//! | 2..9   | timestamp (ignored)           |
//! | 9..11  | impedance, ohms               |
//! | 11..13 | weight, units of 1/200 kg     |

pub const MIN_PAYLOAD_LEN: usize = 13;
pub const IMPEDANCE_OFFSET: usize = 9;
pub const WEIGHT_OFFSET: usize = 11;
/// Raw weight counts per kilogram.
pub const WEIGHT_DIVISOR: f64 = 200.0;
/// Control byte 1, bit 1: impedance field is populated.
pub const IMPEDANCE_PRESENT: u8 = 0x02;

/// Encode a weight/impedance pair into a minimum-length frame.
/// Weight is rounded to the nearest 1/200 kg and clamped to the field range.
pub fn encode(weight_kg: f64, impedance: u16) -> [u8; MIN_PAYLOAD_LEN] {
    let mut buf = [0u8; MIN_PAYLOAD_LEN];
    buf[1] = IMPEDANCE_PRESENT;
    let counts = (weight_kg * WEIGHT_DIVISOR)
        .round()
        .clamp(0.0, f64::from(u16::MAX)) as u16;
    buf[IMPEDANCE_OFFSET..IMPEDANCE_OFFSET + 2].copy_from_slice(&impedance.to_le_bytes());
    buf[WEIGHT_OFFSET..WEIGHT_OFFSET + 2].copy_from_slice(&counts.to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_land_at_their_offsets() {
        let f = encode(70.0, 500);
        assert_eq!(f[1], IMPEDANCE_PRESENT);
        assert_eq!(&f[IMPEDANCE_OFFSET..IMPEDANCE_OFFSET + 2], &500u16.to_le_bytes());
        assert_eq!(&f[WEIGHT_OFFSET..WEIGHT_OFFSET + 2], &14_000u16.to_le_bytes());
    }
}
