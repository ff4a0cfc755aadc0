//! Window spread and the inclusive tolerance test.
//!
//! Weights stay exact `f64` kilograms. Two readings exactly one tolerance
//! apart can subtract to a few ulps above it (`50.3 - 50.2` is
//! `0.10000000000000142`), so the boundary allows [`BOUNDARY_EPS_KG`] of slack.
//! That is far below the scale's 5 g resolution; any real excess still drifts.

/// Slack applied only at the tolerance boundary (one microgram).
pub const BOUNDARY_EPS_KG: f64 = 1e-9;

/// `max - min` of the readings; 0 for an empty set. Non-finite readings
/// make the spread infinite so the window can never pass.
pub fn spread_kg(values: impl Iterator<Item = f64>) -> f64 {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut any = false;
    for v in values {
        if !v.is_finite() {
            return f64::INFINITY;
        }
        lo = lo.min(v);
        hi = hi.max(v);
        any = true;
    }
    if any { hi - lo } else { 0.0 }
}

/// True when `spread` is over `tolerance` by more than floating-point noise.
#[inline]
pub fn exceeds(spread_kg: f64, tolerance_kg: f64) -> bool {
    spread_kg > tolerance_kg + BOUNDARY_EPS_KG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_of_window() {
        assert_eq!(spread_kg([70.0, 70.05, 70.02].into_iter()), 70.05 - 70.0);
        assert_eq!(spread_kg(std::iter::empty()), 0.0);
        assert_eq!(spread_kg([70.0, f64::NAN].into_iter()), f64::INFINITY);
    }

    #[test]
    fn boundary_absorbs_rounding_only() {
        assert!(!exceeds(50.3 - 50.2, 0.1));
        assert!(!exceeds(70.1 - 70.0, 0.1));
        assert!(exceeds(70.1004 - 70.0, 0.1));
        assert!(exceeds(70.1 - 70.0, 0.0995));
        assert!(exceeds(f64::INFINITY, 10.0));
    }
}
