use std::time::{Duration, Instant};

use miscale_core::{StabilityCfg, StabilityDetector, StabilityResult};
use miscale_traits::clock::test_clock::TestClock;
use proptest::prelude::*;
use rstest::rstest;

fn cfg(n: usize, tol: f64, ms: u64) -> StabilityCfg {
    StabilityCfg {
        required_readings: n,
        weight_tolerance_kg: tol,
        min_stable_ms: ms,
    }
}

#[test]
fn single_drift_restarts_the_duration_requirement() {
    let clock = TestClock::new();
    let mut d = StabilityDetector::new(cfg(3, 0.1, 3_000));

    assert_eq!(d.ingest(70.0, clock.at_secs(0.0)), StabilityResult::NotEnoughData);
    assert_eq!(d.ingest(70.05, clock.at_secs(0.0)), StabilityResult::NotEnoughData);
    assert_eq!(d.ingest(70.02, clock.at_secs(0.0)), StabilityResult::JustStabilized);

    assert!(matches!(
        d.ingest(75.0, clock.at_secs(1.0)),
        StabilityResult::WeightDrifting(_)
    ));
    assert_eq!(d.stable_for(clock.at_secs(1.0)), None);
    assert!(matches!(
        d.ingest(70.0, clock.at_secs(2.0)),
        StabilityResult::WeightDrifting(_)
    ));
    assert!(matches!(
        d.ingest(70.0, clock.at_secs(3.0)),
        StabilityResult::WeightDrifting(_)
    ));
    // 75.0 leaves the window here; the clock starts over.
    assert_eq!(d.ingest(70.0, clock.at_secs(4.0)), StabilityResult::JustStabilized);
    assert_eq!(
        d.ingest(70.0, clock.at_secs(5.0)),
        StabilityResult::Stabilizing(Duration::from_secs(1))
    );
    assert_eq!(
        d.ingest(70.0, clock.at_secs(6.0)),
        StabilityResult::Stabilizing(Duration::from_secs(2))
    );
    assert_eq!(d.ingest(70.0, clock.at_secs(7.0)), StabilityResult::Stable(70.0));
    assert_eq!(d.ingest(70.0, clock.at_secs(8.0)), StabilityResult::AlreadyStable);
}

#[rstest]
#[case(70.0, 70.1, true)] // spread == tolerance: inclusive
#[case(70.0, 70.105, false)]
#[case(80.0, 80.095, true)]
#[case(100.0, 99.9, true)]
#[case(50.2, 50.3, true)] // f64 spread lands a few ulps above 0.1
#[case(70.0, 70.1004, false)] // sub-gram excess still drifts
fn tolerance_boundary_is_inclusive(#[case] a: f64, #[case] b: f64, #[case] within: bool) {
    let t0 = Instant::now();
    let mut d = StabilityDetector::new(cfg(2, 0.1, 0));
    d.ingest(a, t0);
    let r = d.ingest(b, t0);
    if within {
        assert_eq!(r, StabilityResult::JustStabilized);
    } else {
        assert!(matches!(r, StabilityResult::WeightDrifting(_)), "{r:?}");
    }
}

#[rstest]
#[case(0.0995, 70.1, false)]
#[case(0.0995, 70.099, true)]
#[case(0.0995, 70.0995, true)]
#[case(0.1005, 70.1005, true)]
#[case(0.1005, 70.101, false)]
fn fractional_gram_tolerance_is_honoured(
    #[case] tol: f64,
    #[case] second: f64,
    #[case] within: bool,
) {
    let t0 = Instant::now();
    let mut d = StabilityDetector::new(cfg(2, tol, 0));
    d.ingest(70.0, t0);
    let r = d.ingest(second, t0);
    if within {
        assert_eq!(r, StabilityResult::JustStabilized);
    } else {
        assert!(matches!(r, StabilityResult::WeightDrifting(_)), "{r:?}");
    }
}

#[test]
fn drifting_reports_spread_in_kg() {
    let t0 = Instant::now();
    let mut d = StabilityDetector::new(cfg(2, 0.1, 0));
    d.ingest(70.0, t0);
    match d.ingest(70.5, t0) {
        StabilityResult::WeightDrifting(s) => assert!((s - 0.5).abs() < 1e-9),
        other => panic!("expected drift, got {other:?}"),
    }
}

#[test]
fn zero_duration_finalizes_on_the_sample_after_convergence() {
    let t0 = Instant::now();
    let mut d = StabilityDetector::new(cfg(2, 0.1, 0));
    d.ingest(70.0, t0);
    assert_eq!(d.ingest(70.0, t0), StabilityResult::JustStabilized);
    assert_eq!(d.ingest(70.0, t0), StabilityResult::Stable(70.0));
}

#[test]
fn stable_reports_the_latest_weight() {
    let t0 = Instant::now();
    let mut d = StabilityDetector::new(cfg(3, 0.1, 1_000));
    for (i, w) in [70.0, 70.05, 70.02].into_iter().enumerate() {
        d.ingest(w, t0 + Duration::from_millis(i as u64));
    }
    assert_eq!(
        d.ingest(70.04, t0 + Duration::from_secs(2)),
        StabilityResult::Stable(70.04)
    );
}

#[test]
fn accessors_track_window_state() {
    let t0 = Instant::now();
    let mut d = StabilityDetector::new(cfg(3, 0.1, 3_000));
    assert_eq!(d.required(), 3);
    assert_eq!(d.spread_kg(), None);
    d.ingest(70.0, t0);
    d.ingest(70.05, t0 + Duration::from_secs(1));
    assert_eq!(d.filled(), 2);
    d.ingest(70.02, t0 + Duration::from_secs(2));
    let spread = d.spread_kg().expect("window full");
    assert!((spread - 0.05).abs() < 1e-9, "{spread}");
    assert_eq!(d.window_span(), Duration::from_secs(2));
    assert_eq!(
        d.stable_for(t0 + Duration::from_secs(3)),
        Some(Duration::from_secs(1))
    );
    assert!(!d.is_final());
}

proptest! {
    #[test]
    fn never_stable_when_every_window_drifts(
        n in 2usize..10,
        tol_g in 0u32..500,
        excess_g in 1u32..2_000,
        base in 20.0f64..200.0,
        len in 0usize..200,
    ) {
        let tol = f64::from(tol_g) / 1000.0;
        let delta = f64::from(tol_g + excess_g) / 1000.0;
        let t0 = Instant::now();
        let mut d = StabilityDetector::new(cfg(n, tol, 0));
        for i in 0..len {
            let w = if i % 2 == 0 { base } else { base + delta };
            let r = d.ingest(w, t0 + Duration::from_millis(i as u64 * 100));
            prop_assert!(!r.is_final());
            prop_assert!(
                matches!(r, StabilityResult::NotEnoughData | StabilityResult::WeightDrifting(_)),
                "unexpected {:?}", r
            );
        }
    }

    #[test]
    fn stable_is_returned_exactly_once(
        n in 1usize..10,
        min_ms in 0u64..5_000,
        step_ms in 1u64..500,
        jitter in proptest::collection::vec(0u32..=100, 1..64),
        extra in 1usize..20,
    ) {
        let t0 = Instant::now();
        let mut d = StabilityDetector::new(cfg(n, 0.1, min_ms));
        let needed = n + (min_ms / step_ms) as usize + 1;
        let total = needed + extra;
        let mut finals = 0;
        let mut after = Vec::new();
        for i in 0..total {
            let j = jitter[i % jitter.len()];
            let w = 70.0 + f64::from(j) / 1000.0;
            let r = d.ingest(w, t0 + Duration::from_millis(i as u64 * step_ms));
            if finals > 0 {
                after.push(r);
            }
            if r.is_final() {
                finals += 1;
            }
        }
        prop_assert_eq!(finals, 1);
        prop_assert!(after.iter().all(|r| *r == StabilityResult::AlreadyStable));
    }
}
