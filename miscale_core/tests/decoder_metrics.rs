use std::time::Instant;

use miscale_core::metrics::{bmi, bmr, body_fat_percentage};
use miscale_core::{BodyMetrics, Gender, ScaleError, UserProfile, decode, encode};
use rstest::rstest;

#[test]
fn encode_then_decode_reproduces_known_values() {
    let raw = encode(70.0, 500);
    assert_eq!(raw.len(), 13);
    let s = decode(&raw, Instant::now()).expect("decode");
    assert_eq!(s.weight_kg, 70.0);
    assert_eq!(s.impedance, 500);
}

#[rstest]
#[case(70.003)]
#[case(0.0)]
#[case(150.4321)]
fn weight_quantization_is_within_one_count(#[case] w: f64) {
    let s = decode(&encode(w, 0), Instant::now()).expect("decode");
    assert!((s.weight_kg - w).abs() <= 1.0 / 200.0);
}

#[cfg(feature = "hardware-errors")]
#[rstest]
#[case(70.0, 500)]
#[case(58.735, 431)]
#[case(199.995, 0)]
fn simulated_frames_decode_to_what_was_sent(#[case] w: f64, #[case] imp: u16) {
    let wire = miscale_hardware::frame(w, imp);
    assert_eq!(wire, encode(w, imp).to_vec());
    let s = decode(&wire, Instant::now()).expect("decode");
    assert!((s.weight_kg - w).abs() <= 1.0 / 200.0);
    assert_eq!(s.impedance, imp);
}

#[test]
fn trailing_bytes_are_ignored() {
    let mut raw = encode(82.5, 612).to_vec();
    raw.extend_from_slice(&[0xFF; 7]);
    let s = decode(&raw, Instant::now()).expect("decode");
    assert_eq!((s.weight_kg, s.impedance), (82.5, 612));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(12)]
fn short_payloads_are_malformed(#[case] len: usize) {
    let raw = vec![0u8; len];
    assert_eq!(
        decode(&raw, Instant::now()),
        Err(ScaleError::MalformedPayload { len, min: 13 })
    );
}

#[test]
fn metrics_for_reference_male() {
    let p = UserProfile::new(30, 178.0, Gender::Male).expect("profile");
    let m = BodyMetrics::compute(70.0, &p);
    assert!((m.bmi - 22.093).abs() < 0.01, "bmi {}", m.bmi);
    assert!((m.bmr - 1667.5).abs() < 0.01, "bmr {}", m.bmr);
    assert!(
        (m.body_fat_percentage - 17.21).abs() < 0.01,
        "body fat {}",
        m.body_fat_percentage
    );
}

#[test]
fn female_offsets() {
    let male = bmr(60.0, 165.0, 40, Gender::Male);
    let female = bmr(60.0, 165.0, 40, Gender::Female);
    assert!((male - female - 166.0).abs() < 1e-9);
    let b = bmi(60.0, 165.0);
    let d = body_fat_percentage(b, 40, Gender::Female) - body_fat_percentage(b, 40, Gender::Male);
    assert!((d - 10.8).abs() < 1e-9);
}

#[test]
fn metrics_are_deterministic() {
    let p = UserProfile::new(45, 160.0, Gender::Female).expect("profile");
    assert_eq!(BodyMetrics::compute(55.5, &p), BodyMetrics::compute(55.5, &p));
}
