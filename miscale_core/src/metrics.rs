//! Derived body metrics. Pure functions; inputs are validated upstream.

use serde::{Deserialize, Serialize};

use crate::profile::{Gender, UserProfile};

/// Body mass index: kg / m².
#[inline]
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    weight_kg / (height_m * height_m)
}

/// Basal metabolic rate (kcal/day), Mifflin-St Jeor.
#[inline]
pub fn bmr(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    match gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    }
}

/// Body fat percentage estimated from BMI (Deurenberg).
///
/// The impedance reported by the scale is not used; this is a population estimate.
#[inline]
pub fn body_fat_percentage(bmi: f64, age: u32, gender: Gender) -> f64 {
    let base = 1.20 * bmi + 0.23 * f64::from(age);
    match gender {
        Gender::Male => base - 16.2,
        Gender::Female => base - 5.4,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyMetrics {
    pub bmi: f64,
    pub bmr: f64,
    pub body_fat_percentage: f64,
}

impl BodyMetrics {
    pub fn compute(weight_kg: f64, profile: &UserProfile) -> Self {
        let bmi = bmi(weight_kg, profile.height_cm);
        Self {
            bmi,
            bmr: bmr(weight_kg, profile.height_cm, profile.age, profile.gender),
            body_fat_percentage: body_fat_percentage(bmi, profile.age, profile.gender),
        }
    }
}
