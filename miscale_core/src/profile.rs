//! User profile needed for the derived body metrics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(ScaleError::InvalidProfile(format!(
                "gender must be male or female, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Male => "male",
            Self::Female => "female",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub height_cm: f64,
    pub gender: Gender,
}

impl UserProfile {
    /// Build and validate a profile.
    pub fn new(age: u32, height_cm: f64, gender: Gender) -> Result<Self, ScaleError> {
        let p = Self {
            age,
            height_cm,
            gender,
        };
        p.validate()?;
        Ok(p)
    }

    /// Parse a profile from loosely-typed input (CLI flags, config strings).
    pub fn parse(age: i64, height_cm: f64, gender: &str) -> Result<Self, ScaleError> {
        let age = u32::try_from(age)
            .map_err(|_| ScaleError::InvalidProfile(format!("age must be > 0, got {age}")))?;
        Self::new(age, height_cm, gender.parse()?)
    }

    pub fn validate(&self) -> Result<(), ScaleError> {
        if self.age == 0 {
            return Err(ScaleError::InvalidProfile("age must be > 0".into()));
        }
        if !(self.height_cm.is_finite() && self.height_cm > 0.0) {
            return Err(ScaleError::InvalidProfile(format!(
                "height_cm must be > 0, got {}",
                self.height_cm
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_parses_case_insensitively() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" FEMALE ".parse::<Gender>().unwrap(), Gender::Female);
        assert!(matches!(
            "other".parse::<Gender>(),
            Err(ScaleError::InvalidProfile(_))
        ));
    }

    #[test]
    fn rejects_non_positive_age_and_height() {
        assert!(UserProfile::parse(0, 178.0, "male").is_err());
        assert!(UserProfile::parse(-3, 178.0, "male").is_err());
        assert!(UserProfile::parse(30, 0.0, "male").is_err());
        assert!(UserProfile::parse(30, f64::NAN, "female").is_err());
        let p = UserProfile::parse(30, 178.0, "female").unwrap();
        assert_eq!(p.gender, Gender::Female);
    }
}
