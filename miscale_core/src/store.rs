//! Finalized measurements and the persistence seam.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::BodyMetrics;
use crate::profile::UserProfile;

/// A settled weigh-in with its derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedMeasurement {
    pub weight: f64,
    pub impedance: u16,
    pub bmi: f64,
    pub bmr: f64,
    pub body_fat_percentage: f64,
    pub timestamp: DateTime<Utc>,
}

impl FinalizedMeasurement {
    pub fn new(weight: f64, impedance: u16, profile: &UserProfile, timestamp: DateTime<Utc>) -> Self {
        let m = BodyMetrics::compute(weight, profile);
        Self {
            weight,
            impedance,
            bmi: m.bmi,
            bmr: m.bmr,
            body_fat_percentage: m.body_fat_percentage,
            timestamp,
        }
    }
}

/// A measurement as read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeasurement {
    pub id: i64,
    #[serde(flatten)]
    pub measurement: FinalizedMeasurement,
}

/// Durable storage for finalized measurements.
pub trait MeasurementStore: Send + Sync {
    /// Persist one measurement; returns the assigned row id.
    fn write(&self, m: &FinalizedMeasurement) -> Result<i64>;

    /// Most recent first. `None` returns everything.
    fn query(&self, limit: Option<usize>) -> Result<Vec<StoredMeasurement>>;
}

impl<S: MeasurementStore + ?Sized> MeasurementStore for std::sync::Arc<S> {
    fn write(&self, m: &FinalizedMeasurement) -> Result<i64> {
        (**self).write(m)
    }

    fn query(&self, limit: Option<usize>) -> Result<Vec<StoredMeasurement>> {
        (**self).query(limit)
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredMeasurement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MeasurementStore for MemoryStore {
    fn write(&self, m: &FinalizedMeasurement) -> Result<i64> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| eyre::eyre!("memory store poisoned"))?;
        let id = rows.len() as i64 + 1;
        rows.push(StoredMeasurement {
            id,
            measurement: m.clone(),
        });
        Ok(id)
    }

    fn query(&self, limit: Option<usize>) -> Result<Vec<StoredMeasurement>> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| eyre::eyre!("memory store poisoned"))?;
        let mut out: Vec<_> = rows.clone();
        out.sort_by(|a, b| {
            b.measurement
                .timestamp
                .cmp(&a.measurement.timestamp)
                .then(b.id.cmp(&a.id))
        });
        if let Some(n) = limit {
            out.truncate(n);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Gender;
    use chrono::TimeZone;

    #[test]
    fn memory_store_returns_newest_first_with_limit() {
        let p = UserProfile::new(30, 178.0, Gender::Male).unwrap();
        let s = MemoryStore::new();
        for (i, w) in [70.0, 71.0, 72.0].into_iter().enumerate() {
            let ts = Utc.with_ymd_and_hms(2024, 1, 1, 8, i as u32, 0).unwrap();
            s.write(&FinalizedMeasurement::new(w, 500, &p, ts)).unwrap();
        }
        let rows = s.query(Some(2)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].measurement.weight, 72.0);
        assert_eq!(rows[1].measurement.weight, 71.0);
        assert_eq!(s.query(None).unwrap().len(), 3);
    }
}
