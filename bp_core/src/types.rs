//! Core domain types for the blood-pressure journal.
//!
//! A session collects three [`Measurement`]s; their per-field average becomes
//! a single [`SavedRecord`], the unit of durable output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw blood-pressure reading as entered by the user.
///
/// Held only in workflow memory until the batch of three is complete.
/// Fields may be NaN when the raw input was not numeric; [`crate::validate`]
/// rejects those before a measurement is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub systolic: f64,
    pub diastolic: f64,
    pub pulse: f64,
}

/// The persisted average of three measurements.
///
/// `id` is assigned by the record store on first write and is absent before
/// persistence. Once written, a record is immutable and append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedRecord {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<u64>,
    /// Moment the average was computed, ISO-8601 / RFC 3339.
    pub timestamp: DateTime<Utc>,
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse: i32,
}

impl SavedRecord {
    /// Average a full batch of measurements field by field.
    ///
    /// Each field is summed, divided by three and rounded half away from
    /// zero (`f64::round`). The resulting record carries no `id`; the store
    /// assigns one at write time.
    pub fn average_of(all: &[Measurement], timestamp: DateTime<Utc>) -> Self {
        debug_assert_eq!(all.len(), 3, "a session averages exactly three readings");

        let avg = |f: fn(&Measurement) -> f64| {
            (all.iter().map(f).sum::<f64>() / 3.0).round() as i32
        };

        Self {
            id: None,
            timestamp,
            systolic: avg(|m| m.systolic),
            diastolic: avg(|m| m.diastolic),
            pulse: avg(|m| m.pulse),
        }
    }
}

/// The three entry fields of the measurement form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Systolic,
    Diastolic,
    Pulse,
}

/// Raw text input buffers for the three fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inputs {
    pub systolic: String,
    pub diastolic: String,
    pub pulse: String,
}

impl Inputs {
    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Systolic => self.systolic = value,
            Field::Diastolic => self.diastolic = value,
            Field::Pulse => self.pulse = value,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// All three buffers hold a non-empty string.
    pub fn all_filled(&self) -> bool {
        !self.systolic.trim().is_empty()
            && !self.diastolic.trim().is_empty()
            && !self.pulse.trim().is_empty()
    }

    /// Convert the buffers to a candidate measurement.
    ///
    /// Non-numeric text becomes NaN so the validator can report it as a
    /// single "must be numeric" failure rather than an input-layer error.
    pub fn to_measurement(&self) -> Measurement {
        let num = |s: &str| s.trim().parse::<f64>().unwrap_or(f64::NAN);
        Measurement {
            systolic: num(&self.systolic),
            diastolic: num(&self.diastolic),
            pulse: num(&self.pulse),
        }
    }
}

/// Render a countdown as `mm:ss` for display.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
