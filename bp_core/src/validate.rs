//! Input validation for candidate measurements.
//!
//! Pure checks against physiological and consistency bounds. The first
//! failing rule wins; `None` means the measurement is acceptable.

use crate::Measurement;

/// Validate a candidate measurement.
///
/// Rules, checked in order:
/// 1. all fields numeric
/// 2. systolic strictly greater than diastolic
/// 3. systolic ≤ 300
/// 4. diastolic ≤ 200
/// 5. pulse within 30–220
///
/// Only upper bounds are enforced on systolic/diastolic; there is no lower
/// bound, an intentional asymmetry inherited from the measurement protocol.
pub fn validate(m: &Measurement) -> Option<&'static str> {
    if m.systolic.is_nan() || m.diastolic.is_nan() || m.pulse.is_nan() {
        return Some("All fields must be numeric.");
    }
    if m.systolic <= m.diastolic {
        return Some("Systolic must exceed diastolic.");
    }
    if m.systolic > 300.0 {
        return Some("Systolic must be ≤ 300.");
    }
    if m.diastolic > 200.0 {
        return Some("Diastolic must be ≤ 200.");
    }
    if m.pulse < 30.0 || m.pulse > 220.0 {
        return Some("Pulse must be within 30–220.");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(systolic: f64, diastolic: f64, pulse: f64) -> Measurement {
        Measurement {
            systolic,
            diastolic,
            pulse,
        }
    }

    #[test]
    fn test_accepts_typical_reading() {
        assert_eq!(validate(&m(120.0, 80.0, 70.0)), None);
    }

    #[test]
    fn test_rejects_non_numeric_first() {
        // Rule 1 short-circuits even when later rules would also fail
        let msg = validate(&m(f64::NAN, 500.0, 0.0)).unwrap();
        assert!(msg.contains("numeric"));
    }

    #[test]
    fn test_systolic_must_exceed_diastolic() {
        for (sys, dia) in [(80.0, 80.0), (80.0, 120.0), (100.0, 100.0)] {
            let msg = validate(&m(sys, dia, 70.0)).expect("must be rejected");
            assert!(msg.contains("Systolic") && msg.contains("diastolic"));
        }
    }

    #[test]
    fn test_upper_bounds() {
        assert!(validate(&m(301.0, 80.0, 70.0)).unwrap().contains("300"));
        assert!(validate(&m(290.0, 201.0, 70.0)).unwrap().contains("200"));
        assert_eq!(validate(&m(300.0, 200.0, 70.0)), None);
    }

    #[test]
    fn test_no_lower_bound_on_pressure() {
        // Deliberate asymmetry: implausibly low pressures pass
        assert_eq!(validate(&m(20.0, 10.0, 70.0)), None);
    }

    #[test]
    fn test_pulse_range() {
        assert!(validate(&m(120.0, 80.0, 29.0)).unwrap().contains("Pulse"));
        assert!(validate(&m(120.0, 80.0, 221.0)).unwrap().contains("Pulse"));
        assert_eq!(validate(&m(120.0, 80.0, 30.0)), None);
        assert_eq!(validate(&m(120.0, 80.0, 220.0)), None);
    }
}
