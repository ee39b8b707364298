//! Domain-translation strategies for coordinate axes.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::time::{to_iso8601, TimeUnits};

/// A pair of pure functions mapping human values to and from storage values.
///
/// Comparison and lookup always happen in the storage domain; the strategy
/// only runs at the edges of a selection.
pub trait AxisDomain: Clone + Send + Sync + 'static {
    /// Backing value type held in the arena.
    type Value: PartialOrd + Clone + fmt::Debug + Send + Sync + 'static;
    /// Value type accepted by `sel`.
    type Human;
    /// Value type produced by `vals_human`.
    type Display: fmt::Display;

    fn to_storage(&self, human: &Self::Human) -> Self::Value;

    fn to_human(&self, value: &Self::Value) -> Result<Self::Display>;
}

/// Identity translation for numeric coordinates.
///
/// Humanized values are rounded to two decimal places unless integral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl AxisDomain for Identity {
    type Value = f64;
    type Human = f64;
    type Display = f64;

    fn to_storage(&self, human: &f64) -> f64 {
        *human
    }

    fn to_human(&self, value: &f64) -> Result<f64> {
        Ok(round_for_display(*value))
    }
}

/// String passthrough for categorical coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Passthrough;

impl AxisDomain for Passthrough {
    type Value = String;
    type Human = String;
    type Display = String;

    fn to_storage(&self, human: &String) -> String {
        human.clone()
    }

    fn to_human(&self, value: &String) -> Result<String> {
        Ok(value.clone())
    }
}

/// CF time translation: instants in, integer offsets stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfTime {
    units: TimeUnits,
}

impl CfTime {
    pub fn new(units: TimeUnits) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &TimeUnits {
        &self.units
    }
}

impl AxisDomain for CfTime {
    type Value = i64;
    type Human = DateTime<Utc>;
    type Display = String;

    fn to_storage(&self, human: &DateTime<Utc>) -> i64 {
        self.units.encode_one(human)
    }

    fn to_human(&self, value: &i64) -> Result<String> {
        self.units.decode_one(*value).map(|t| to_iso8601(&t))
    }
}

fn round_for_display(v: f64) -> f64 {
    if v.fract() == 0.0 {
        v
    } else {
        (v * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rounds_fractions() {
        assert_eq!(Identity.to_human(&12.3456).unwrap(), 12.35);
        assert_eq!(Identity.to_human(&-0.004).unwrap(), -0.0);
        assert_eq!(Identity.to_human(&40.0).unwrap(), 40.0);
    }

    #[test]
    fn test_cf_time_translation() {
        let domain = CfTime::new(TimeUnits::parse("hours since 2024-01-01T00:00:00Z").unwrap());
        let t = DateTime::parse_from_rfc3339("2024-01-02T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(domain.to_storage(&t), 30);
        assert_eq!(domain.to_human(&30).unwrap(), "2024-01-02T06:00:00.000Z");
    }
}
