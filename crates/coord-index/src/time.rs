//! CF-style time codec.
//!
//! Converts between calendar instants and integer offsets under a unit
//! specification such as `"minutes since 2015-01-01 08:00:00"`.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone,
    Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoordError, Result};

/// Time unit of a CF specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Parse a unit token (case-insensitive).
    pub fn parse(token: &str) -> Result<Self> {
        match token.to_lowercase().as_str() {
            "seconds" => Ok(Self::Seconds),
            "minutes" => Ok(Self::Minutes),
            "hours" => Ok(Self::Hours),
            "days" => Ok(Self::Days),
            _ => Err(CoordError::UnsupportedUnit(token.to_string())),
        }
    }

    /// Length of one unit in milliseconds.
    pub fn millis(self) -> i64 {
        match self {
            Self::Seconds => 1_000,
            Self::Minutes => 60 * 1_000,
            Self::Hours => 60 * 60 * 1_000,
            Self::Days => 24 * 60 * 60 * 1_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed `"<unit> since <reference>"` specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeUnits {
    spec: String,
    unit: TimeUnit,
    reference: DateTime<Utc>,
    naive_offset: FixedOffset,
}

impl TimeUnits {
    /// Parse a unit specification, reading zone-less references as UTC.
    pub fn parse(spec: &str) -> Result<Self> {
        Self::parse_with_offset(spec, utc_offset())
    }

    /// Parse a unit specification, reading zone-less references in `naive_offset`.
    pub fn parse_with_offset(spec: &str, naive_offset: FixedOffset) -> Result<Self> {
        let tokens: Vec<&str> = spec.split_whitespace().collect();
        let since = tokens
            .iter()
            .position(|t| t.eq_ignore_ascii_case("since"))
            .filter(|&i| i > 0 && i + 1 < tokens.len())
            .ok_or_else(|| {
                CoordError::format(format!(
                    "expected 'units since base_date', got '{}'",
                    spec
                ))
            })?;

        let unit_token = tokens[since - 1];
        let reference_str = tokens[since + 1..].join(" ");

        let reference = parse_instant(&reference_str, &naive_offset).ok_or_else(|| {
            CoordError::format(format!("invalid base date '{}'", reference_str))
        })?;

        let unit = TimeUnit::parse(unit_token)?;

        Ok(Self {
            spec: spec.to_string(),
            unit,
            reference,
            naive_offset,
        })
    }

    /// The specification string this was parsed from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn reference(&self) -> DateTime<Utc> {
        self.reference
    }

    /// Offset used for zone-less instants.
    pub fn naive_offset(&self) -> FixedOffset {
        self.naive_offset
    }

    /// Convert one instant to an integer offset, truncating toward zero.
    pub fn encode_one(&self, instant: &DateTime<Utc>) -> i64 {
        let diff_ms = instant.signed_duration_since(self.reference).num_milliseconds();
        diff_ms / self.unit.millis()
    }

    /// Convert one integer offset back to an instant.
    pub fn decode_one(&self, offset: i64) -> Result<DateTime<Utc>> {
        offset
            .checked_mul(self.unit.millis())
            .and_then(Duration::try_milliseconds)
            .and_then(|d| self.reference.checked_add_signed(d))
            .ok_or_else(|| {
                CoordError::OutOfRange(format!("{} {} since {}", offset, self.unit, self.reference))
            })
    }

    pub fn encode(&self, instants: &[DateTime<Utc>]) -> Vec<i64> {
        instants.iter().map(|t| self.encode_one(t)).collect()
    }

    pub fn decode(&self, offsets: &[i64]) -> Result<Vec<DateTime<Utc>>> {
        offsets.iter().map(|&o| self.decode_one(o)).collect()
    }
}

/// Encode instants as integer offsets under `spec`.
pub fn encode(instants: &[DateTime<Utc>], spec: &str) -> Result<Vec<i64>> {
    Ok(TimeUnits::parse(spec)?.encode(instants))
}

/// Decode integer offsets under `spec` into instants.
pub fn decode(offsets: &[i64], spec: &str) -> Result<Vec<DateTime<Utc>>> {
    TimeUnits::parse(spec)?.decode(offsets)
}

/// Canonical ISO-8601 rendering with millisecond precision and a `Z` suffix.
pub fn to_iso8601(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an instant in any of the forms found in CF references and UI input.
///
/// Zone-less forms are interpreted in `naive_offset`.
pub fn parse_instant(s: &str, naive_offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let s = s.trim();

    // Explicit zone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // Explicit UTC suffix on an otherwise naive form
    let (body, offset) = match s.strip_suffix(" UTC").or_else(|| s.strip_suffix('Z')) {
        Some(body) => (body.trim_end(), utc_offset()),
        None => (s, *naive_offset),
    };

    let naive = parse_naive(body)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Build the fixed offset for `minutes` east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| CoordError::Config(format!("invalid UTC offset: {} minutes", minutes)))
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn pacific() -> FixedOffset {
        FixedOffset::west_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_decode_minutes_with_zone_offset() {
        let units =
            TimeUnits::parse_with_offset("minutes since 2015-01-01 08:00:00", pacific()).unwrap();
        let result = units.decode(&[0, 5, 10, 50]).unwrap();
        let expected = vec![
            utc("2015-01-01T16:00:00.000Z"),
            utc("2015-01-01T16:05:00.000Z"),
            utc("2015-01-01T16:10:00.000Z"),
            utc("2015-01-01T16:50:00.000Z"),
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn test_encode_minutes_with_zone_offset() {
        let units =
            TimeUnits::parse_with_offset("minutes since 2015-01-01 08:00:00", pacific()).unwrap();
        let dates = vec![
            utc("2015-01-01T16:00:00.000Z"),
            utc("2015-01-01T16:05:00.000Z"),
            utc("2015-01-01T16:10:00.000Z"),
            utc("2015-01-01T16:50:00.000Z"),
        ];
        assert_eq!(units.encode(&dates), vec![0, 5, 10, 50]);
    }

    #[test]
    fn test_naive_reference_defaults_to_utc() {
        let decoded = decode(&[0, 90], "minutes since 2015-01-01 08:00:00").unwrap();
        assert_eq!(decoded[0], utc("2015-01-01T08:00:00Z"));
        assert_eq!(decoded[1], utc("2015-01-01T09:30:00Z"));
    }

    #[test]
    fn test_encode_truncates_toward_zero() {
        let spec = "hours since 2000-01-01T00:00:00Z";
        let dates = vec![
            utc("2000-01-01T01:59:59Z"),
            utc("1999-12-31T22:30:00Z"),
        ];
        assert_eq!(encode(&dates, spec).unwrap(), vec![1, -1]);
    }

    #[test]
    fn test_round_trip_on_unit_multiples() {
        let spec = "days since 1970-01-01";
        let offsets = vec![-365, 0, 1, 19_000];
        let dates = decode(&offsets, spec).unwrap();
        assert_eq!(encode(&dates, spec).unwrap(), offsets);
    }

    #[test]
    fn test_multi_decade_seconds() {
        let spec = "seconds since 1900-01-01 00:00:00";
        let date = utc("2100-06-15T12:00:01Z");
        let encoded = encode(&[date], spec).unwrap();
        assert_eq!(decode(&encoded, spec).unwrap(), vec![date]);
    }

    #[test]
    fn test_unit_is_case_insensitive() {
        let units = TimeUnits::parse("Hours SINCE 2024-01-01").unwrap();
        assert_eq!(units.unit(), TimeUnit::Hours);
        assert_eq!(units.reference(), utc("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_format_errors() {
        assert!(matches!(
            TimeUnits::parse("minutes after 2015-01-01"),
            Err(CoordError::Format(_))
        ));
        assert!(matches!(
            TimeUnits::parse("minutes since"),
            Err(CoordError::Format(_))
        ));
        assert!(matches!(
            TimeUnits::parse("minutes since yesterday"),
            Err(CoordError::Format(_))
        ));
    }

    #[test]
    fn test_unsupported_unit() {
        assert!(matches!(
            TimeUnits::parse("weeks since 2015-01-01"),
            Err(CoordError::UnsupportedUnit(u)) if u == "weeks"
        ));
    }

    #[test]
    fn test_decode_overflow() {
        let units = TimeUnits::parse("days since 2000-01-01").unwrap();
        assert!(matches!(
            units.decode_one(i64::MAX),
            Err(CoordError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_parse_instant_forms() {
        let off = utc_offset();
        let expected = utc("2024-03-01T06:30:00Z");
        for s in [
            "2024-03-01T06:30:00Z",
            "2024-03-01T06:30:00+00:00",
            "2024-03-01 06:30:00",
            "2024-03-01T06:30",
            "2024-03-01 06:30:00 UTC",
            "2024-03-01 06:30:00.000",
        ] {
            assert_eq!(parse_instant(s, &off), Some(expected), "{}", s);
        }
        assert!(parse_instant("not a date", &off).is_none());
    }

    #[test]
    fn test_iso8601_rendering() {
        assert_eq!(
            to_iso8601(&utc("2015-01-01T16:05:00Z")),
            "2015-01-01T16:05:00.000Z"
        );
    }

    #[test]
    fn test_offset_from_minutes() {
        assert_eq!(offset_from_minutes(-480).unwrap(), pacific());
        assert!(offset_from_minutes(24 * 60).is_err());
    }
}
