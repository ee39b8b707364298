//! Configuration for coordinate resolution.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{CoordError, Result};
use crate::time::offset_from_minutes;

/// Rule deciding which dimensions become time axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TimeAxisRule {
    /// A dimension with exactly this name and a `units` attribute.
    NamedDimension { name: String },
    /// Any dimension whose `units` attribute reads `<unit> since <reference>`.
    CfUnits,
}

impl Default for TimeAxisRule {
    fn default() -> Self {
        Self::NamedDimension {
            name: "time".to_string(),
        }
    }
}

impl TimeAxisRule {
    /// Whether `dimension` with the given `units` attribute is a time axis.
    pub fn is_time_axis(&self, dimension: &str, units: Option<&str>) -> bool {
        match (self, units) {
            (_, None) => false,
            (Self::NamedDimension { name }, Some(_)) => dimension == name,
            (Self::CfUnits, Some(units)) => units
                .split_whitespace()
                .any(|t| t.eq_ignore_ascii_case("since")),
        }
    }
}

/// Configuration for the coordinate resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Which dimensions get CF time treatment.
    pub time_rule: TimeAxisRule,

    /// Offset east of UTC, in minutes, applied to time references and
    /// selection instants that carry no zone.
    pub naive_time_offset_minutes: i32,

    /// Upper bound on coordinate fetches in flight at once.
    pub max_concurrent_fetches: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            time_rule: TimeAxisRule::default(),
            naive_time_offset_minutes: 0,
            max_concurrent_fetches: 8,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COORD_TIME_RULE") {
            if val.eq_ignore_ascii_case("units") {
                config.time_rule = TimeAxisRule::CfUnits;
            }
        }

        if let Ok(val) = std::env::var("COORD_TIME_DIMENSION") {
            if let TimeAxisRule::NamedDimension { name } = &mut config.time_rule {
                *name = val;
            }
        }

        if let Ok(val) = std::env::var("COORD_NAIVE_TIME_OFFSET_MINUTES") {
            if let Ok(minutes) = val.parse() {
                config.naive_time_offset_minutes = minutes;
            }
        }

        if let Ok(val) = std::env::var("COORD_MAX_CONCURRENT_FETCHES") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_fetches = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(CoordError::Config(
                "max_concurrent_fetches must be > 0".to_string(),
            ));
        }

        if let TimeAxisRule::NamedDimension { name } = &self.time_rule {
            if name.is_empty() {
                return Err(CoordError::Config(
                    "time dimension name must not be empty".to_string(),
                ));
            }
        }

        self.naive_offset().map(|_| ())
    }

    /// The zone applied to zone-less instants.
    pub fn naive_offset(&self) -> Result<FixedOffset> {
        offset_from_minutes(self.naive_time_offset_minutes)
    }
}
