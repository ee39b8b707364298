//! Heterogeneous axis wrapper used by coordinate maps.

use serde::{Deserialize, Serialize};

use super::{CategoricalAxis, NumericAxis, Selection, TimeAxis, ZIndex};
use crate::error::{CoordError, Result};
use crate::time::parse_instant;

/// Which specialization an axis uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Numeric,
    Time,
    Categorical,
}

impl std::fmt::Display for AxisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Time => write!(f, "time"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

/// Storage-domain values of an [`AnyAxis`], in visible order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "lowercase")]
pub enum AxisValues {
    Numeric(Vec<f64>),
    /// Integer offsets in the axis' CF time units.
    Time(Vec<i64>),
    Categorical(Vec<String>),
}

impl AxisValues {
    pub fn kind(&self) -> AxisKind {
        match self {
            Self::Numeric(_) => AxisKind::Numeric,
            Self::Time(_) => AxisKind::Time,
            Self::Categorical(_) => AxisKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Time(v) => v.len(),
            Self::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One of the three axis specializations.
#[derive(Debug, Clone)]
pub enum AnyAxis {
    Numeric(NumericAxis),
    Time(TimeAxis),
    Categorical(CategoricalAxis),
}

impl AnyAxis {
    pub fn kind(&self) -> AxisKind {
        match self {
            Self::Numeric(_) => AxisKind::Numeric,
            Self::Time(_) => AxisKind::Time,
            Self::Categorical(_) => AxisKind::Categorical,
        }
    }

    /// Label selection with string values parsed into the axis domain.
    ///
    /// Numeric axes parse `f64`, time axes parse instants (zone-less input
    /// read in the axis' configured offset), categorical axes take the
    /// strings as-is.
    pub fn sel_str(&self, predicate: &Selection<String>) -> Result<Self> {
        Ok(match self {
            Self::Numeric(axis) => {
                let predicate = predicate.try_map(|s| {
                    s.parse::<f64>()
                        .map_err(|_| CoordError::invalid_selection(s.as_str(), "a number"))
                })?;
                Self::Numeric(axis.sel(&predicate))
            }
            Self::Time(axis) => {
                let offset = axis.units().naive_offset();
                let predicate = predicate.try_map(|s| {
                    parse_instant(s, &offset)
                        .ok_or_else(|| CoordError::invalid_selection(s.as_str(), "an ISO-8601 instant"))
                })?;
                Self::Time(axis.sel(&predicate))
            }
            Self::Categorical(axis) => Self::Categorical(axis.sel(predicate)),
        })
    }

    pub fn isel(&self, predicate: &Selection<usize>) -> Self {
        match self {
            Self::Numeric(axis) => Self::Numeric(axis.isel(predicate)),
            Self::Time(axis) => Self::Time(axis.isel(predicate)),
            Self::Categorical(axis) => Self::Categorical(axis.isel(predicate)),
        }
    }

    pub fn zindex(&self) -> ZIndex {
        match self {
            Self::Numeric(axis) => axis.zindex(),
            Self::Time(axis) => axis.zindex(),
            Self::Categorical(axis) => axis.zindex(),
        }
    }

    /// Visible values in the storage domain.
    pub fn vals(&self) -> AxisValues {
        match self {
            Self::Numeric(axis) => AxisValues::Numeric(axis.vals()),
            Self::Time(axis) => AxisValues::Time(axis.vals()),
            Self::Categorical(axis) => AxisValues::Categorical(axis.vals()),
        }
    }

    /// Visible values rendered for display.
    pub fn vals_human(&self) -> Result<Vec<String>> {
        fn render<T: ToString>(values: Vec<T>) -> Vec<String> {
            values.into_iter().map(|v| v.to_string()).collect()
        }
        Ok(match self {
            Self::Numeric(axis) => render(axis.vals_human()?),
            Self::Time(axis) => axis.vals_human()?,
            Self::Categorical(axis) => axis.vals_human()?,
        })
    }

    pub fn val_human(&self, i: usize) -> Result<Option<String>> {
        Ok(match self {
            Self::Numeric(axis) => axis.val_human(i)?.map(|v| v.to_string()),
            Self::Time(axis) => axis.val_human(i)?,
            Self::Categorical(axis) => axis.val_human(i)?,
        })
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(axis) => axis.len(),
            Self::Time(axis) => axis.len(),
            Self::Categorical(axis) => axis.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&NumericAxis> {
        match self {
            Self::Numeric(axis) => Some(axis),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&TimeAxis> {
        match self {
            Self::Time(axis) => Some(axis),
            _ => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&CategoricalAxis> {
        match self {
            Self::Categorical(axis) => Some(axis),
            _ => None,
        }
    }
}

impl From<NumericAxis> for AnyAxis {
    fn from(axis: NumericAxis) -> Self {
        Self::Numeric(axis)
    }
}

impl From<TimeAxis> for AnyAxis {
    fn from(axis: TimeAxis) -> Self {
        Self::Time(axis)
    }
}

impl From<CategoricalAxis> for AnyAxis {
    fn from(axis: CategoricalAxis) -> Self {
        Self::Categorical(axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sel_str_numeric() {
        let axis: AnyAxis = NumericAxis::numeric(vec![35.5, 36.0, 37.25, 38.0, 39.0]).into();
        let narrowed = axis.sel_str(&"36..39".parse().unwrap()).unwrap();
        assert_eq!(narrowed.kind(), AxisKind::Numeric);
        assert_eq!(narrowed.zindex(), ZIndex::Range { start: 1, stop: 4 });
        assert_eq!(narrowed.vals_human().unwrap(), vec!["36", "37.25", "38"]);

        let err = axis.sel_str(&"north".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CoordError::InvalidSelection { .. }));
    }

    #[test]
    fn test_sel_str_time() {
        let axis: AnyAxis = TimeAxis::time(vec![0, 1, 2, 3], "hours since 2024-06-01 00:00:00")
            .unwrap()
            .into();
        let narrowed = axis
            .sel_str(&"2024-06-01T01:00:00Z..2024-06-01 03:00".parse().unwrap())
            .unwrap();
        assert_eq!(narrowed.zindex(), ZIndex::Range { start: 1, stop: 3 });
        assert_eq!(
            narrowed.val_human(0).unwrap().as_deref(),
            Some("2024-06-01T01:00:00.000Z")
        );
        assert!(axis.sel_str(&"soon".parse().unwrap()).is_err());
    }

    #[test]
    fn test_vals_in_storage_domain() {
        let time: AnyAxis = TimeAxis::time(vec![0, 5, 10, 50], "minutes since 2015-01-01T16:00:00Z")
            .unwrap()
            .into();
        let narrowed = time.isel(&Selection::range(1, 3));
        assert_eq!(narrowed.vals(), AxisValues::Time(vec![5, 10]));
        assert_eq!(narrowed.vals().kind(), AxisKind::Time);

        let lat: AnyAxis = NumericAxis::numeric(vec![36.0, 37.123]).into();
        assert_eq!(lat.vals(), AxisValues::Numeric(vec![36.0, 37.123]));

        let band: AnyAxis = CategoricalAxis::categorical(["red", "nir"]).into();
        let none = band.sel_str(&"blue".parse().unwrap()).unwrap();
        assert_eq!(none.vals(), AxisValues::Categorical(Vec::new()));
        assert!(none.vals().is_empty());

        assert_eq!(
            serde_json::to_value(band.vals()).unwrap(),
            serde_json::json!({"kind": "categorical", "values": ["red", "nir"]})
        );
    }

    #[test]
    fn test_sel_str_categorical_and_isel() {
        let axis: AnyAxis = CategoricalAxis::categorical(["C01", "C02", "C13"]).into();
        let picked = axis.sel_str(&"C13,C01".parse().unwrap()).unwrap();
        assert_eq!(picked.vals_human().unwrap(), vec!["C01", "C13"]);
        assert_eq!(picked.isel(&Selection::value(1)).zindex(), ZIndex::Scalar(2));
        assert!(axis.as_categorical().is_some());
        assert!(axis.as_time().is_none());
    }
}
