//! Immutable, composable coordinate axes.
//!
//! An axis is a shared arena of backing values plus the list of positions
//! currently visible. `sel` narrows by label, `isel` by offset into the
//! visible list; both return a new axis and never touch the arena.
//!
//! ```text
//! arena:    [10, 20, 30, 40, 50, 60, 70, 80, 90]   (Arc, shared)
//! sel 25..75     ──►  visible [2, 3, 4, 5, 6]      zindex 2..7
//! isel 0..1      ──►  visible [2]                  zindex 2
//! sel 500        ──►  visible []                   zindex Empty
//! ```

mod any;
mod categorical;
mod domain;

pub use any::{AnyAxis, AxisKind, AxisValues};
pub use categorical::{decode_fixed_width, FixedWidthEncoding};
pub use domain::{AxisDomain, CfTime, Identity, Passthrough};

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{CoordError, Result};
use crate::time::TimeUnits;

/// Numeric coordinate axis (identity translation).
pub type NumericAxis = CoordinateAxis<Identity>;
/// Time coordinate axis over CF integer offsets.
pub type TimeAxis = CoordinateAxis<CfTime>;
/// Categorical coordinate axis over decoded strings.
pub type CategoricalAxis = CoordinateAxis<Passthrough>;

/// A selection predicate.
///
/// For `sel` the values are in the axis' human domain; for `isel` they are
/// offsets into the currently visible positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T> {
    /// Half-open range, inclusive start and exclusive stop.
    Range { start: T, stop: T },
    /// A single value.
    Value(T),
    /// Any of a set of values.
    Set(Vec<T>),
}

impl<T> Selection<T> {
    pub fn range(start: T, stop: T) -> Self {
        Self::Range { start, stop }
    }

    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    pub fn set(values: impl IntoIterator<Item = T>) -> Self {
        Self::Set(values.into_iter().collect())
    }

    /// Convert every value of the predicate, failing on the first error.
    pub fn try_map<U, E>(&self, mut f: impl FnMut(&T) -> std::result::Result<U, E>) -> std::result::Result<Selection<U>, E> {
        Ok(match self {
            Self::Range { start, stop } => Selection::Range {
                start: f(start)?,
                stop: f(stop)?,
            },
            Self::Value(v) => Selection::Value(f(v)?),
            Self::Set(vs) => Selection::Set(vs.iter().map(f).collect::<std::result::Result<_, _>>()?),
        })
    }
}

/// Parses `start..stop` as a range, `a,b,c` as a set, anything else as a
/// single value. Values are kept as trimmed strings; the axis decides how to
/// interpret them.
impl FromStr for Selection<String> {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoordError::invalid_selection(s, "a value, a range or a set"));
        }

        if let Some((start, stop)) = s.split_once("..") {
            let (start, stop) = (start.trim(), stop.trim());
            if start.is_empty() || stop.is_empty() {
                return Err(CoordError::invalid_selection(s, "'start..stop'"));
            }
            return Ok(Self::range(start.to_string(), stop.to_string()));
        }

        if s.contains(',') {
            return Ok(Self::set(
                s.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from),
            ));
        }

        Ok(Self::value(s.to_string()))
    }
}

/// Storage-ready index descriptor for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZIndex {
    /// The selection is empty; drop this dimension from the read.
    Empty,
    /// A single storage offset.
    Scalar(u64),
    /// Half-open storage range.
    Range { start: u64, stop: u64 },
}

impl ZIndex {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Storage range covered by this index, `None` when empty.
    pub fn as_range(&self) -> Option<Range<u64>> {
        match *self {
            Self::Empty => None,
            Self::Scalar(p) => Some(p..p + 1),
            Self::Range { start, stop } => Some(start..stop),
        }
    }

    /// Number of storage elements covered.
    pub fn len(&self) -> u64 {
        self.as_range().map(|r| r.end - r.start).unwrap_or(0)
    }
}

impl fmt::Display for ZIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Scalar(p) => write!(f, "{}", p),
            Self::Range { start, stop } => write!(f, "{}..{}", start, stop),
        }
    }
}

/// Immutable view over one dimension's coordinate values.
///
/// Backing values are shared between every axis derived from the same
/// construction; each derived axis owns only its visible-position list.
///
/// Range selections assume the backing values are sorted ascending. This is
/// not validated: unsorted input gives unspecified (but memory-safe) results.
pub struct CoordinateAxis<D: AxisDomain> {
    values: Arc<[D::Value]>,
    visible: Vec<usize>,
    domain: D,
}

impl<D: AxisDomain> CoordinateAxis<D> {
    /// Create an axis with every position visible.
    pub fn new(values: impl Into<Arc<[D::Value]>>, domain: D) -> Self {
        let values = values.into();
        let visible = (0..values.len()).collect();
        Self {
            values,
            visible,
            domain,
        }
    }

    /// Create an axis with an explicit visible-position list.
    pub fn with_visible(
        values: impl Into<Arc<[D::Value]>>,
        visible: Vec<usize>,
        domain: D,
    ) -> Result<Self> {
        let values = values.into();
        if let Some(&position) = visible.iter().find(|&&p| p >= values.len()) {
            return Err(CoordError::InvalidPositions {
                position,
                len: values.len(),
            });
        }
        Ok(Self {
            values,
            visible,
            domain,
        })
    }

    fn derive(&self, visible: Vec<usize>) -> Self {
        Self {
            values: Arc::clone(&self.values),
            visible,
            domain: self.domain.clone(),
        }
    }

    /// Label-domain selection.
    ///
    /// Range and value lookups search the whole backing sequence, then
    /// intersect with the current visible positions.
    pub fn sel(&self, predicate: &Selection<D::Human>) -> Self {
        let visible = match predicate {
            Selection::Range { start, stop } => {
                let start = self.domain.to_storage(start);
                let stop = self.domain.to_storage(stop);
                let bounds = self.slice_bounds(&start, &stop);
                self.visible
                    .iter()
                    .copied()
                    .filter(|p| bounds.contains(p))
                    .collect()
            }
            Selection::Value(human) => {
                let target = self.domain.to_storage(human);
                match self.values.iter().position(|v| *v == target) {
                    Some(p) if self.visible.contains(&p) => vec![p],
                    _ => Vec::new(),
                }
            }
            Selection::Set(humans) => {
                let targets: Vec<D::Value> =
                    humans.iter().map(|h| self.domain.to_storage(h)).collect();
                self.visible
                    .iter()
                    .copied()
                    .filter(|&p| targets.contains(&self.values[p]))
                    .collect()
            }
        };
        self.derive(visible)
    }

    /// Position-domain selection relative to the current visible positions.
    pub fn isel(&self, predicate: &Selection<usize>) -> Self {
        let visible = match predicate {
            Selection::Range { start, stop } => {
                let len = self.visible.len();
                let start = (*start).min(len);
                let stop = (*stop).clamp(start, len);
                self.visible[start..stop].to_vec()
            }
            Selection::Value(offset) => self
                .visible
                .get(*offset)
                .map(|&p| vec![p])
                .unwrap_or_default(),
            Selection::Set(offsets) => self
                .visible
                .iter()
                .enumerate()
                .filter(|(i, _)| offsets.contains(i))
                .map(|(_, &p)| p)
                .collect(),
        };
        self.derive(visible)
    }

    /// Backing positions `[first, last]` as a half-open range: first value
    /// `>= start` through last value `< stop`.
    fn slice_bounds(&self, start: &D::Value, stop: &D::Value) -> Range<usize> {
        let lower = self.values.partition_point(|v| v < start);
        let upper = self.values.partition_point(|v| v < stop);
        lower..upper.max(lower)
    }

    /// Storage-ready index for the current selection.
    ///
    /// A multi-element selection is reported as `first..last + 1`, which is
    /// only exact when the visible positions are contiguous (always true for
    /// range selections on sorted axes, not guaranteed after set selections).
    pub fn zindex(&self) -> ZIndex {
        match self.visible.as_slice() {
            [] => ZIndex::Empty,
            [only] => ZIndex::Scalar(*only as u64),
            [first, .., last] => ZIndex::Range {
                start: *first as u64,
                stop: *last as u64 + 1,
            },
        }
    }

    /// Backing values at the visible positions, in visible order.
    pub fn vals(&self) -> Vec<D::Value> {
        self.visible
            .iter()
            .map(|&p| self.values[p].clone())
            .collect()
    }

    /// Visible values translated to the human domain.
    pub fn vals_human(&self) -> Result<Vec<D::Display>> {
        self.visible
            .iter()
            .map(|&p| self.domain.to_human(&self.values[p]))
            .collect()
    }

    /// The `i`-th visible value in the human domain, `None` past the end.
    pub fn val_human(&self, i: usize) -> Result<Option<D::Display>> {
        self.visible
            .get(i)
            .map(|&p| self.domain.to_human(&self.values[p]))
            .transpose()
    }

    /// Number of visible positions.
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Visible positions into the backing values.
    pub fn positions(&self) -> &[usize] {
        &self.visible
    }

    /// Length of the backing values, independent of the selection.
    pub fn backing_len(&self) -> usize {
        self.values.len()
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Whether two axes share the same backing arena.
    pub fn shares_values(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl<D: AxisDomain> Clone for CoordinateAxis<D> {
    fn clone(&self) -> Self {
        self.derive(self.visible.clone())
    }
}

impl<D: AxisDomain + fmt::Debug> fmt::Debug for CoordinateAxis<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateAxis")
            .field("domain", &self.domain)
            .field("backing_len", &self.values.len())
            .field("visible", &self.visible.len())
            .field("zindex", &self.zindex())
            .finish()
    }
}

impl NumericAxis {
    /// Integer coordinates are held here as f64 too, exact only up to 2^53.
    pub fn numeric(values: impl Into<Arc<[f64]>>) -> Self {
        Self::new(values, Identity)
    }
}

impl TimeAxis {
    /// Time axis over integer offsets, zone-less references read as UTC.
    pub fn time(offsets: impl Into<Arc<[i64]>>, units: &str) -> Result<Self> {
        Ok(Self::new(offsets, CfTime::new(TimeUnits::parse(units)?)))
    }

    /// Time axis over integer offsets, zone-less references read in `naive_offset`.
    pub fn time_with_offset(
        offsets: impl Into<Arc<[i64]>>,
        units: &str,
        naive_offset: FixedOffset,
    ) -> Result<Self> {
        Ok(Self::new(
            offsets,
            CfTime::new(TimeUnits::parse_with_offset(units, naive_offset)?),
        ))
    }

    pub fn units(&self) -> &TimeUnits {
        self.domain.units()
    }
}

impl CategoricalAxis {
    pub fn categorical(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Self::new(values, Passthrough)
    }

    /// Build an axis from a fixed-width string buffer.
    pub fn from_fixed_width(
        buffer: &[u8],
        width: usize,
        encoding: FixedWidthEncoding,
    ) -> Result<Self> {
        Ok(Self::new(
            decode_fixed_width(buffer, width, encoding)?,
            Passthrough,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn tens() -> NumericAxis {
        NumericAxis::numeric(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0])
    }

    #[test]
    fn test_range_selection_boundaries() {
        let axis = tens();
        let first = axis.sel(&Selection::range(25.0, 75.0));
        assert_eq!(first.vals(), vec![30.0, 40.0, 50.0, 60.0, 70.0]);

        // inclusive start, exclusive stop
        let exact = axis.sel(&Selection::range(30.0, 70.0));
        assert_eq!(exact.vals(), vec![30.0, 40.0, 50.0, 60.0]);
    }

    #[test]
    fn test_selection_does_not_mutate() {
        let axis = tens();
        let first = axis.sel(&Selection::range(25.0, 75.0));
        let second = axis.sel(&Selection::range(35.0, 55.0));
        assert_eq!(second.vals(), vec![40.0, 50.0]);
        assert_eq!(first.vals(), vec![30.0, 40.0, 50.0, 60.0, 70.0]);
        assert_eq!(axis.len(), 9);
        assert!(first.shares_values(&second));
    }

    #[test]
    fn test_sparse_set_spans_bounding_range() {
        let axis = tens();
        let sparse = axis.sel(&Selection::set([20.0, 90.0]));
        assert_eq!(sparse.vals(), vec![20.0, 90.0]);
        assert_eq!(sparse.positions().to_vec(), vec![1, 8]);
        assert_eq!(sparse.zindex(), ZIndex::Range { start: 1, stop: 9 });
    }

    #[test]
    fn test_isel_then_sel() {
        let axis = tens();
        let first = axis.isel(&Selection::range(0, 5)).sel(&Selection::value(10.0));
        assert_eq!(first.vals(), vec![10.0]);
        let second = axis.isel(&Selection::range(5, 8)).sel(&Selection::value(10.0));
        assert!(second.vals().is_empty());
    }

    #[test]
    fn test_sel_then_isel_uses_visible_offsets() {
        let axis = tens();
        let first = axis
            .sel(&Selection::range(25.0, 75.0))
            .isel(&Selection::range(0, 1));
        assert_eq!(first.vals(), vec![30.0]);
    }

    #[test]
    fn test_empty_selections() {
        let axis = tens();
        assert!(axis.isel(&Selection::value(50)).vals().is_empty());

        let none = axis.sel(&Selection::value(500.0));
        assert!(none.vals().is_empty());
        assert_eq!(none.zindex(), ZIndex::Empty);

        // range entirely above or below the values
        assert!(axis.sel(&Selection::range(1000.0, 2000.0)).is_empty());
        assert!(axis.sel(&Selection::range(0.0, 5.0)).is_empty());
        // inverted range
        assert!(axis.sel(&Selection::range(60.0, 20.0)).is_empty());
    }

    #[test]
    fn test_zindex() {
        let first = tens().sel(&Selection::range(25.0, 75.0));
        assert_eq!(first.zindex(), ZIndex::Range { start: 2, stop: 7 });
        assert_eq!(first.sel(&Selection::value(30.0)).zindex(), ZIndex::Scalar(2));
        assert_eq!(first.sel(&Selection::value(300.0)).zindex(), ZIndex::Empty);
        assert_eq!(first.zindex().as_range(), Some(2..7));
        assert_eq!(first.zindex().len(), 5);
    }

    #[test]
    fn test_value_must_be_visible() {
        let narrowed = tens().sel(&Selection::range(25.0, 75.0));
        assert!(narrowed.sel(&Selection::value(20.0)).is_empty());
        assert_eq!(narrowed.sel(&Selection::value(70.0)).vals(), vec![70.0]);
    }

    #[test]
    fn test_set_selections() {
        let axis = tens();
        let picked = axis.sel(&Selection::set([90.0, 20.0, 55.0]));
        // visible order, not predicate order
        assert_eq!(picked.vals(), vec![20.0, 90.0]);

        let narrowed = axis.sel(&Selection::range(25.0, 75.0));
        assert_eq!(
            narrowed.sel(&Selection::set([20.0, 40.0])).vals(),
            vec![40.0]
        );

        let offsets = narrowed.isel(&Selection::set([0, 2, 40]));
        assert_eq!(offsets.vals(), vec![30.0, 50.0]);
    }

    #[test]
    fn test_isel_range_clamps() {
        let axis = tens();
        assert_eq!(axis.isel(&Selection::range(7, 100)).vals(), vec![80.0, 90.0]);
        assert!(axis.isel(&Selection::range(20, 30)).is_empty());
        assert!(axis.isel(&Selection::range(5, 2)).is_empty());
    }

    #[test]
    fn test_with_visible_rejects_out_of_bounds() {
        let err = NumericAxis::with_visible(vec![1.0, 2.0], vec![0, 2], Identity).unwrap_err();
        assert!(matches!(err, CoordError::InvalidPositions { position: 2, len: 2 }));

        let axis = NumericAxis::with_visible(vec![1.0, 2.0, 3.0], vec![1, 2], Identity).unwrap();
        assert_eq!(axis.vals(), vec![2.0, 3.0]);
        assert_eq!(axis.backing_len(), 3);
    }

    #[test]
    fn test_numeric_humanization() {
        let axis = NumericAxis::numeric(vec![-124.123, -123.5, -122.0]);
        assert_eq!(axis.vals_human().unwrap(), vec![-124.12, -123.5, -122.0]);
        assert_eq!(axis.val_human(1).unwrap(), Some(-123.5));
        assert_eq!(axis.val_human(3).unwrap(), None);
    }

    #[test]
    fn test_time_axis_selection() {
        let axis = TimeAxis::time(vec![0, 5, 10, 50], "minutes since 2015-01-01 16:00:00").unwrap();
        let start: DateTime<Utc> = "2015-01-01T16:04:00Z".parse().unwrap();
        let stop: DateTime<Utc> = "2015-01-01T16:50:00Z".parse().unwrap();

        let window = axis.sel(&Selection::range(start, stop));
        assert_eq!(window.vals(), vec![5, 10]);
        assert_eq!(window.zindex(), ZIndex::Range { start: 1, stop: 3 });
        assert_eq!(
            window.vals_human().unwrap(),
            vec!["2015-01-01T16:05:00.000Z", "2015-01-01T16:10:00.000Z"]
        );

        let exact = axis.sel(&Selection::value(stop));
        assert_eq!(exact.zindex(), ZIndex::Scalar(3));
        assert_eq!(
            exact.val_human(0).unwrap().as_deref(),
            Some("2015-01-01T16:50:00.000Z")
        );
    }

    #[test]
    fn test_time_axis_rejects_bad_units() {
        assert!(TimeAxis::time(vec![0], "fortnights since 2015-01-01").is_err());
    }

    #[test]
    fn test_categorical_axis() {
        let axis = CategoricalAxis::categorical(["10", "20", "30", "40", "50", "60", "70", "80", "90"]);
        let hit = axis.sel(&Selection::value("20".to_string()));
        assert_eq!(hit.vals(), vec!["20".to_string()]);
        assert_eq!(hit.val_human(0).unwrap().as_deref(), Some("20"));

        let range = axis.sel(&Selection::range("25".to_string(), "45".to_string()));
        assert_eq!(range.vals(), vec!["30".to_string(), "40".to_string()]);
    }

    #[test]
    fn test_selection_parsing() {
        assert_eq!(
            "25..75".parse::<Selection<String>>().unwrap(),
            Selection::range("25".to_string(), "75".to_string())
        );
        assert_eq!(
            "2015-01-01T16:00:00Z..2015-01-01T17:00:00Z"
                .parse::<Selection<String>>()
                .unwrap(),
            Selection::range(
                "2015-01-01T16:00:00Z".to_string(),
                "2015-01-01T17:00:00Z".to_string()
            )
        );
        assert_eq!(
            "a, b,c".parse::<Selection<String>>().unwrap(),
            Selection::set(["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(
            " 42 ".parse::<Selection<String>>().unwrap(),
            Selection::value("42".to_string())
        );
        assert!("..5".parse::<Selection<String>>().is_err());
        assert!("".parse::<Selection<String>>().is_err());
    }

    #[test]
    fn test_try_map() {
        let parsed: Selection<usize> = Selection::range("1".to_string(), "4".to_string())
            .try_map(|s| s.parse::<usize>())
            .unwrap();
        assert_eq!(parsed, Selection::range(1, 4));
        assert!(Selection::set(["1".to_string(), "x".to_string()])
            .try_map(|s| s.parse::<usize>())
            .is_err());
    }
}
