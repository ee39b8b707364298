//! Coordinate resolution: from array metadata to a map of axes.
//!
//! ```text
//! arrays ──► dimension names ──► distinct "<group>/<dim>" keys
//!                                         │
//!                     ┌───────────────────┼───────────────────┐
//!                describe+fetch     describe+fetch      describe+fetch   (bounded, concurrent)
//!                     └───────────────────┼───────────────────┘
//!                                         ▼
//!                        first error aborts, else CoordinateMap
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::FixedOffset;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::axis::{AnyAxis, CategoricalAxis, NumericAxis, TimeAxis};
use crate::config::ResolverConfig;
use crate::error::{CoordError, Result};
use crate::store::{ArrayDescriptor, CoordinateStore, CoordinateValues};

/// Key of a dimension's coordinate axis: `<group-prefix>/<dimension>`.
pub fn coordinate_key(group_prefix: &str, dimension: &str) -> String {
    format!("{}/{}", group_prefix.trim_end_matches('/'), dimension)
}

/// Coordinate axes keyed by `<group-prefix>/<dimension>`.
#[derive(Debug, Clone, Default)]
pub struct CoordinateMap {
    axes: BTreeMap<String, AnyAxis>,
}

impl CoordinateMap {
    pub fn get(&self, key: &str) -> Option<&AnyAxis> {
        self.axes.get(key)
    }

    /// Axis for `dimension` as seen from `array`.
    pub fn for_dimension(&self, array: &ArrayDescriptor, dimension: &str) -> Option<&AnyAxis> {
        self.axes
            .get(&coordinate_key(array.group_prefix(), dimension))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.axes.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnyAxis)> {
        self.axes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, AnyAxis> {
        self.axes
    }
}

impl FromIterator<(String, AnyAxis)> for CoordinateMap {
    fn from_iter<I: IntoIterator<Item = (String, AnyAxis)>>(iter: I) -> Self {
        Self {
            axes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CoordinateMap {
    type Item = (String, AnyAxis);
    type IntoIter = std::collections::btree_map::IntoIter<String, AnyAxis>;

    fn into_iter(self) -> Self::IntoIter {
        self.axes.into_iter()
    }
}

/// A coordinate still to be fetched, with the first array that referenced it.
struct PendingCoordinate {
    key: String,
    dimension: String,
    referenced_by: String,
}

/// Builds coordinate maps from a [`CoordinateStore`].
pub struct CoordinateResolver<S: CoordinateStore + ?Sized> {
    store: Arc<S>,
    config: ResolverConfig,
    naive_offset: FixedOffset,
}

impl<S: CoordinateStore + ?Sized> CoordinateResolver<S> {
    pub fn new(store: Arc<S>, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let naive_offset = config.naive_offset()?;
        Ok(Self {
            store,
            config,
            naive_offset,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve every coordinate referenced by the arrays beneath `group`.
    pub async fn resolve(&self, group: &str) -> Result<CoordinateMap> {
        let arrays = self.store.list_arrays(group).await?;
        debug!(group = %group, arrays = arrays.len(), "Listed arrays");
        self.resolve_arrays(&arrays).await
    }

    /// Resolve only the coordinates of the array at `path`.
    pub async fn resolve_array(&self, path: &str) -> Result<CoordinateMap> {
        let array = self
            .store
            .describe(path)
            .await?
            .ok_or_else(|| CoordError::NotFound(path.to_string()))?;
        self.resolve_arrays(std::slice::from_ref(&array)).await
    }

    /// Resolve the coordinates referenced by `arrays`.
    ///
    /// Each distinct key is fetched once; fetches run concurrently and the
    /// first failure fails the whole resolution.
    pub async fn resolve_arrays(&self, arrays: &[ArrayDescriptor]) -> Result<CoordinateMap> {
        let mut pending: BTreeMap<String, PendingCoordinate> = BTreeMap::new();
        for array in arrays {
            let dims = array
                .dimension_names
                .as_ref()
                .ok_or_else(|| CoordError::missing_dimensions(&array.path))?;

            for dim in dims {
                let key = coordinate_key(array.group_prefix(), dim);
                pending.entry(key.clone()).or_insert_with(|| PendingCoordinate {
                    key,
                    dimension: dim.clone(),
                    referenced_by: array.path.clone(),
                });
            }
        }

        debug!(
            arrays = arrays.len(),
            dimensions = pending.len(),
            "Resolving coordinates"
        );

        let axes: Vec<(String, AnyAxis)> = stream::iter(pending.into_values())
            .map(|coord| self.fetch_axis(coord))
            .buffer_unordered(self.config.max_concurrent_fetches)
            .try_collect()
            .await?;

        let map: CoordinateMap = axes.into_iter().collect();
        info!(dimensions = map.len(), "Resolved coordinate map");
        Ok(map)
    }

    async fn fetch_axis(&self, coord: PendingCoordinate) -> Result<(String, AnyAxis)> {
        let descriptor = self
            .store
            .describe(&coord.key)
            .await?
            .ok_or_else(|| CoordError::resolution(&coord.key, &coord.referenced_by))?;

        let values = self.store.fetch(&coord.key).await?;
        let axis = self.build_axis(&coord, &descriptor, values)?;

        debug!(
            key = %coord.key,
            kind = %axis.kind(),
            len = axis.len(),
            "Built coordinate axis"
        );
        Ok((coord.key, axis))
    }

    fn build_axis(
        &self,
        coord: &PendingCoordinate,
        descriptor: &ArrayDescriptor,
        values: CoordinateValues,
    ) -> Result<AnyAxis> {
        let units = descriptor.units();
        let is_time = self.config.time_rule.is_time_axis(&coord.dimension, units);

        if is_time && values.is_text() {
            warn!(
                key = %coord.key,
                "Time dimension holds strings, indexing it as categorical"
            );
        }

        Ok(match (values, units) {
            (CoordinateValues::Text(labels), _) => CategoricalAxis::categorical(labels).into(),
            (
                CoordinateValues::FixedWidth {
                    bytes,
                    width,
                    encoding,
                },
                _,
            ) => CategoricalAxis::from_fixed_width(&bytes, width, encoding)?.into(),
            (CoordinateValues::Int(offsets), Some(units)) if is_time => {
                TimeAxis::time_with_offset(offsets, units, self.naive_offset)?.into()
            }
            (CoordinateValues::Float(raw), Some(units)) if is_time => {
                let offsets = truncate_offsets(&coord.key, &raw)?;
                TimeAxis::time_with_offset(offsets, units, self.naive_offset)?.into()
            }
            (CoordinateValues::Int(v), _) => {
                let inexact = v.iter().filter(|x| x.unsigned_abs() > MAX_EXACT_INT).count();
                if inexact > 0 {
                    warn!(
                        key = %coord.key,
                        inexact,
                        "Integer coordinates beyond 2^53 lose precision as f64"
                    );
                }
                NumericAxis::numeric(v.into_iter().map(|x| x as f64).collect::<Vec<_>>()).into()
            }
            (CoordinateValues::Float(v), _) => NumericAxis::numeric(v).into(),
        })
    }
}

/// Largest magnitude an integer coordinate keeps exactly once held as f64.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Convert float time offsets to integers, truncating toward zero.
fn truncate_offsets(key: &str, raw: &[f64]) -> Result<Vec<i64>> {
    if let Some(bad) = raw.iter().find(|v| !v.is_finite()) {
        return Err(CoordError::OutOfRange(format!(
            "non-finite time offset {} in '{}'",
            bad, key
        )));
    }
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if let Some(bad) = raw
        .iter()
        .find(|v| v.trunc() < i64::MIN as f64 || v.trunc() >= i64::MAX as f64)
    {
        return Err(CoordError::OutOfRange(format!(
            "time offset {} in '{}' does not fit in 64 bits",
            bad, key
        )));
    }

    let fractional = raw.iter().filter(|v| v.fract() != 0.0).count();
    if fractional > 0 {
        warn!(
            key = %key,
            fractional,
            "Truncating fractional time offsets toward zero"
        );
    }
    Ok(raw.iter().map(|v| v.trunc() as i64).collect())
}
