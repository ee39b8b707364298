//! Per-array selection over resolved coordinate axes.

use crate::axis::{AnyAxis, Selection, ZIndex};
use crate::error::{CoordError, Result};
use crate::resolver::CoordinateMap;
use crate::store::ArrayDescriptor;

/// One data array together with an axis per dimension, in dimension order.
///
/// Selections narrow a single dimension and return a new view; the others
/// keep their current selection.
#[derive(Debug, Clone)]
pub struct ArrayView {
    path: String,
    dimensions: Vec<(String, AnyAxis)>,
}

impl ArrayView {
    /// Bind `array`'s dimensions to their axes in `coords`.
    pub fn new(array: &ArrayDescriptor, coords: &CoordinateMap) -> Result<Self> {
        let names = array
            .dimension_names
            .as_ref()
            .ok_or_else(|| CoordError::missing_dimensions(&array.path))?;

        let dimensions = names
            .iter()
            .map(|dim| {
                coords
                    .for_dimension(array, dim)
                    .cloned()
                    .map(|axis| (dim.clone(), axis))
                    .ok_or_else(|| {
                        CoordError::resolution(
                            crate::resolver::coordinate_key(array.group_prefix(), dim),
                            &array.path,
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: array.path.clone(),
            dimensions,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dimension_names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(|(name, _)| name.as_str())
    }

    pub fn axis(&self, dimension: &str) -> Option<&AnyAxis> {
        self.dimensions
            .iter()
            .find(|(name, _)| name == dimension)
            .map(|(_, axis)| axis)
    }

    pub fn axes(&self) -> impl Iterator<Item = (&str, &AnyAxis)> {
        self.dimensions.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Label selection on one dimension, values parsed in its domain.
    pub fn sel(&self, dimension: &str, predicate: &Selection<String>) -> Result<Self> {
        self.replace(dimension, |axis| axis.sel_str(predicate))
    }

    /// Position selection on one dimension.
    pub fn isel(&self, dimension: &str, predicate: &Selection<usize>) -> Result<Self> {
        self.replace(dimension, |axis| Ok(axis.isel(predicate)))
    }

    fn replace(
        &self,
        dimension: &str,
        f: impl FnOnce(&AnyAxis) -> Result<AnyAxis>,
    ) -> Result<Self> {
        let i = self
            .dimensions
            .iter()
            .position(|(name, _)| name == dimension)
            .ok_or_else(|| {
                CoordError::invalid_selection(
                    dimension,
                    format!("a dimension of '{}'", self.path),
                )
            })?;

        let mut dimensions = self.dimensions.clone();
        dimensions[i].1 = f(&self.dimensions[i].1)?;
        Ok(Self {
            path: self.path.clone(),
            dimensions,
        })
    }

    /// Storage indices for the current selection, in dimension order.
    pub fn zindices(&self) -> Vec<ZIndex> {
        self.dimensions.iter().map(|(_, axis)| axis.zindex()).collect()
    }

    /// Whether any dimension's selection is empty.
    pub fn is_empty_selection(&self) -> bool {
        self.dimensions.iter().any(|(_, axis)| axis.is_empty())
    }

    /// Number of elements the current selection covers.
    pub fn selected_len(&self) -> u64 {
        self.zindices().iter().map(ZIndex::len).product()
    }
}
