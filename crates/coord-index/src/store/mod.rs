//! Chunked-array store abstraction consumed by the resolver.

mod fixed_width;
mod memory;
mod zarr;

pub use memory::MemoryStore;
pub use zarr::{SelectedRegion, ZarrCoordinateStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::axis::FixedWidthEncoding;
use crate::error::Result;

/// xarray convention for naming array dimensions in attributes.
pub const ARRAY_DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// CF attribute holding time units.
pub const UNITS_ATTR: &str = "units";

/// Metadata describing one array in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDescriptor {
    /// Absolute node path, e.g. `/group/temperature`.
    pub path: String,
    pub shape: Vec<u64>,
    /// Store-specific data type name (e.g. `float32`, `string`).
    pub dtype: String,
    /// Ordered dimension names, `None` when the array does not declare them.
    pub dimension_names: Option<Vec<String>>,
    pub attributes: Map<String, Value>,
}

impl ArrayDescriptor {
    /// Build a descriptor taking dimension names from `_ARRAY_DIMENSIONS`.
    pub fn from_attributes(
        path: impl Into<String>,
        shape: Vec<u64>,
        dtype: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        let dimension_names = dimension_names_from_attributes(&attributes);
        Self {
            path: normalize_path(&path.into()),
            shape,
            dtype: dtype.into(),
            dimension_names,
            attributes,
        }
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Path of the enclosing group without a trailing slash (`""` at the root).
    pub fn group_prefix(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[..i],
            None => "",
        }
    }

    /// The CF `units` attribute, when present.
    pub fn units(&self) -> Option<&str> {
        self.attributes.get(UNITS_ATTR).and_then(|v| v.as_str())
    }
}

/// Read `_ARRAY_DIMENSIONS` as a list of strings.
pub fn dimension_names_from_attributes(attributes: &Map<String, Value>) -> Option<Vec<String>> {
    attributes
        .get(ARRAY_DIMENSIONS_ATTR)
        .and_then(|v| v.as_array())
        .and_then(|list| {
            list.iter()
                .map(|x| x.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
        })
}

/// Full contents of a coordinate array.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateValues {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    /// Undecoded fixed-width strings; `width` is in characters.
    FixedWidth {
        bytes: Vec<u8>,
        width: usize,
        encoding: FixedWidthEncoding,
    },
}

impl CoordinateValues {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_) | Self::FixedWidth { .. })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::FixedWidth {
                bytes,
                width,
                encoding,
            } => match encoding.item_size(*width) {
                0 => 0,
                item => bytes.len() / item,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The operations the engine needs from a chunked-array store.
#[async_trait]
pub trait CoordinateStore: Send + Sync {
    /// Every array at or beneath `group`.
    async fn list_arrays(&self, group: &str) -> Result<Vec<ArrayDescriptor>>;

    /// Describe the array at `path`, `None` when no array exists there.
    async fn describe(&self, path: &str) -> Result<Option<ArrayDescriptor>>;

    /// Fetch the full contents of the 1-D array at `path`.
    async fn fetch(&self, path: &str) -> Result<CoordinateValues>;
}

/// Normalize a node path to start with `/` and carry no trailing slash.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Whether `path` lies at or beneath `group`.
pub(crate) fn is_within(path: &str, group: &str) -> bool {
    let group = normalize_path(group);
    group == "/" || path == group || path.starts_with(&format!("{}/", group))
}
