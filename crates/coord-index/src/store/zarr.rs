//! Zarr store adapter built on `zarrs`.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use zarrs::array::{Array, ArrayCreateError, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::node::{Node, NodeMetadata};
use zarrs::storage::{ListableStorageTraits, ReadableStorageTraits};
use zarrs_filesystem::FilesystemStore;

use super::fixed_width::FixedWidthArray;
use super::{
    dimension_names_from_attributes, normalize_path, ArrayDescriptor, CoordinateStore,
    CoordinateValues,
};
use crate::axis::ZIndex;
use crate::error::{CoordError, Result};

/// Data read for a selection, row-major over the selected ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRegion {
    pub data: Vec<f64>,
    /// Extent of the read along every dimension, scalar dimensions included.
    pub shape: Vec<u64>,
    /// The indices the region was read with.
    pub indices: Vec<ZIndex>,
}

impl SelectedRegion {
    /// Shape with scalar-indexed dimensions dropped.
    pub fn squeezed_shape(&self) -> Vec<u64> {
        self.shape
            .iter()
            .zip(&self.indices)
            .filter(|(_, idx)| !matches!(idx, ZIndex::Scalar(_)))
            .map(|(&n, _)| n)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// [`CoordinateStore`] over any listable `zarrs` storage.
///
/// `zarrs` reads are synchronous, so every operation runs on the blocking
/// pool; concurrent resolver fetches therefore proceed in parallel.
pub struct ZarrCoordinateStore<S: ?Sized> {
    storage: Arc<S>,
}

impl ZarrCoordinateStore<FilesystemStore> {
    /// Open a Zarr hierarchy rooted at a local directory.
    pub fn filesystem(path: impl AsRef<Path>) -> Result<Self> {
        let store = FilesystemStore::new(path.as_ref())
            .map_err(|e| CoordError::store(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(Self::new(Arc::new(store)))
    }
}

impl<S> ZarrCoordinateStore<S>
where
    S: ReadableStorageTraits + ListableStorageTraits + Send + Sync + ?Sized + 'static,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<S>) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || f(storage))
            .await
            .map_err(|e| CoordError::store(format!("blocking task failed: {}", e)))?
    }

    /// Read the region selected by one index per dimension.
    ///
    /// Returns `None` when any dimension's selection is empty.
    pub async fn read_selection(
        &self,
        path: &str,
        indices: &[ZIndex],
    ) -> Result<Option<SelectedRegion>> {
        let path = normalize_path(path);
        let indices = indices.to_vec();
        self.blocking(move |storage| read_selection_sync(&storage, &path, indices))
            .await
    }
}

#[async_trait]
impl<S> CoordinateStore for ZarrCoordinateStore<S>
where
    S: ReadableStorageTraits + ListableStorageTraits + Send + Sync + ?Sized + 'static,
{
    async fn list_arrays(&self, group: &str) -> Result<Vec<ArrayDescriptor>> {
        let group = normalize_path(group);
        self.blocking(move |storage| {
            let node = Node::open(&storage, &group)
                .map_err(|e| CoordError::store(format!("{}: {}", group, e)))?;
            let mut paths = Vec::new();
            collect_array_paths(&node, &mut paths);

            let mut arrays = Vec::with_capacity(paths.len());
            for path in paths {
                if let Some(descriptor) = describe_sync(&storage, &path)? {
                    arrays.push(descriptor);
                }
            }
            Ok(arrays)
        })
        .await
    }

    async fn describe(&self, path: &str) -> Result<Option<ArrayDescriptor>> {
        let path = normalize_path(path);
        self.blocking(move |storage| describe_sync(&storage, &path))
            .await
    }

    async fn fetch(&self, path: &str) -> Result<CoordinateValues> {
        let path = normalize_path(path);
        self.blocking(move |storage| {
            if let Some(strings) = FixedWidthArray::open(&storage, &path)? {
                return strings.fetch(&storage);
            }

            let array = open_array(&storage, &path)?;
            if array.shape().len() != 1 {
                return Err(CoordError::UnsupportedShape {
                    path,
                    shape: array.shape().to_vec(),
                });
            }
            let subset = ArraySubset::new_with_shape(array.shape().to_vec());
            let values = retrieve_values(&array, &subset, &path)?;

            tracing::debug!(path = %path, elements = values.len(), "Fetched coordinate array");
            Ok(values)
        })
        .await
    }
}

fn collect_array_paths(node: &Node, out: &mut Vec<String>) {
    if let NodeMetadata::Array(_) = node.metadata() {
        out.push(node.path().as_str().to_string());
    }
    for child in node.children() {
        collect_array_paths(child, out);
    }
}

fn open_array<S>(storage: &Arc<S>, path: &str) -> Result<Array<S>>
where
    S: ReadableStorageTraits + ?Sized + 'static,
{
    Array::open(Arc::clone(storage), path).map_err(|e| match e {
        ArrayCreateError::MissingMetadata => CoordError::NotFound(path.to_string()),
        other => CoordError::store(format!("{}: {}", path, other)),
    })
}

fn describe_sync<S>(storage: &Arc<S>, path: &str) -> Result<Option<ArrayDescriptor>>
where
    S: ReadableStorageTraits + ?Sized + 'static,
{
    if let Some(strings) = FixedWidthArray::open(storage, path)? {
        return Ok(Some(strings.descriptor()));
    }

    let array = match open_array(storage, path) {
        Ok(array) => array,
        Err(CoordError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let attributes = array.attributes().clone();
    let dimension_names = dimension_names_from_attributes(&attributes)
        .or_else(|| metadata_dimension_names(&array));

    Ok(Some(ArrayDescriptor {
        path: path.to_string(),
        shape: array.shape().to_vec(),
        dtype: array.data_type().name(),
        dimension_names,
        attributes,
    }))
}

/// Zarr V3 `dimension_names`; unnamed dimensions become `dim_<i>`.
fn metadata_dimension_names<S: ?Sized>(array: &Array<S>) -> Option<Vec<String>> {
    let metadata = serde_json::to_value(array.metadata()).ok()?;
    let names = metadata.get("dimension_names")?.as_array()?;
    Some(
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                n.as_str()
                    .map(String::from)
                    .unwrap_or_else(|| format!("dim_{}", i))
            })
            .collect(),
    )
}

macro_rules! retrieve {
    ($array:expr, $subset:expr, $t:ty) => {
        $array
            .retrieve_array_subset_elements::<$t>($subset)
            .map_err(|e| CoordError::store(e.to_string()))?
    };
}

fn retrieve_values<S>(array: &Array<S>, subset: &ArraySubset, path: &str) -> Result<CoordinateValues>
where
    S: ReadableStorageTraits + ?Sized + 'static,
{
    let ints = |v: Vec<i64>| CoordinateValues::Int(v);
    Ok(match array.data_type() {
        DataType::Int8 => ints(retrieve!(array, subset, i8).into_iter().map(i64::from).collect()),
        DataType::Int16 => ints(retrieve!(array, subset, i16).into_iter().map(i64::from).collect()),
        DataType::Int32 => ints(retrieve!(array, subset, i32).into_iter().map(i64::from).collect()),
        DataType::Int64 => ints(retrieve!(array, subset, i64)),
        DataType::UInt8 => ints(retrieve!(array, subset, u8).into_iter().map(i64::from).collect()),
        DataType::UInt16 => ints(retrieve!(array, subset, u16).into_iter().map(i64::from).collect()),
        DataType::UInt32 => ints(retrieve!(array, subset, u32).into_iter().map(i64::from).collect()),
        DataType::UInt64 => ints(
            retrieve!(array, subset, u64)
                .into_iter()
                .map(|v| {
                    i64::try_from(v).map_err(|_| {
                        CoordError::OutOfRange(format!("{} in '{}' exceeds i64", v, path))
                    })
                })
                .collect::<Result<_>>()?,
        ),
        DataType::Float32 => CoordinateValues::Float(
            retrieve!(array, subset, f32).into_iter().map(f64::from).collect(),
        ),
        DataType::Float64 => CoordinateValues::Float(retrieve!(array, subset, f64)),
        DataType::String => CoordinateValues::Text(retrieve!(array, subset, String)),
        other => {
            return Err(CoordError::UnsupportedDataType {
                path: path.to_string(),
                dtype: other.name(),
            })
        }
    })
}

fn read_selection_sync<S>(
    storage: &Arc<S>,
    path: &str,
    indices: Vec<ZIndex>,
) -> Result<Option<SelectedRegion>>
where
    S: ReadableStorageTraits + ?Sized + 'static,
{
    let array = open_array(storage, path)?;
    if indices.len() != array.shape().len() {
        return Err(CoordError::invalid_selection(
            format!("{} indices", indices.len()),
            format!("one index per dimension of '{}' ({})", path, array.shape().len()),
        ));
    }

    let Some(ranges) = indices
        .iter()
        .map(ZIndex::as_range)
        .collect::<Option<Vec<Range<u64>>>>()
    else {
        tracing::debug!(path = %path, "Selection is empty, skipping read");
        return Ok(None);
    };

    let shape: Vec<u64> = ranges.iter().map(|r| r.end - r.start).collect();
    let subset = ArraySubset::new_with_ranges(&ranges);
    let data = match retrieve_values(&array, &subset, path)? {
        CoordinateValues::Int(v) => v.into_iter().map(|x| x as f64).collect(),
        CoordinateValues::Float(v) => v,
        _ => {
            return Err(CoordError::UnsupportedDataType {
                path: path.to_string(),
                dtype: array.data_type().name(),
            })
        }
    };

    tracing::debug!(
        path = %path,
        shape = ?shape,
        elements = data.len(),
        "Read selected region"
    );

    Ok(Some(SelectedRegion {
        data,
        shape,
        indices,
    }))
}
