//! Zarr V2 fixed-width string arrays (numpy `<U<n>`, `>U<n>`, `|S<n>`).
//!
//! `zarrs` does not map these data types, so label coordinates written by
//! xarray are read here straight from the store: `.zarray` is parsed, every
//! chunk is fetched and decompressed, and the raw buffer is handed back as
//! [`CoordinateValues::FixedWidth`].

use std::io::Read;
use std::sync::Arc;

use flate2::read::{GzDecoder, ZlibDecoder};
use serde::Deserialize;
use serde_json::{Map, Value};
use zarrs::storage::{ReadableStorageTraits, StoreKey};

use super::{dimension_names_from_attributes, ArrayDescriptor, CoordinateValues};
use crate::axis::FixedWidthEncoding;
use crate::error::{CoordError, Result};

/// The parts of a V2 `.zarray` document this reader needs.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct V2ArrayMetadata {
    pub zarr_format: u32,
    pub shape: Vec<u64>,
    pub chunks: Vec<u64>,
    pub dtype: Value,
    pub compressor: Option<V2Codec>,
    #[serde(default)]
    pub filters: Option<Vec<V2Codec>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct V2Codec {
    pub id: String,
}

/// A V2 array holding fixed-width strings.
#[derive(Debug, Clone)]
pub(crate) struct FixedWidthArray {
    path: String,
    metadata: V2ArrayMetadata,
    encoding: FixedWidthEncoding,
    width: usize,
    attributes: Map<String, Value>,
}

/// Store key for `name` inside the node at `path`.
fn node_key(path: &str, name: &str) -> Result<StoreKey> {
    let prefix = path.trim_matches('/');
    let key = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    };
    StoreKey::new(key.clone()).map_err(|e| CoordError::store(format!("{}: {}", key, e)))
}

fn get<S>(storage: &Arc<S>, path: &str, name: &str) -> Result<Option<Vec<u8>>>
where
    S: ReadableStorageTraits + ?Sized,
{
    let key = node_key(path, name)?;
    storage
        .get(&key)
        .map(|bytes| bytes.map(|b| b.to_vec()))
        .map_err(|e| CoordError::store(format!("{}: {}", key.as_str(), e)))
}

impl FixedWidthArray {
    /// Open `path` when it is a V2 array with a fixed-width string dtype.
    ///
    /// Returns `None` for anything else (V3 arrays, groups, other dtypes), so
    /// callers fall back to `zarrs`.
    pub fn open<S>(storage: &Arc<S>, path: &str) -> Result<Option<Self>>
    where
        S: ReadableStorageTraits + ?Sized,
    {
        let Some(raw) = get(storage, path, ".zarray")? else {
            return Ok(None);
        };
        let metadata: V2ArrayMetadata = serde_json::from_slice(&raw)
            .map_err(|e| CoordError::store(format!("{}/.zarray: {}", path, e)))?;
        if metadata.zarr_format != 2 {
            return Ok(None);
        }

        let Some((encoding, width)) = metadata
            .dtype
            .as_str()
            .and_then(FixedWidthEncoding::from_numpy_dtype)
        else {
            return Ok(None);
        };

        let attributes = match get(storage, path, ".zattrs")? {
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| CoordError::store(format!("{}/.zattrs: {}", path, e)))?,
            None => Map::new(),
        };

        Ok(Some(Self {
            path: path.to_string(),
            metadata,
            encoding,
            width,
            attributes,
        }))
    }

    pub fn descriptor(&self) -> ArrayDescriptor {
        ArrayDescriptor {
            path: self.path.clone(),
            shape: self.metadata.shape.clone(),
            dtype: self
                .metadata
                .dtype
                .as_str()
                .unwrap_or_default()
                .to_string(),
            dimension_names: dimension_names_from_attributes(&self.attributes),
            attributes: self.attributes.clone(),
        }
    }

    /// Read the whole 1-D array as an undecoded fixed-width buffer.
    pub fn fetch<S>(&self, storage: &Arc<S>) -> Result<CoordinateValues>
    where
        S: ReadableStorageTraits + ?Sized,
    {
        let (&len, &chunk_len) = match (
            self.metadata.shape.as_slice(),
            self.metadata.chunks.as_slice(),
        ) {
            ([len], [chunk_len]) if *chunk_len > 0 => (len, chunk_len),
            _ => {
                return Err(CoordError::UnsupportedShape {
                    path: self.path.clone(),
                    shape: self.metadata.shape.clone(),
                })
            }
        };
        if let Some(filter) = self.metadata.filters.iter().flatten().next() {
            return Err(CoordError::UnsupportedDataType {
                path: self.path.clone(),
                dtype: format!(
                    "{} with filter '{}'",
                    self.metadata.dtype.as_str().unwrap_or_default(),
                    filter.id
                ),
            });
        }

        let item = self.encoding.item_size(self.width);
        let chunk_bytes = usize::try_from(chunk_len)
            .ok()
            .and_then(|n| n.checked_mul(item))
            .ok_or_else(|| CoordError::OutOfRange(format!("chunk size of '{}'", self.path)))?;
        let total = usize::try_from(len)
            .ok()
            .and_then(|n| n.checked_mul(item))
            .ok_or_else(|| CoordError::OutOfRange(format!("size of '{}'", self.path)))?;

        let mut bytes = Vec::with_capacity(total);
        for chunk in 0..len.div_ceil(chunk_len) {
            match get(storage, &self.path, &chunk.to_string())? {
                Some(raw) => {
                    let mut decoded = self.decompress(raw)?;
                    // Edge chunks are stored at full size.
                    decoded.resize(chunk_bytes, 0);
                    bytes.extend_from_slice(&decoded);
                }
                // Missing chunks hold the (empty string) fill value.
                None => bytes.resize(bytes.len() + chunk_bytes, 0),
            }
        }
        bytes.truncate(total);

        tracing::debug!(
            path = %self.path,
            elements = len,
            width = self.width,
            "Fetched fixed-width string coordinate"
        );

        Ok(CoordinateValues::FixedWidth {
            bytes,
            width: self.width,
            encoding: self.encoding,
        })
    }

    fn decompress(&self, raw: Vec<u8>) -> Result<Vec<u8>> {
        let Some(codec) = &self.metadata.compressor else {
            return Ok(raw);
        };

        let mut out = Vec::new();
        let read = match codec.id.as_str() {
            "zlib" => ZlibDecoder::new(raw.as_slice()).read_to_end(&mut out),
            "gzip" => GzDecoder::new(raw.as_slice()).read_to_end(&mut out),
            other => {
                return Err(CoordError::store(format!(
                    "{}: compressor '{}' is not supported for fixed-width strings",
                    self.path, other
                )))
            }
        };
        read.map_err(|e| CoordError::store(format!("{}: {}", self.path, e)))?;
        Ok(out)
    }
}
