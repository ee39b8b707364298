//! In-memory store with fetch accounting.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{is_within, normalize_path, ArrayDescriptor, CoordinateStore, CoordinateValues};
use crate::error::{CoordError, Result};

struct Entry {
    descriptor: ArrayDescriptor,
    values: Option<CoordinateValues>,
    fetches: AtomicUsize,
}

/// A store held entirely in memory.
///
/// Counts fetches per path and can be told to fail specific fetches, which
/// makes it the fixture of choice for resolver tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Entry>,
    failing: BTreeSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data array described by `attributes` whose contents are never fetched.
    pub fn insert_array(
        &mut self,
        path: &str,
        shape: Vec<u64>,
        dtype: &str,
        attributes: Map<String, Value>,
    ) -> &mut Self {
        let descriptor = ArrayDescriptor::from_attributes(path, shape, dtype, attributes);
        self.entries.insert(
            descriptor.path.clone(),
            Entry {
                descriptor,
                values: None,
                fetches: AtomicUsize::new(0),
            },
        );
        self
    }

    /// Add a 1-D coordinate array named after its own dimension.
    pub fn insert_coordinate(
        &mut self,
        path: &str,
        values: CoordinateValues,
        mut attributes: Map<String, Value>,
    ) -> &mut Self {
        let path = normalize_path(path);
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        attributes
            .entry(super::ARRAY_DIMENSIONS_ATTR)
            .or_insert_with(|| Value::from(vec![name]));
        let dtype = match &values {
            CoordinateValues::Int(_) => "int64",
            CoordinateValues::Float(_) => "float64",
            CoordinateValues::Text(_) => "string",
            CoordinateValues::FixedWidth { .. } => "fixed_string",
        };
        let descriptor =
            ArrayDescriptor::from_attributes(&path, vec![values.len() as u64], dtype, attributes);
        self.entries.insert(
            path,
            Entry {
                descriptor,
                values: Some(values),
                fetches: AtomicUsize::new(0),
            },
        );
        self
    }

    /// Make every fetch of `path` fail with a store error.
    pub fn fail_fetch(&mut self, path: &str) -> &mut Self {
        self.failing.insert(normalize_path(path));
        self
    }

    /// How many times `path` has been fetched.
    pub fn fetch_count(&self, path: &str) -> usize {
        self.entries
            .get(&normalize_path(path))
            .map_or(0, |e| e.fetches.load(Ordering::SeqCst))
    }

    /// Total fetches across all paths.
    pub fn total_fetches(&self) -> usize {
        self.entries
            .values()
            .map(|e| e.fetches.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl CoordinateStore for MemoryStore {
    async fn list_arrays(&self, group: &str) -> Result<Vec<ArrayDescriptor>> {
        Ok(self
            .entries
            .iter()
            .filter(|(path, _)| is_within(path, group))
            .map(|(_, e)| e.descriptor.clone())
            .collect())
    }

    async fn describe(&self, path: &str) -> Result<Option<ArrayDescriptor>> {
        Ok(self
            .entries
            .get(&normalize_path(path))
            .map(|e| e.descriptor.clone()))
    }

    async fn fetch(&self, path: &str) -> Result<CoordinateValues> {
        let path = normalize_path(path);
        let entry = self
            .entries
            .get(&path)
            .ok_or_else(|| CoordError::NotFound(path.clone()))?;
        entry.fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&path) {
            return Err(CoordError::store(format!("fetch of '{}' failed", path)));
        }

        entry
            .values
            .clone()
            .ok_or_else(|| CoordError::store(format!("'{}' has no stored values", path)))
    }
}
