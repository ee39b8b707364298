//! Test data generation utilities.
//!
//! Writes small Zarr hierarchies with known coordinates for unit and
//! integration tests.
//!
//! | Node | Shape | Dimensions | Contents |
//! |------|-------|------------|----------|
//! | `/time` | 4 | `time` | int64 `[0, 5, 10, 50]`, `minutes since 2015-01-01 16:00:00` |
//! | `/lat` | 3 | `lat` | float64 `[36, 37, 38]` |
//! | `/lon` | 2 | `lon` | float64 `[-124, -123]` |
//! | `/temperature` | 4x3x2 | `time, lat, lon` | `t*100 + y*10 + x` |
//! | `/band` | 2 | `band` | vlen-utf8 `["red", "nir"]` |
//! | `/reflectance` | 2x3x2 | `band, lat, lon` | `b + 0.5` |
//! | `/regional/x` | 4 | `x` | float64 `[0, 250, 500, 750]` |
//! | `/regional/y` | 2 | `y` | float64 `[1000, 2000]` |
//! | `/regional/field` | 2x4 | `y, x` (Zarr V3 `dimension_names`) | `y*10 + x` |
//!
//! [`write_labels_v2_store`] writes a Zarr V2 hierarchy the way xarray stores
//! label coordinates, as numpy fixed-width strings:
//!
//! | Node | dtype | Dimensions | Contents |
//! |------|-------|------------|----------|
//! | `/band` | `<U4`, chunks of 2, uncompressed | `band` | `["red", "nir", "swir"]` |
//! | `/station` | `\|S6`, zlib | `station` | `["KSEA", "KPDX"]` |
//! | `/lat` | `<f8` | `lat` | `[45, 46]` |
//! | `/X` | `<f4` 3x2 | `band, lat` | zeros |
//! | `/Y` | `<f4` 2 | `station` | zeros |

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};
use zarrs::array::{ArrayBuilder, DataType, Element, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

pub const TIME_OFFSETS: [i64; 4] = [0, 5, 10, 50];
pub const TIME_UNITS: &str = "minutes since 2015-01-01 16:00:00";
pub const LATITUDES: [f64; 3] = [36.0, 37.0, 38.0];
pub const LONGITUDES: [f64; 2] = [-124.0, -123.0];
pub const REGIONAL_X: [f64; 4] = [0.0, 250.0, 500.0, 750.0];
pub const REGIONAL_Y: [f64; 2] = [1000.0, 2000.0];
pub const BANDS: [&str; 2] = ["red", "nir"];
pub const V2_BANDS: [&str; 3] = ["red", "nir", "swir"];
pub const V2_STATIONS: [&str; 2] = ["KSEA", "KPDX"];

type FixtureResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Value of `/temperature` at `(t, y, x)`.
pub fn temperature_at(t: usize, y: usize, x: usize) -> f32 {
    (t * 100 + y * 10 + x) as f32
}

/// Value of `/regional/field` at `(y, x)`.
pub fn regional_at(y: usize, x: usize) -> f32 {
    (y * 10 + x) as f32
}

fn dims_attr(dims: &[&str]) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("_ARRAY_DIMENSIONS".to_string(), json!(dims));
    attrs
}

fn write_group(store: &Arc<FilesystemStore>, path: &str, attrs: Map<String, Value>) -> FixtureResult<()> {
    let group = GroupBuilder::new()
        .attributes(attrs)
        .build(store.clone(), path)?;
    group.store_metadata()?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_array<T: Element>(
    store: &Arc<FilesystemStore>,
    path: &str,
    shape: Vec<u64>,
    data_type: DataType,
    fill_value: FillValue,
    attrs: Map<String, Value>,
    dimension_names: Option<&[&str]>,
    data: &[T],
) -> FixtureResult<()> {
    let mut builder = ArrayBuilder::new(
        shape.clone(),
        data_type,
        shape.clone().try_into()?,
        fill_value,
    );
    builder.attributes(attrs);
    if let Some(names) = dimension_names {
        builder.dimension_names(Some(names.iter().copied()));
    }

    let array = builder.build(store.clone(), path)?;
    array.store_metadata()?;

    let subset = ArraySubset::new_with_shape(shape);
    array.store_array_subset_elements(&subset, data)?;
    Ok(())
}

/// Write the weather fixture described in the module docs under `path`.
pub fn write_weather_store(path: &Path) -> FixtureResult<()> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);

    write_group(&store, "/", {
        let mut attrs = Map::new();
        attrs.insert("title".to_string(), json!("coordinate fixture"));
        attrs
    })?;

    write_array(
        &store,
        "/time",
        vec![TIME_OFFSETS.len() as u64],
        DataType::Int64,
        FillValue::from(0i64),
        {
            let mut attrs = dims_attr(&["time"]);
            attrs.insert("units".to_string(), json!(TIME_UNITS));
            attrs.insert("calendar".to_string(), json!("proleptic_gregorian"));
            attrs
        },
        None,
        &TIME_OFFSETS,
    )?;

    write_array(
        &store,
        "/lat",
        vec![LATITUDES.len() as u64],
        DataType::Float64,
        FillValue::from(f64::NAN),
        {
            let mut attrs = dims_attr(&["lat"]);
            attrs.insert("units".to_string(), json!("degrees_north"));
            attrs
        },
        None,
        &LATITUDES,
    )?;

    write_array(
        &store,
        "/lon",
        vec![LONGITUDES.len() as u64],
        DataType::Float64,
        FillValue::from(f64::NAN),
        {
            let mut attrs = dims_attr(&["lon"]);
            attrs.insert("units".to_string(), json!("degrees_east"));
            attrs
        },
        None,
        &LONGITUDES,
    )?;

    let (nt, ny, nx) = (TIME_OFFSETS.len(), LATITUDES.len(), LONGITUDES.len());
    let mut temperature = Vec::with_capacity(nt * ny * nx);
    for t in 0..nt {
        for y in 0..ny {
            for x in 0..nx {
                temperature.push(temperature_at(t, y, x));
            }
        }
    }
    write_array(
        &store,
        "/temperature",
        vec![nt as u64, ny as u64, nx as u64],
        DataType::Float32,
        FillValue::from(f32::NAN),
        {
            let mut attrs = dims_attr(&["time", "lat", "lon"]);
            attrs.insert("units".to_string(), json!("K"));
            attrs
        },
        None,
        &temperature,
    )?;

    let bands: Vec<String> = BANDS.iter().map(|b| b.to_string()).collect();
    write_array(
        &store,
        "/band",
        vec![bands.len() as u64],
        DataType::String,
        FillValue::new(Vec::new()),
        dims_attr(&["band"]),
        None,
        &bands,
    )?;

    let nb = bands.len();
    let mut reflectance = Vec::with_capacity(nb * ny * nx);
    for b in 0..nb {
        for _ in 0..ny * nx {
            reflectance.push(b as f32 + 0.5);
        }
    }
    write_array(
        &store,
        "/reflectance",
        vec![nb as u64, ny as u64, nx as u64],
        DataType::Float32,
        FillValue::from(f32::NAN),
        dims_attr(&["band", "lat", "lon"]),
        None,
        &reflectance,
    )?;

    write_group(&store, "/regional", Map::new())?;

    write_array(
        &store,
        "/regional/x",
        vec![REGIONAL_X.len() as u64],
        DataType::Float64,
        FillValue::from(f64::NAN),
        Map::new(),
        Some(&["x"]),
        &REGIONAL_X,
    )?;

    write_array(
        &store,
        "/regional/y",
        vec![REGIONAL_Y.len() as u64],
        DataType::Float64,
        FillValue::from(f64::NAN),
        Map::new(),
        Some(&["y"]),
        &REGIONAL_Y,
    )?;

    let (ny, nx) = (REGIONAL_Y.len(), REGIONAL_X.len());
    let mut field = Vec::with_capacity(ny * nx);
    for y in 0..ny {
        for x in 0..nx {
            field.push(regional_at(y, x));
        }
    }
    write_array(
        &store,
        "/regional/field",
        vec![ny as u64, nx as u64],
        DataType::Float32,
        FillValue::from(f32::NAN),
        Map::new(),
        Some(&["y", "x"]),
        &field,
    )?;

    tracing::debug!(path = %path.display(), "Wrote weather fixture");
    Ok(())
}

/// Write a store whose only array declares no dimension names.
pub fn write_undimensioned_store(path: &Path) -> FixtureResult<()> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);
    write_group(&store, "/", Map::new())?;
    write_array(
        &store,
        "/orphan",
        vec![3],
        DataType::Float32,
        FillValue::from(f32::NAN),
        Map::new(),
        None,
        &[1.0f32, 2.0, 3.0],
    )
}

/// Write a store whose `/field` names a `depth` dimension with no coordinate.
pub fn write_dangling_store(path: &Path) -> FixtureResult<()> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);
    write_group(&store, "/", Map::new())?;
    write_array(
        &store,
        "/lat",
        vec![LATITUDES.len() as u64],
        DataType::Float64,
        FillValue::from(f64::NAN),
        dims_attr(&["lat"]),
        None,
        &LATITUDES,
    )?;
    write_array(
        &store,
        "/field",
        vec![LATITUDES.len() as u64, 2],
        DataType::Float32,
        FillValue::from(f32::NAN),
        dims_attr(&["lat", "depth"]),
        None,
        &[0.0f32; 6],
    )
}

fn write_json(path: &Path, value: &Value) -> FixtureResult<()> {
    std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

/// Write one Zarr V2 array node: `.zarray`, `.zattrs` and raw chunk files.
fn write_v2_array(
    root: &Path,
    name: &str,
    zarray: Value,
    dims: &[&str],
    chunks: &[(&str, Vec<u8>)],
) -> FixtureResult<()> {
    let node = root.join(name);
    std::fs::create_dir_all(&node)?;
    write_json(&node.join(".zarray"), &zarray)?;
    write_json(&node.join(".zattrs"), &json!({ "_ARRAY_DIMENSIONS": dims }))?;
    for (key, bytes) in chunks {
        std::fs::write(node.join(key), bytes)?;
    }
    Ok(())
}

/// NUL-padded UTF-32LE encoding of `labels`, `width` characters each.
pub fn utf32le_fixed(labels: &[&str], width: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(labels.len() * width * 4);
    for label in labels {
        let mut chars: Vec<u32> = label.chars().map(u32::from).collect();
        chars.resize(width, 0);
        for c in chars {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
    out
}

/// NUL-padded byte encoding of `labels`, `width` bytes each.
pub fn bytes_fixed(labels: &[&str], width: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(labels.len() * width);
    for label in labels {
        let mut bytes = label.as_bytes().to_vec();
        bytes.resize(width, 0);
        out.extend_from_slice(&bytes);
    }
    out
}

fn zarray(shape: &[u64], chunks: &[u64], dtype: &str, compressor: Value, fill: Value) -> Value {
    json!({
        "zarr_format": 2,
        "shape": shape,
        "chunks": chunks,
        "dtype": dtype,
        "compressor": compressor,
        "fill_value": fill,
        "order": "C",
        "filters": null,
    })
}

/// Write the Zarr V2 label fixture described in the module docs under `path`.
pub fn write_labels_v2_store(path: &Path) -> FixtureResult<()> {
    std::fs::create_dir_all(path)?;
    write_json(&path.join(".zgroup"), &json!({ "zarr_format": 2 }))?;

    // Two chunks of two; the edge chunk is stored at full size.
    write_v2_array(
        path,
        "band",
        zarray(&[3], &[2], "<U4", Value::Null, json!("")),
        &["band"],
        &[
            ("0", utf32le_fixed(&V2_BANDS[..2], 4)),
            ("1", utf32le_fixed(&[V2_BANDS[2], ""], 4)),
        ],
    )?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&bytes_fixed(&V2_STATIONS, 6))?;
    write_v2_array(
        path,
        "station",
        zarray(&[2], &[2], "|S6", json!({"id": "zlib", "level": 1}), json!("")),
        &["station"],
        &[("0", encoder.finish()?)],
    )?;

    let lat: Vec<u8> = [45.0f64, 46.0].iter().flat_map(|v| v.to_le_bytes()).collect();
    write_v2_array(
        path,
        "lat",
        zarray(&[2], &[2], "<f8", Value::Null, json!("NaN")),
        &["lat"],
        &[("0", lat)],
    )?;

    write_v2_array(
        path,
        "X",
        zarray(&[3, 2], &[3, 2], "<f4", Value::Null, json!(0.0)),
        &["band", "lat"],
        &[("0.0", vec![0u8; 3 * 2 * 4])],
    )?;

    write_v2_array(
        path,
        "Y",
        zarray(&[2], &[2], "<f4", Value::Null, json!(0.0)),
        &["station"],
        &[("0", vec![0u8; 2 * 4])],
    )?;

    tracing::debug!(path = %path.display(), "Wrote V2 label fixture");
    Ok(())
}
