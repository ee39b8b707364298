//! Integration test: write a Zarr hierarchy, resolve its coordinates and read
//! selections back through `ZarrCoordinateStore`.

use std::sync::Arc;

use coord_index::testdata::{self, temperature_at};
use coord_index::{
    ArrayView, AxisKind, CoordError, CoordinateResolver, CoordinateStore, CoordinateValues,
    FixedWidthEncoding, ResolverConfig, Selection, ZIndex, ZarrCoordinateStore,
};
use tempfile::TempDir;
use zarrs_filesystem::FilesystemStore;

fn open_fixture() -> (TempDir, Arc<ZarrCoordinateStore<FilesystemStore>>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    testdata::write_weather_store(dir.path()).expect("Failed to write fixture");
    let store = ZarrCoordinateStore::filesystem(dir.path()).expect("Failed to open store");
    (dir, Arc::new(store))
}

fn resolver(
    store: &Arc<ZarrCoordinateStore<FilesystemStore>>,
) -> CoordinateResolver<ZarrCoordinateStore<FilesystemStore>> {
    CoordinateResolver::new(Arc::clone(store), ResolverConfig::default()).unwrap()
}

#[tokio::test]
async fn test_resolve_whole_hierarchy() {
    let (_dir, store) = open_fixture();
    let coords = resolver(&store).resolve("/").await.unwrap();

    assert_eq!(
        coords.keys().collect::<Vec<_>>(),
        vec!["/band", "/lat", "/lon", "/regional/x", "/regional/y", "/time"]
    );

    let time = coords.get("/time").unwrap();
    assert_eq!(time.kind(), AxisKind::Time);
    assert_eq!(
        time.vals_human().unwrap(),
        vec![
            "2015-01-01T16:00:00.000Z",
            "2015-01-01T16:05:00.000Z",
            "2015-01-01T16:10:00.000Z",
            "2015-01-01T16:50:00.000Z",
        ]
    );

    let lat = coords.get("/lat").unwrap().as_numeric().unwrap();
    assert_eq!(lat.vals(), testdata::LATITUDES.to_vec());

    // Dimension names from Zarr V3 metadata.
    assert_eq!(coords.get("/regional/x").unwrap().len(), 4);
}

#[tokio::test]
async fn test_list_and_describe() {
    let (_dir, store) = open_fixture();

    let arrays = store.list_arrays("/regional").await.unwrap();
    let mut paths: Vec<_> = arrays.iter().map(|a| a.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["/regional/field", "/regional/x", "/regional/y"]);

    let temperature = store.describe("/temperature").await.unwrap().unwrap();
    assert_eq!(temperature.shape, vec![4, 3, 2]);
    assert_eq!(
        temperature.dimension_names,
        Some(vec!["time".to_string(), "lat".to_string(), "lon".to_string()])
    );
    assert_eq!(temperature.units(), Some("K"));

    assert!(store.describe("/missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_select_and_read() {
    let (_dir, store) = open_fixture();
    let coords = resolver(&store).resolve_array("/temperature").await.unwrap();
    let descriptor = store.describe("/temperature").await.unwrap().unwrap();

    let view = ArrayView::new(&descriptor, &coords)
        .unwrap()
        .sel(
            "time",
            &"2015-01-01T16:04:00Z..2015-01-01T16:30:00Z".parse().unwrap(),
        )
        .unwrap()
        .sel("lat", &"37".parse().unwrap())
        .unwrap();

    assert_eq!(
        view.zindices(),
        vec![
            ZIndex::Range { start: 1, stop: 3 },
            ZIndex::Scalar(1),
            ZIndex::Range { start: 0, stop: 2 },
        ]
    );

    let region = store
        .read_selection("/temperature", &view.zindices())
        .await
        .unwrap()
        .expect("selection should not be empty");

    assert_eq!(region.shape, vec![2, 1, 2]);
    assert_eq!(region.squeezed_shape(), vec![2, 2]);
    assert_eq!(
        region.data,
        vec![
            temperature_at(1, 1, 0) as f64,
            temperature_at(1, 1, 1) as f64,
            temperature_at(2, 1, 0) as f64,
            temperature_at(2, 1, 1) as f64,
        ]
    );
}

#[tokio::test]
async fn test_empty_selection_skips_read() {
    let (_dir, store) = open_fixture();
    let coords = resolver(&store).resolve_array("/temperature").await.unwrap();
    let descriptor = store.describe("/temperature").await.unwrap().unwrap();

    let view = ArrayView::new(&descriptor, &coords)
        .unwrap()
        .sel("lon", &"500".parse().unwrap())
        .unwrap();
    assert!(view.is_empty_selection());

    let region = store
        .read_selection("/temperature", &view.zindices())
        .await
        .unwrap();
    assert!(region.is_none());
}

#[tokio::test]
async fn test_nested_group_isel() {
    let (_dir, store) = open_fixture();
    let coords = resolver(&store).resolve("/regional").await.unwrap();
    let descriptor = store.describe("/regional/field").await.unwrap().unwrap();

    let view = ArrayView::new(&descriptor, &coords)
        .unwrap()
        .isel("x", &Selection::range(1, 3))
        .unwrap();

    let region = store
        .read_selection("/regional/field", &view.zindices())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(region.shape, vec![2, 2]);
    assert_eq!(region.data, vec![1.0, 2.0, 11.0, 12.0]);
}

#[tokio::test]
async fn test_read_selection_checks_rank() {
    let (_dir, store) = open_fixture();
    let err = store
        .read_selection("/temperature", &[ZIndex::Scalar(0)])
        .await
        .unwrap_err();
    assert!(matches!(err, CoordError::InvalidSelection { .. }));
}

#[tokio::test]
async fn test_fetch_rejects_multidimensional() {
    let (_dir, store) = open_fixture();
    let err = store.fetch("/temperature").await.unwrap_err();
    assert!(matches!(err, CoordError::UnsupportedShape { shape, .. } if shape == vec![4, 3, 2]));
}

#[tokio::test]
async fn test_naive_offset_shifts_reference() {
    let (_dir, store) = open_fixture();
    let config = ResolverConfig {
        naive_time_offset_minutes: -480,
        ..ResolverConfig::default()
    };
    let coords = CoordinateResolver::new(Arc::clone(&store), config)
        .unwrap()
        .resolve_array("/time")
        .await
        .unwrap();

    assert_eq!(
        coords.get("/time").unwrap().val_human(0).unwrap().as_deref(),
        Some("2015-01-02T00:00:00.000Z")
    );
}

#[tokio::test]
async fn test_undimensioned_array_fails() {
    let dir = TempDir::new().unwrap();
    testdata::write_undimensioned_store(dir.path()).unwrap();
    let store = Arc::new(ZarrCoordinateStore::filesystem(dir.path()).unwrap());

    let err = resolver(&store).resolve("/").await.unwrap_err();
    assert!(matches!(err, CoordError::MissingDimensions { path } if path == "/orphan"));
}

#[tokio::test]
async fn test_string_coordinate_is_categorical() {
    let (_dir, store) = open_fixture();
    let coords = resolver(&store).resolve_array("/reflectance").await.unwrap();

    let band = coords.get("/band").unwrap();
    assert_eq!(band.kind(), AxisKind::Categorical);
    assert_eq!(band.vals_human().unwrap(), vec!["red", "nir"]);

    let descriptor = store.describe("/reflectance").await.unwrap().unwrap();
    let view = ArrayView::new(&descriptor, &coords)
        .unwrap()
        .sel("band", &"nir".parse().unwrap())
        .unwrap();
    assert_eq!(view.zindices()[0], ZIndex::Scalar(1));

    let region = store
        .read_selection("/reflectance", &view.zindices())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(region.squeezed_shape(), vec![3, 2]);
    assert!(region.data.iter().all(|&v| v == 1.5));
}

#[tokio::test]
async fn test_dangling_dimension_fails_resolution() {
    let dir = TempDir::new().unwrap();
    testdata::write_dangling_store(dir.path()).unwrap();
    let store = Arc::new(ZarrCoordinateStore::filesystem(dir.path()).unwrap());

    let err = resolver(&store).resolve_array("/field").await.unwrap_err();
    assert!(matches!(
        err,
        CoordError::CoordinateResolution { key, array } if key == "/depth" && array == "/field"
    ));
}

fn open_v2_fixture() -> (TempDir, Arc<ZarrCoordinateStore<FilesystemStore>>) {
    let dir = TempDir::new().unwrap();
    testdata::write_labels_v2_store(dir.path()).unwrap();
    let store = Arc::new(ZarrCoordinateStore::filesystem(dir.path()).unwrap());
    (dir, store)
}

#[tokio::test]
async fn test_v2_fixed_width_unicode_labels() {
    let (_dir, store) = open_v2_fixture();

    let band = store.describe("/band").await.unwrap().unwrap();
    assert_eq!(band.dtype, "<U4");
    assert_eq!(band.shape, vec![3]);
    assert_eq!(band.dimension_names, Some(vec!["band".to_string()]));

    match store.fetch("/band").await.unwrap() {
        CoordinateValues::FixedWidth {
            bytes,
            width,
            encoding,
        } => {
            assert_eq!(width, 4);
            assert_eq!(encoding, FixedWidthEncoding::Utf32Le);
            assert_eq!(bytes.len(), 3 * 4 * 4);
        }
        other => panic!("expected fixed-width values, got {:?}", other),
    }

    let coords = resolver(&store).resolve_array("/X").await.unwrap();
    assert_eq!(coords.keys().collect::<Vec<_>>(), vec!["/band", "/lat"]);

    let band = coords.get("/band").unwrap();
    assert_eq!(band.kind(), AxisKind::Categorical);
    assert_eq!(band.vals_human().unwrap(), testdata::V2_BANDS.to_vec());
    assert_eq!(
        band.sel_str(&"swir".parse().unwrap()).unwrap().zindex(),
        ZIndex::Scalar(2)
    );
    assert_eq!(coords.get("/lat").unwrap().kind(), AxisKind::Numeric);
}

#[tokio::test]
async fn test_v2_fixed_width_zlib_bytes() {
    let (_dir, store) = open_v2_fixture();
    let coords = resolver(&store).resolve_array("/Y").await.unwrap();

    let station = coords.get("/station").unwrap();
    assert_eq!(station.kind(), AxisKind::Categorical);
    assert_eq!(station.vals_human().unwrap(), testdata::V2_STATIONS.to_vec());
}
