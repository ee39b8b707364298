//! Coordinate indexing for chunked, labeled N-dimensional arrays.
//!
//! Translates predicates over human-meaningful coordinate values (latitudes,
//! timestamps, channel names) into the storage indices a chunked-array reader
//! needs. It enables:
//!
//! - **Label selection**: `sel` by value, range or set, in each axis' own domain
//! - **Position selection**: `isel` relative to what is currently visible
//! - **CF time**: `<unit> since <reference>` offsets decoded to instants
//! - **Coordinate resolution**: one concurrent, deduplicated fetch per
//!   dimension of a Zarr hierarchy
//!
//! # Architecture
//!
//! ```text
//! CoordinateStore (Zarr, memory)
//!      │
//!      ▼
//! CoordinateResolver::resolve(group)
//!      │
//!      ├─► distinct "<group>/<dim>" keys from every array's dimensions
//!      │
//!      ├─► bounded concurrent fetch, first failure aborts
//!      │
//!      └─► CoordinateMap { key ─► AnyAxis }
//!               │
//!               ▼
//!          ArrayView::sel / isel ─► zindices() ─► read_selection
//! ```
//!
//! # Example
//!
//! ```ignore
//! use coord_index::{ArrayView, CoordinateResolver, ResolverConfig, ZarrCoordinateStore};
//!
//! let store = Arc::new(ZarrCoordinateStore::filesystem("weather.zarr")?);
//! let resolver = CoordinateResolver::new(store.clone(), ResolverConfig::from_env())?;
//! let coords = resolver.resolve("/").await?;
//!
//! let temperature = store.describe("/temperature").await?.unwrap();
//! let view = ArrayView::new(&temperature, &coords)?
//!     .sel("lat", &"36.5..40".parse()?)?
//!     .isel("time", &Selection::value(0))?;
//! let region = store.read_selection("/temperature", &view.zindices()).await?;
//! ```

pub mod axis;
pub mod config;
pub mod error;
pub mod resolver;
pub mod selection;
pub mod store;
pub mod testdata;
pub mod time;

// Re-export commonly used types at crate root
pub use axis::{
    AnyAxis, AxisDomain, AxisKind, AxisValues, CategoricalAxis, CfTime, CoordinateAxis,
    FixedWidthEncoding, Identity, NumericAxis, Passthrough, Selection, TimeAxis, ZIndex,
};
pub use config::{ResolverConfig, TimeAxisRule};
pub use error::{CoordError, Result};
pub use resolver::{coordinate_key, CoordinateMap, CoordinateResolver};
pub use selection::ArrayView;
pub use store::{
    ArrayDescriptor, CoordinateStore, CoordinateValues, MemoryStore, SelectedRegion,
    ZarrCoordinateStore,
};
pub use time::{TimeUnit, TimeUnits};
