//! Error types for coordinate indexing.

use thiserror::Error;

/// Errors that can occur while decoding, selecting or resolving coordinates.
///
/// An empty selection is not an error: it is reported through
/// [`ZIndex::Empty`](crate::ZIndex::Empty) and an empty `vals()`.
#[derive(Error, Debug)]
pub enum CoordError {
    /// Malformed unit specification or unparseable reference instant.
    #[error("invalid time units format: {0}")]
    Format(String),

    /// Unit token outside seconds, minutes, hours, days.
    #[error("unsupported time unit '{0}': use seconds, minutes, hours, or days")]
    UnsupportedUnit(String),

    /// A time offset that cannot be represented as a calendar instant.
    #[error("time offset out of range: {0}")]
    OutOfRange(String),

    /// The array attributes lack a dimension-name list.
    #[error("array '{path}' has no dimension names")]
    MissingDimensions { path: String },

    /// A dimension references a coordinate array that does not exist.
    #[error("coordinate '{key}' referenced by '{array}' does not exist")]
    CoordinateResolution { key: String, array: String },

    /// The requested node does not exist in the store.
    #[error("node not found: {0}")]
    NotFound(String),

    /// An explicit visible-position list points past the backing values.
    #[error("visible position {position} is out of bounds for axis of length {len}")]
    InvalidPositions { position: usize, len: usize },

    /// A fixed-width string buffer could not be decoded.
    #[error("invalid string encoding: {0}")]
    InvalidEncoding(String),

    /// A selection value could not be parsed into the axis domain.
    #[error("invalid selection value '{value}': expected {expected}")]
    InvalidSelection { value: String, expected: String },

    /// The coordinate array has a data type the engine cannot index.
    #[error("unsupported data type '{dtype}' for coordinate '{path}'")]
    UnsupportedDataType { path: String, dtype: String },

    /// Coordinate arrays must be one-dimensional.
    #[error("coordinate '{path}' must be 1-D, found shape {shape:?}")]
    UnsupportedShape { path: String, shape: Vec<u64> },

    /// Storage/IO error from the backing store.
    #[error("storage error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoordError {
    /// Create a Format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a MissingDimensions error.
    pub fn missing_dimensions(path: impl Into<String>) -> Self {
        Self::MissingDimensions { path: path.into() }
    }

    /// Create a CoordinateResolution error.
    pub fn resolution(key: impl Into<String>, array: impl Into<String>) -> Self {
        Self::CoordinateResolution {
            key: key.into(),
            array: array.into(),
        }
    }

    /// Create an InvalidSelection error.
    pub fn invalid_selection(value: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::InvalidSelection {
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a Store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

impl From<std::io::Error> for CoordError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CoordError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type for coordinate indexing operations.
pub type Result<T> = std::result::Result<T, CoordError>;
