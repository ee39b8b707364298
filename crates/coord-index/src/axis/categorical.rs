//! Decoding of fixed-width string buffers for categorical axes.

use serde::{Deserialize, Serialize};

use crate::error::{CoordError, Result};

/// Layout of a fixed-width string buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedWidthEncoding {
    /// NUL-padded byte strings (numpy `|S<n>`), decoded as UTF-8.
    Bytes,
    /// NUL-padded UTF-32 little-endian code points (numpy `<U<n>`).
    Utf32Le,
    /// NUL-padded UTF-32 big-endian code points (numpy `>U<n>`).
    Utf32Be,
}

impl FixedWidthEncoding {
    /// Parse a numpy dtype string like `<U4` or `|S8` into an encoding and
    /// its width in characters.
    pub fn from_numpy_dtype(dtype: &str) -> Option<(Self, usize)> {
        let (order, rest) = match dtype.chars().next()? {
            c @ ('<' | '>' | '|' | '=') => (Some(c), &dtype[1..]),
            _ => (None, dtype),
        };
        let kind = rest.get(..1)?;
        let width: usize = rest.get(1..)?.parse().ok().filter(|&w| w > 0)?;
        match (kind, order) {
            ("S", _) => Some((Self::Bytes, width)),
            ("U", Some('>')) => Some((Self::Utf32Be, width)),
            ("U", _) => Some((Self::Utf32Le, width)),
            _ => None,
        }
    }

    /// Bytes occupied by one element of `width` characters.
    pub fn item_size(&self, width: usize) -> usize {
        match self {
            Self::Bytes => width,
            Self::Utf32Le | Self::Utf32Be => width * 4,
        }
    }
}

/// Decode a fixed-width buffer into plain strings, trimming NUL padding.
pub fn decode_fixed_width(
    buffer: &[u8],
    width: usize,
    encoding: FixedWidthEncoding,
) -> Result<Vec<String>> {
    let item = encoding.item_size(width);
    if item == 0 {
        return Err(CoordError::InvalidEncoding(
            "fixed-width strings need a width > 0".to_string(),
        ));
    }
    if buffer.len() % item != 0 {
        return Err(CoordError::InvalidEncoding(format!(
            "buffer of {} bytes is not a multiple of the {}-byte item size",
            buffer.len(),
            item
        )));
    }

    buffer
        .chunks_exact(item)
        .map(|chunk| match encoding {
            FixedWidthEncoding::Bytes => decode_bytes(chunk),
            FixedWidthEncoding::Utf32Le => decode_utf32(chunk, u32::from_le_bytes),
            FixedWidthEncoding::Utf32Be => decode_utf32(chunk, u32::from_be_bytes),
        })
        .collect()
}

fn decode_bytes(chunk: &[u8]) -> Result<String> {
    let end = chunk.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8(chunk[..end].to_vec())
        .map_err(|e| CoordError::InvalidEncoding(e.to_string()))
}

fn decode_utf32(chunk: &[u8], read: fn([u8; 4]) -> u32) -> Result<String> {
    let mut out = String::with_capacity(chunk.len() / 4);
    for cp in chunk.chunks_exact(4) {
        let code = read([cp[0], cp[1], cp[2], cp[3]]);
        let ch = char::from_u32(code)
            .ok_or_else(|| CoordError::InvalidEncoding(format!("invalid code point {:#x}", code)))?;
        out.push(ch);
    }
    let trimmed = out.trim_end_matches('\0').len();
    out.truncate(trimmed);
    Ok(out)
}
