use std::fmt::Write;
use std::str::{FromStr, SplitWhitespace};

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::SGError;
use crate::storage::{BoundingBox, GridPoint, HashGridStorage};

/// Version written in the header of the text format.
pub const TEXT_FORMAT_VERSION: u32 = 1;

/// Serialization format options for grid data.
///
/// Each format has both compressed (Lz4) and uncompressed variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SerializationFormat {
    /// JSON format - human readable, larger size
    Json,
    /// JSON format with LZ4 compression
    JsonLz4,
    /// bincode format - compact binary
    Bincode,
    /// bincode format with LZ4 compression
    #[default]
    BincodeLz4,
}

impl SerializationFormat {
    /// Returns true if this format uses LZ4 compression
    pub fn is_compressed(&self) -> bool {
        matches!(self, SerializationFormat::JsonLz4 | SerializationFormat::BincodeLz4)
    }
}

fn serialize_serde<T: Serialize>(data: &T, format: SerializationFormat) -> Result<Vec<u8>, SGError> {
    match format {
        SerializationFormat::Json | SerializationFormat::JsonLz4 => {
            serde_json::to_vec(data).map_err(|_| SGError::SerializationFailed)
        }
        SerializationFormat::Bincode | SerializationFormat::BincodeLz4 => {
            bincode::serde::encode_to_vec(data, bincode::config::standard()).map_err(|_| SGError::SerializationFailed)
        }
    }
}

fn deserialize_serde<T: DeserializeOwned>(data: &[u8], format: SerializationFormat) -> Result<T, SGError> {
    match format {
        SerializationFormat::Json | SerializationFormat::JsonLz4 => {
            serde_json::from_slice(data).map_err(|_| SGError::DeserializationFailed)
        }
        SerializationFormat::Bincode | SerializationFormat::BincodeLz4 => {
            bincode::serde::decode_from_slice(data, bincode::config::standard())
                .map(|(value, _)| value)
                .map_err(|_| SGError::DeserializationFailed)
        }
    }
}

/// Serialize data to bytes using the specified format.
/// Applies LZ4 compression if the format variant ends with Lz4.
pub fn serialize<T: Serialize>(data: &T, format: SerializationFormat) -> Result<Vec<u8>, SGError> {
    let bytes = serialize_serde(data, format)?;
    if format.is_compressed() {
        Ok(lz4_flex::compress_prepend_size(&bytes))
    } else {
        Ok(bytes)
    }
}

/// Deserialize data from bytes using the specified format.
/// Applies LZ4 decompression if the format variant ends with Lz4.
pub fn deserialize<T: DeserializeOwned>(data: &[u8], format: SerializationFormat) -> Result<T, SGError> {
    if format.is_compressed() {
        let decompressed = lz4_flex::decompress_size_prepended(data)
            .map_err(|_| SGError::LZ4DecompressionFailed)?;
        deserialize_serde(&decompressed, format)
    } else {
        deserialize_serde(data, format)
    }
}

///
/// Writes `storage` in the line based text format:
///
/// ```text
/// <version> <dim> <size>
/// <lower_0> <upper_0> ... <lower_{d-1}> <upper_{d-1}>
/// <level_0> <index_0> ... <level_{d-1}> <index_{d-1}> <leaf>
/// ...
/// ```
///
/// An empty bounding box is written as the unit cube.
///
pub fn storage_to_string(storage: &HashGridStorage) -> String
{
    let dim = storage.dim();
    let mut text = String::new();
    // writing into a String cannot fail
    let _ = writeln!(text, "{} {} {}", TEXT_FORMAT_VERSION, dim, storage.len());
    let bbox = if storage.bounding_box().dim() == dim { storage.bounding_box().clone() } else { BoundingBox::with_dim(dim) };
    let bounds: Vec<String> = (0..dim).map(|d| format!("{} {}", bbox.lower[d], bbox.upper[d])).collect();
    let _ = writeln!(text, "{}", bounds.join(" "));
    for point in storage.nodes()
    {
        for d in 0..dim
        {
            let _ = write!(text, "{} {} ", point.level(d), point.index(d));
        }
        let _ = writeln!(text, "{}", point.is_leaf() as u8);
    }
    text
}

pub(crate) fn next_token<T: FromStr>(tokens: &mut SplitWhitespace<'_>) -> Result<T, SGError>
{
    tokens.next()
        .ok_or(SGError::DeserializationFailed)?
        .parse()
        .map_err(|_| SGError::DeserializationFailed)
}

///
/// Reads a storage written by [`storage_to_string`]. Sequence numbers and
/// leaf flags are restored exactly. Invalid keys and repeated points are
/// rejected.
///
pub fn storage_from_str(text: &str) -> Result<HashGridStorage, SGError>
{
    let mut tokens = text.split_whitespace();
    let storage = read_storage(&mut tokens)?;
    if tokens.next().is_some()
    {
        return Err(SGError::DeserializationFailed);
    }
    Ok(storage)
}

/// Reads one storage section, leaving any following tokens untouched.
pub(crate) fn read_storage(tokens: &mut SplitWhitespace<'_>) -> Result<HashGridStorage, SGError>
{
    let version: u32 = next_token(tokens)?;
    if version != TEXT_FORMAT_VERSION
    {
        return Err(SGError::UnsupportedVersion);
    }
    let dim: usize = next_token(tokens)?;
    let size: usize = next_token(tokens)?;
    if dim == 0
    {
        return Err(SGError::DeserializationFailed);
    }
    let mut lower = Vec::with_capacity(dim);
    let mut upper = Vec::with_capacity(dim);
    for _ in 0..dim
    {
        lower.push(next_token::<f64>(tokens)?);
        upper.push(next_token::<f64>(tokens)?);
    }
    let mut storage = HashGridStorage::with_bounding_box(BoundingBox::new(&lower, &upper));
    let mut level = vec![0u8; dim];
    let mut index = vec![0u32; dim];
    for _ in 0..size
    {
        for d in 0..dim
        {
            level[d] = next_token(tokens)?;
            index[d] = next_token(tokens)?;
            if !crate::level_index::is_valid(level[d], index[d])
            {
                return Err(SGError::DeserializationFailed);
            }
        }
        let is_leaf = match next_token::<u8>(tokens)?
        {
            0 => false,
            1 => true,
            _ => return Err(SGError::DeserializationFailed),
        };
        storage.insert(GridPoint::new(&level, &index, is_leaf))?;
    }
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::HashGenerator;

    fn same_points(a: &HashGridStorage, b: &HashGridStorage) -> bool
    {
        a.len() == b.len() && (0..a.len()).all(|seq| a.point(seq) == b.point(seq) && a.is_leaf(seq) == b.is_leaf(seq))
    }

    #[test]
    fn test_text_roundtrip_keeps_order_and_leaves() {
        let mut storage = HashGridStorage::with_bounding_box(BoundingBox::new(&[-1.0, 0.0], &[1.0, 0.1]));
        HashGenerator.regular_with_boundaries(&mut storage, 2, 1, None).unwrap();
        storage.set_is_leaf(3, !storage.is_leaf(3));
        let text = storage_to_string(&storage);
        assert!(text.starts_with("1 2 21\n-1 1 0 0.1\n"));
        let restored = storage_from_str(&text).unwrap();
        assert!(same_points(&storage, &restored));
        assert_eq!(restored.bounding_box(), storage.bounding_box());
    }

    #[test]
    fn test_text_rejects_bad_input() {
        assert_eq!(storage_from_str("2 1 0\n0 1\n").unwrap_err(), SGError::UnsupportedVersion);
        assert_eq!(storage_from_str("1 1 1\n0 1\n").unwrap_err(), SGError::DeserializationFailed);
        // index 2 is even on level 1
        assert_eq!(storage_from_str("1 1 1\n0 1\n1 2 1\n").unwrap_err(), SGError::DeserializationFailed);
        assert_eq!(storage_from_str("1 1 2\n0 1\n1 1 1\n1 1 0\n").unwrap_err(), SGError::DuplicatePoint);
        assert_eq!(storage_from_str("1 1 1\n0 1\n1 1 2\n").unwrap_err(), SGError::DeserializationFailed);
        assert_eq!(storage_from_str("1 1 0\n0 1\n7\n").unwrap_err(), SGError::DeserializationFailed);
    }

    #[test]
    fn test_storage_serde_roundtrip() {
        let mut storage = HashGridStorage::new(3);
        HashGenerator.regular(&mut storage, 3, None).unwrap();
        for format in [SerializationFormat::Json, SerializationFormat::JsonLz4, SerializationFormat::Bincode, SerializationFormat::BincodeLz4]
        {
            let bytes = serialize(&storage, format).unwrap();
            let restored: HashGridStorage = deserialize(&bytes, format).unwrap();
            assert!(same_points(&storage, &restored));
            // the lookup map is rebuilt on load
            assert_eq!(restored.find(&storage.point(5)), Some(5));
        }
    }

    #[test]
    fn test_corrupt_buffers() {
        let garbage = [1u8, 2, 3];
        assert_eq!(deserialize::<HashGridStorage>(&garbage, SerializationFormat::JsonLz4).unwrap_err(), SGError::LZ4DecompressionFailed);
        assert_eq!(deserialize::<HashGridStorage>(&garbage, SerializationFormat::Json).unwrap_err(), SGError::DeserializationFailed);
    }

    #[test]
    fn test_invalid_records_are_rejected_on_load() {
        let json = r#"{"bounding_box":{"lower":[0.0],"upper":[1.0]},"index":[1,1],"level":[1,1],"flags":[1,1],"dim":1,"algorithmic_dims":[0]}"#;
        assert!(deserialize::<HashGridStorage>(json.as_bytes(), SerializationFormat::Json).is_err());
        let deep = r#"{"bounding_box":{"lower":[0.0],"upper":[1.0]},"index":[1],"level":[70],"flags":[1],"dim":1,"algorithmic_dims":[0]}"#;
        assert!(deserialize::<HashGridStorage>(deep.as_bytes(), SerializationFormat::Json).is_err());
        let even = r#"{"bounding_box":{"lower":[0.0],"upper":[1.0]},"index":[2],"level":[2],"flags":[1],"dim":1,"algorithmic_dims":[0]}"#;
        assert!(deserialize::<HashGridStorage>(even.as_bytes(), SerializationFormat::Json).is_err());
        let valid = r#"{"bounding_box":{"lower":[0.0],"upper":[1.0]},"index":[3],"level":[2],"flags":[1],"dim":1,"algorithmic_dims":[0]}"#;
        let storage = deserialize::<HashGridStorage>(valid.as_bytes(), SerializationFormat::Json).unwrap();
        assert_eq!(storage.find_key(&[2], &[3]), Some(0));
    }
}
