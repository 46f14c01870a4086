//! Payload serialization.
//!
//! Values are stored as JSON text. When compression is requested the JSON
//! body is wrapped in a gzip stream; readers detect compressed payloads by
//! the gzip magic bytes, so entries written with and without compression
//! can be read back through the same path.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheResult;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encode a value for storage, optionally gzipping the JSON body.
pub fn serialize<T: Serialize>(value: &T, compress: bool) -> CacheResult<Vec<u8>> {
    let json = serde_json::to_vec(value)?;

    if !compress {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode a stored payload back into a value.
///
/// Malformed payloads surface as an error; the facade downgrades that to a
/// cache miss rather than raising it to the caller.
pub fn deserialize<T: DeserializeOwned>(raw: &[u8]) -> CacheResult<T> {
    if raw.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(raw);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        return Ok(serde_json::from_slice(&json)?);
    }

    Ok(serde_json::from_slice(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_round_trip() {
        let value = json!({"name": "Rhinoplasty", "duration_minutes": 90});
        let raw = serialize(&value, false).unwrap();
        let back: Value = deserialize(&raw).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_null_round_trip() {
        let raw = serialize(&Value::Null, false).unwrap();
        let back: Value = deserialize(&raw).unwrap();
        assert_eq!(back, Value::Null);
    }

    #[test]
    fn test_compressed_round_trip() {
        let value = json!({"notes": "x".repeat(4096)});
        let raw = serialize(&value, true).unwrap();

        assert!(raw.starts_with(&GZIP_MAGIC));
        assert!(raw.len() < 4096);

        // The reader does not need to know the entry was compressed.
        let back: Value = deserialize(&raw).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(deserialize::<Value>(b"not json {{{").is_err());
    }

    #[test]
    fn test_truncated_gzip_payload_is_an_error() {
        let raw = serialize(&json!([1, 2, 3]), true).unwrap();
        assert!(deserialize::<Value>(&raw[..raw.len() / 2]).is_err());
    }
}
