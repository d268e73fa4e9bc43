//! Normalization of backend payloads into bytes.
//!
//! Blob SDKs have returned downloads as raw bytes, as single-element lists of
//! buffers, as arrays of byte values, as serialized buffers
//! (`{"type": "Buffer", "data": [...]}`) and as plain strings. Every shape is
//! captured by [`RawPayload`] and decoded by [`normalize`]; anything else is a
//! [`StorageError::Decode`].

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::Value;

use crate::error::StorageError;

/// Fields that carry the bytes of a wrapped payload, in lookup order.
const NESTED_FIELDS: [&str; 2] = ["data", "buffer"];

/// A payload as handed back by a storage transport.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// No value at all.
    Null,
    /// Raw bytes.
    Bytes(Bytes),
    /// Text to be stored as its UTF-8 encoding.
    Text(String),
    /// A bare number; only meaningful inside a [`RawPayload::List`].
    Number(i64),
    /// A list of payloads.
    List(Vec<RawPayload>),
    /// An object wrapping the payload in a field.
    Object(BTreeMap<String, RawPayload>),
}

impl From<Bytes> for RawPayload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Number(i64::from(b)),
            // Fractions and out-of-range values are not byte values; i64::MIN
            // keeps them out of 0..=255 so they fail to decode.
            Value::Number(n) => Self::Number(n.as_i64().unwrap_or(i64::MIN)),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Decode a raw payload into a non-empty byte sequence.
///
/// Shapes are tried in order: bytes, list whose first element is bytes (raw
/// or serialized), list of byte values, object with a `data` or `buffer`
/// field, text. `Null` is an
/// [`StorageError::EmptyPayload`]; no placeholder content is ever produced.
///
/// # Errors
///
/// Returns `EmptyPayload` for `Null` and `Decode` when no shape yields bytes.
pub fn normalize(raw: RawPayload) -> Result<Bytes, StorageError> {
    let bytes = match raw {
        RawPayload::Null => {
            return Err(StorageError::empty_payload("backend returned no value"));
        }
        RawPayload::Bytes(bytes) => bytes,
        RawPayload::List(items) => decode_list(items)?,
        RawPayload::Object(mut fields) => {
            let nested = NESTED_FIELDS
                .iter()
                .find_map(|field| fields.remove(*field))
                .ok_or_else(|| {
                    StorageError::decode(format!(
                        "object without byte-bearing field (keys: {})",
                        fields.keys().cloned().collect::<Vec<_>>().join(", ")
                    ))
                })?;
            return normalize(nested);
        }
        RawPayload::Text(text) => Bytes::from(text),
        RawPayload::Number(n) => {
            return Err(StorageError::decode(format!("bare number {n}")));
        }
    };

    if bytes.is_empty() {
        return Err(StorageError::decode("payload decoded to zero bytes"));
    }
    Ok(bytes)
}

fn decode_list(items: Vec<RawPayload>) -> Result<Bytes, StorageError> {
    let mut iter = items.into_iter();
    match iter.next() {
        None => Err(StorageError::decode("empty list")),
        Some(RawPayload::Bytes(bytes)) => Ok(bytes),
        // A serialized buffer in head position: `[{"type": "Buffer", "data": [...]}]`.
        Some(first @ RawPayload::Object(_)) => normalize(first),
        Some(first @ RawPayload::Number(_)) => std::iter::once(first)
            .chain(iter)
            .enumerate()
            .map(|(idx, item)| match item {
                RawPayload::Number(n) => u8::try_from(n).map_err(|_| {
                    StorageError::decode(format!("value {n} at index {idx} is not a byte"))
                }),
                other => Err(StorageError::decode(format!(
                    "non-numeric element at index {idx}: {}",
                    shape_name(&other)
                ))),
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Bytes::from),
        Some(other) => Err(StorageError::decode(format!(
            "list of {} is not a byte sequence",
            shape_name(&other)
        ))),
    }
}

fn shape_name(raw: &RawPayload) -> &'static str {
    match raw {
        RawPayload::Null => "null",
        RawPayload::Bytes(_) => "bytes",
        RawPayload::Text(_) => "text",
        RawPayload::Number(_) => "number",
        RawPayload::List(_) => "list",
        RawPayload::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bytes_pass_through() {
        let raw = RawPayload::from(vec![1u8, 2, 3]);
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(&[1, 2, 3]));
    }

    #[test]
    fn test_list_of_buffers_unwraps_first() {
        let raw = RawPayload::List(vec![
            RawPayload::Bytes(Bytes::from_static(b"first")),
            RawPayload::Bytes(Bytes::from_static(b"second")),
        ]);
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(b"first"));
    }

    #[test]
    fn test_list_headed_by_serialized_buffer() {
        let raw = RawPayload::from(json!([{"type": "Buffer", "data": [1, 2, 3]}]));
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(&[1, 2, 3]));
    }

    #[test]
    fn test_array_of_numbers() {
        let raw = RawPayload::from(json!([137, 80, 78, 71]));
        assert_eq!(
            normalize(raw).unwrap(),
            Bytes::from_static(&[137, 80, 78, 71])
        );
    }

    #[test]
    fn test_serialized_buffer() {
        let raw = RawPayload::from(json!({"type": "Buffer", "data": [71, 73, 70]}));
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(b"GIF"));
    }

    #[test]
    fn test_buffer_field_is_used_when_data_absent() {
        let raw = RawPayload::from(json!({"buffer": "hello"}));
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_doubly_wrapped_object() {
        let raw = RawPayload::from(json!({"data": {"type": "Buffer", "data": [1, 2]}}));
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(&[1, 2]));
    }

    #[test]
    fn test_text_encodes_raw() {
        let raw = RawPayload::Text("<svg/>".into());
        assert_eq!(normalize(raw).unwrap(), Bytes::from_static(b"<svg/>"));
    }

    #[test]
    fn test_null_is_empty_payload_not_placeholder() {
        let err = normalize(RawPayload::Null).unwrap_err();
        assert!(matches!(err, StorageError::EmptyPayload(_)));
        let err = normalize(RawPayload::from(json!(null))).unwrap_err();
        assert!(matches!(err, StorageError::EmptyPayload(_)));
    }

    #[test]
    fn test_zero_length_results_are_decode_errors() {
        for raw in [
            RawPayload::Bytes(Bytes::new()),
            RawPayload::Text(String::new()),
            RawPayload::List(vec![]),
            RawPayload::from(json!({"data": []})),
        ] {
            let err = normalize(raw).unwrap_err();
            assert!(matches!(err, StorageError::Decode(_)), "got {err:?}");
        }
    }

    #[test]
    fn test_unrecognized_shapes_are_decode_errors() {
        for raw in [
            RawPayload::from(json!(42)),
            RawPayload::from(json!([1, 256])),
            RawPayload::from(json!([1, "x"])),
            RawPayload::from(json!([1.5])),
            RawPayload::from(json!([["nested"]])),
            RawPayload::from(json!({"url": "https://x"})),
        ] {
            let err = normalize(raw).unwrap_err();
            assert!(matches!(err, StorageError::Decode(_)), "got {err:?}");
        }
    }
}
