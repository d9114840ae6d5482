//! Extended-JSON codec between [`Document`]/[`Bson`] and `serde_json::Value`.
//!
//! Mirrors the teacher's `json::envelope` encode/decode split (`encode_json`
//! / `parse_json_object` in `crates/wire/src/json/envelope.rs`), generalized
//! from the teacher's flat `Value` enum to the full BSON type tag set using
//! MongoDB-style extended-JSON wrappers for anything a plain JSON number,
//! string, bool, array, or object can't represent directly:
//!
//! | BSON type | JSON wrapper |
//! |-----------|--------------|
//! | `Int64` | `{"$numberLong": "<decimal>"}` |
//! | `Decimal128` | `{"$numberDecimal": {"high": u64, "low": u64}}` |
//! | `Binary` | `{"$binary": {"base64": "...", "subType": "<hex>"}}` |
//! | `Timestamp` | `{"$timestamp": {"t": u32, "i": u32}}` |
//! | `DateTime` | `{"$date": {"$numberLong": "<millis>"}}` |
//! | `ObjectId` | `{"$oid": "<24-hex>"}` |

use base64::Engine;
use docdb_core::{Binary, Bson, DateTime, Decimal128, Document, ObjectId, Timestamp};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Errors raised while decoding extended JSON into a [`Document`]/[`Bson`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input was not valid JSON at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The top-level value was not a JSON object.
    #[error("expected a JSON object at the top level")]
    NotAnObject,
    /// An extended-JSON wrapper had the wrong shape.
    #[error("malformed extended JSON wrapper: {0}")]
    MalformedWrapper(String),
}

/// Encodes a [`Document`] as a `serde_json::Value`.
pub fn document_to_json(doc: &Document) -> Value {
    let mut map = Map::new();
    for (k, v) in doc.iter() {
        map.insert(k.clone(), bson_to_json(v));
    }
    Value::Object(map)
}

/// Encodes a [`Document`] as a JSON string.
pub fn encode_document(doc: &Document) -> String {
    document_to_json(doc).to_string()
}

/// Encodes a single [`Bson`] value as a `serde_json::Value`.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Number((*i).into()),
        Bson::Double(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Document(d) => document_to_json(d),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Int64(i) => wrap("$numberLong", Value::String(i.to_string())),
        Bson::Decimal128(Decimal128 { high, low }) => {
            let mut inner = Map::new();
            inner.insert("high".to_string(), Value::String(high.to_string()));
            inner.insert("low".to_string(), Value::String(low.to_string()));
            wrap("$numberDecimal", Value::Object(inner))
        }
        Bson::Binary(Binary { subtype, bytes }) => {
            let mut inner = Map::new();
            inner.insert(
                "base64".to_string(),
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
            );
            inner.insert("subType".to_string(), Value::String(format!("{subtype:02x}")));
            wrap("$binary", Value::Object(inner))
        }
        Bson::Timestamp(Timestamp { seconds, increment }) => {
            let mut inner = Map::new();
            inner.insert("t".to_string(), Value::Number((*seconds).into()));
            inner.insert("i".to_string(), Value::Number((*increment).into()));
            wrap("$timestamp", Value::Object(inner))
        }
        Bson::DateTime(DateTime(millis)) => {
            wrap("$date", wrap("$numberLong", Value::String(millis.to_string())))
        }
        Bson::ObjectId(oid) => wrap("$oid", Value::String(oid.to_hex())),
    }
}

fn wrap(tag: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(tag.to_string(), value);
    Value::Object(map)
}

/// Decodes a JSON string into a command [`Document`].
pub fn decode_document(json: &str) -> Result<Document, DecodeError> {
    let value: Value = serde_json::from_str(json)?;
    json_to_document(&value)
}

/// Converts a `serde_json::Value` that must be a JSON object into a [`Document`].
pub fn json_to_document(value: &Value) -> Result<Document, DecodeError> {
    let Value::Object(map) = value else {
        return Err(DecodeError::NotAnObject);
    };
    object_to_document(map)
}

fn object_to_document(map: &Map<String, Value>) -> Result<Document, DecodeError> {
    let mut doc = Document::new();
    for (k, v) in map {
        doc.insert(k.clone(), json_to_bson(v)?);
    }
    Ok(doc)
}

/// Converts an arbitrary `serde_json::Value` into a [`Bson`] value.
pub fn json_to_bson(value: &Value) -> Result<Bson, DecodeError> {
    match value {
        Value::Null => Ok(Bson::Null),
        Value::Bool(b) => Ok(Bson::Boolean(*b)),
        Value::String(s) => Ok(Bson::String(s.clone())),
        Value::Array(items) => {
            let items = items.iter().map(json_to_bson).collect::<Result<_, _>>()?;
            Ok(Bson::Array(items))
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
                    Ok(Bson::Int32(i as i32))
                } else {
                    Ok(Bson::Int64(i))
                }
            } else {
                Ok(Bson::Double(n.as_f64().unwrap_or_default()))
            }
        }
        Value::Object(map) => {
            if let Some(scalar) = extended_wrapper(map)? {
                return Ok(scalar);
            }
            Ok(Bson::Document(object_to_document(map)?))
        }
    }
}

fn extended_wrapper(map: &Map<String, Value>) -> Result<Option<Bson>, DecodeError> {
    if map.len() != 1 {
        return Ok(None);
    }
    let (tag, inner) = map.iter().next().expect("len checked above");
    match tag.as_str() {
        "$numberLong" => {
            let s = inner.as_str().ok_or_else(|| {
                DecodeError::MalformedWrapper("$numberLong expects a string".into())
            })?;
            let n: i64 = s
                .parse()
                .map_err(|_| DecodeError::MalformedWrapper("$numberLong is not an integer".into()))?;
            Ok(Some(Bson::Int64(n)))
        }
        "$numberDecimal" => {
            let obj = inner.as_object().ok_or_else(|| {
                DecodeError::MalformedWrapper("$numberDecimal expects an object".into())
            })?;
            let high = parse_u64_field(obj, "high")?;
            let low = parse_u64_field(obj, "low")?;
            Ok(Some(Bson::Decimal128(Decimal128 { high, low })))
        }
        "$binary" => {
            let obj = inner
                .as_object()
                .ok_or_else(|| DecodeError::MalformedWrapper("$binary expects an object".into()))?;
            let base64_str = obj
                .get("base64")
                .and_then(Value::as_str)
                .ok_or_else(|| DecodeError::MalformedWrapper("$binary.base64 is required".into()))?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(base64_str)
                .map_err(|e| DecodeError::MalformedWrapper(format!("invalid base64: {e}")))?;
            let subtype = obj
                .get("subType")
                .and_then(Value::as_str)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0);
            Ok(Some(Bson::Binary(Binary { subtype, bytes })))
        }
        "$timestamp" => {
            let obj = inner.as_object().ok_or_else(|| {
                DecodeError::MalformedWrapper("$timestamp expects an object".into())
            })?;
            let seconds = obj.get("t").and_then(Value::as_u64).unwrap_or(0) as u32;
            let increment = obj.get("i").and_then(Value::as_u64).unwrap_or(0) as u32;
            Ok(Some(Bson::Timestamp(Timestamp { seconds, increment })))
        }
        "$date" => {
            let millis = match inner {
                Value::Object(obj) => {
                    let wrapped = extended_wrapper(obj)?.ok_or_else(|| {
                        DecodeError::MalformedWrapper("$date expects $numberLong".into())
                    })?;
                    wrapped.as_f64().unwrap_or_default() as i64
                }
                Value::Number(n) => n.as_i64().unwrap_or_default(),
                _ => {
                    return Err(DecodeError::MalformedWrapper(
                        "$date expects an object or number".into(),
                    ))
                }
            };
            Ok(Some(Bson::DateTime(DateTime(millis))))
        }
        "$oid" => {
            let hex = inner
                .as_str()
                .ok_or_else(|| DecodeError::MalformedWrapper("$oid expects a string".into()))?;
            let oid = ObjectId::from_hex(hex)
                .ok_or_else(|| DecodeError::MalformedWrapper("$oid is not valid hex".into()))?;
            Ok(Some(Bson::ObjectId(oid)))
        }
        _ => Ok(None),
    }
}

fn parse_u64_field(obj: &Map<String, Value>, field: &str) -> Result<u64, DecodeError> {
    obj.get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DecodeError::MalformedWrapper(format!("missing/invalid '{field}'")))
}
