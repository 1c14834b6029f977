//! Bridge to the structured-object serializer (MessagePack via `rmpv`).

use std::io::Cursor;

use rmpv::Value;
use serde::Serialize;

use crate::error::{MarshalError, ProtocolError};

/// Serialize a generic value to MessagePack bytes.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, MarshalError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value).map_err(|err| MarshalError::Encode(err.to_string()))?;
    Ok(buf)
}

/// Deserialize exactly one MessagePack value spanning all of `bytes`.
pub fn decode_value(bytes: &[u8]) -> Result<Value, ProtocolError> {
    let mut cursor = Cursor::new(bytes);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|err| ProtocolError::Malformed(err.to_string()))?;
    let consumed = usize::try_from(cursor.position()).unwrap_or(usize::MAX);
    if consumed != bytes.len() {
        return Err(ProtocolError::Malformed(format!(
            "{} trailing bytes after envelope",
            bytes.len().saturating_sub(consumed)
        )));
    }
    Ok(value)
}

/// Convert any serde value into the generic form.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, MarshalError> {
    rmpv::ext::to_value(value).map_err(|err| MarshalError::Encode(err.to_string()))
}

/// Find a string-keyed entry in a decoded map.
pub(crate) fn lookup<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

/// Short name of a value's wire kind, for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "bool",
        Value::Integer(_) => "integer",
        Value::F32(_) => "f32",
        Value::F64(_) => "f64",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(..) => "ext",
    }
}
