//! Non-recursive scalar codecs, dispatched by `typreceive`/`typsend` name.
//!
//! Wire-level logic is carried over from the teacher's `conversion` module;
//! it is keyed by function name here instead of by Rust type.

use crate::catalog::value::ColumnValue;
use crate::error::{Error, Result};

pub fn recv_bool(bytes: &[u8]) -> Result<ColumnValue> {
    if bytes.len() != 1 {
        return Err(Error::Decode(format!("invalid boolean length: {}", bytes.len())));
    }
    Ok(ColumnValue::Bool(bytes[0] != 0))
}

pub fn send_bool(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    let b = match value {
        ColumnValue::Bool(b) => *b,
        other => return Err(type_error("bool", other)),
    };
    buf.push(if b { 1 } else { 0 });
    Ok(())
}

pub fn recv_text(bytes: &[u8]) -> Result<ColumnValue> {
    let s = simdutf8::basic::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("invalid UTF-8: {e}")))?;
    Ok(ColumnValue::Text(s.to_owned()))
}

pub fn send_text(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::Text(s) => {
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        }
        other => Err(type_error("text", other)),
    }
}

pub fn recv_int2(bytes: &[u8]) -> Result<ColumnValue> {
    let arr: [u8; 2] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid int2 length: {}", bytes.len())))?;
    Ok(ColumnValue::I16(i16::from_be_bytes(arr)))
}

pub fn send_int2(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::I16(v) => buf.extend_from_slice(&v.to_be_bytes()),
        ColumnValue::I32(v) => {
            let v = i16::try_from(*v).map_err(|_| Error::Decode("i32 overflows int2".into()))?;
            buf.extend_from_slice(&v.to_be_bytes());
        }
        ColumnValue::I64(v) => {
            let v = i16::try_from(*v).map_err(|_| Error::Decode("i64 overflows int2".into()))?;
            buf.extend_from_slice(&v.to_be_bytes());
        }
        other => return Err(type_error("int2", other)),
    }
    Ok(())
}

pub fn recv_int4(bytes: &[u8]) -> Result<ColumnValue> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid int4 length: {}", bytes.len())))?;
    Ok(ColumnValue::I32(i32::from_be_bytes(arr)))
}

pub fn send_int4(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::I16(v) => buf.extend_from_slice(&(*v as i32).to_be_bytes()),
        ColumnValue::I32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        ColumnValue::I64(v) => {
            let v = i32::try_from(*v).map_err(|_| Error::Decode("i64 overflows int4".into()))?;
            buf.extend_from_slice(&v.to_be_bytes());
        }
        other => return Err(type_error("int4", other)),
    }
    Ok(())
}

pub fn recv_int8(bytes: &[u8]) -> Result<ColumnValue> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid int8 length: {}", bytes.len())))?;
    Ok(ColumnValue::I64(i64::from_be_bytes(arr)))
}

pub fn send_int8(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::I16(v) => buf.extend_from_slice(&(*v as i64).to_be_bytes()),
        ColumnValue::I32(v) => buf.extend_from_slice(&(*v as i64).to_be_bytes()),
        ColumnValue::I64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        other => return Err(type_error("int8", other)),
    }
    Ok(())
}

pub fn recv_float4(bytes: &[u8]) -> Result<ColumnValue> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid float4 length: {}", bytes.len())))?;
    Ok(ColumnValue::F32(f32::from_be_bytes(arr)))
}

pub fn send_float4(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::F32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        ColumnValue::F64(v) => buf.extend_from_slice(&(*v as f32).to_be_bytes()),
        other => return Err(type_error("float4", other)),
    }
    Ok(())
}

pub fn recv_float8(bytes: &[u8]) -> Result<ColumnValue> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid float8 length: {}", bytes.len())))?;
    Ok(ColumnValue::F64(f64::from_be_bytes(arr)))
}

pub fn send_float8(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::F32(v) => buf.extend_from_slice(&(*v as f64).to_be_bytes()),
        ColumnValue::F64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        other => return Err(type_error("float8", other)),
    }
    Ok(())
}

pub fn recv_bytea(bytes: &[u8]) -> Result<ColumnValue> {
    Ok(ColumnValue::Bytes(bytes.to_vec()))
}

pub fn send_bytea(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::Bytes(b) => {
            buf.extend_from_slice(b);
            Ok(())
        }
        other => Err(type_error("bytea", other)),
    }
}

/// Microseconds since the PostgreSQL epoch (2000-01-01). Used for both
/// `timestamp` and `timestamptz`; the registry asserts `integer_datetimes`
/// is `on` before either is ever decoded.
pub fn recv_timestamp(bytes: &[u8]) -> Result<ColumnValue> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid timestamp length: {}", bytes.len())))?;
    Ok(ColumnValue::Timestamp(i64::from_be_bytes(arr)))
}

pub fn send_timestamp(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::Timestamp(v) => buf.extend_from_slice(&v.to_be_bytes()),
        other => Err(type_error("timestamp", other)),
    }
}

pub fn recv_json(bytes: &[u8]) -> Result<ColumnValue> {
    let text = simdutf8::basic::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("invalid UTF-8 in json: {e}")))?;
    let value = serde_json::from_str(text).map_err(|e| Error::Decode(format!("invalid json: {e}")))?;
    Ok(ColumnValue::Json(value))
}

pub fn send_json(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::Json(v) => {
            let text = serde_json::to_vec(v).map_err(|e| Error::Decode(format!("invalid json: {e}")))?;
            buf.extend_from_slice(&text);
            Ok(())
        }
        other => Err(type_error("json", other)),
    }
}

const JSONB_VERSION: u8 = 0x01;

pub fn recv_jsonb(bytes: &[u8]) -> Result<ColumnValue> {
    let (version, rest) = bytes
        .split_first()
        .ok_or_else(|| Error::Decode("empty jsonb payload".into()))?;
    if *version != JSONB_VERSION {
        tracing::debug!(version, "jsonb: unexpected version byte, decoding anyway");
    }
    let text = simdutf8::basic::from_utf8(rest)
        .map_err(|e| Error::Decode(format!("invalid UTF-8 in jsonb: {e}")))?;
    let value = serde_json::from_str(text).map_err(|e| Error::Decode(format!("invalid jsonb: {e}")))?;
    Ok(ColumnValue::Json(value))
}

pub fn send_jsonb(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::Json(v) => {
            buf.push(JSONB_VERSION);
            let text = serde_json::to_vec(v).map_err(|e| Error::Decode(format!("invalid jsonb: {e}")))?;
            buf.extend_from_slice(&text);
            Ok(())
        }
        other => Err(type_error("jsonb", other)),
    }
}

pub fn recv_void(_bytes: &[u8]) -> Result<ColumnValue> {
    Ok(ColumnValue::Null)
}

pub fn send_void(_value: &ColumnValue, _buf: &mut Vec<u8>) -> Result<()> {
    Ok(())
}

/// The quoted-identifier `"char"` pseudo-type (single raw byte), needed to
/// decode `pg_type.typtype` while bootstrapping the registry.
pub fn recv_char(bytes: &[u8]) -> Result<ColumnValue> {
    if bytes.len() != 1 {
        return Err(Error::Decode(format!("invalid \"char\" length: {}", bytes.len())));
    }
    Ok(ColumnValue::Text((bytes[0] as char).to_string()))
}

pub fn send_char(value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        ColumnValue::Text(s) if s.len() == 1 => {
            buf.push(s.as_bytes()[0]);
            Ok(())
        }
        other => Err(type_error("\"char\"", other)),
    }
}

fn type_error(expected: &str, got: &ColumnValue) -> Error {
    Error::Decode(format!("expected a value encodable as {expected}, got {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int4_roundtrip() {
        let mut buf = Vec::new();
        send_int4(&ColumnValue::I32(-42), &mut buf).unwrap();
        assert_eq!(recv_int4(&buf).unwrap(), ColumnValue::I32(-42));
    }

    #[test]
    fn jsonb_strips_version_byte() {
        let mut buf = Vec::new();
        send_jsonb(&ColumnValue::Json(serde_json::json!({"a": 1})), &mut buf).unwrap();
        assert_eq!(buf[0], JSONB_VERSION);
        let decoded = recv_jsonb(&buf).unwrap();
        assert_eq!(decoded, ColumnValue::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn char_decodes_single_byte() {
        assert_eq!(recv_char(b"b").unwrap(), ColumnValue::Text("b".into()));
    }
}
