//! The dynamic value bag produced and consumed by the type registry.

use crate::protocol::types::Oid;

/// A decoded or to-be-encoded column value.
///
/// Dispatch to the right variant happens at runtime, keyed by the server's
/// `pg_type` catalogue rather than by Rust generics, so a single connection
/// can talk to a server with extensions and custom types it has never seen
/// a Rust type for.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Microseconds since `2000-01-01T00:00:00Z` (add 946_684_800 seconds for Unix epoch).
    Timestamp(i64),
    Json(serde_json::Value),
    Array(Vec<ColumnValue>),
    Record(Vec<ColumnValue>),
    /// Escape hatch for an OID the registry has no codec for, when the
    /// caller has opted into receiving the raw bytes anyway.
    Custom { oid: Oid, bytes: Vec<u8> },
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::I16(v) => Some(*v as i64),
            ColumnValue::I32(v) => Some(*v as i64),
            ColumnValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::F32(v) => Some(*v as f64),
            ColumnValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// The well-known OID this variant would naturally encode as, used to
    /// fill in a `Parse` message's parameter types for ad hoc (unnamed)
    /// statements where no `ParameterDescription` round-trip has happened
    /// yet. `0` means "let the server infer", which is the best a bare
    /// `Null`, `Array`, or `Record` value can offer without more context.
    pub fn natural_oid(&self) -> Oid {
        use crate::protocol::types::oid;
        match self {
            ColumnValue::Null | ColumnValue::Array(_) | ColumnValue::Record(_) => 0,
            ColumnValue::Bool(_) => oid::BOOL,
            ColumnValue::I16(_) => oid::INT2,
            ColumnValue::I32(_) => oid::INT4,
            ColumnValue::I64(_) => oid::INT8,
            ColumnValue::F32(_) => oid::FLOAT4,
            ColumnValue::F64(_) => oid::FLOAT8,
            ColumnValue::Text(_) => oid::TEXT,
            ColumnValue::Bytes(_) => oid::BYTEA,
            ColumnValue::Timestamp(_) => oid::TIMESTAMP,
            ColumnValue::Json(_) => oid::JSONB,
            ColumnValue::Custom { oid, .. } => *oid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_narrow_by_variant() {
        assert_eq!(ColumnValue::I32(7).as_i64(), Some(7));
        assert_eq!(ColumnValue::Text("hi".into()).as_str(), Some("hi"));
        assert!(ColumnValue::Null.is_null());
        assert_eq!(ColumnValue::Bool(true).as_i64(), None);
    }
}
