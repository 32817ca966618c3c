//! In-memory catalogue of `pg_type` rows, mapping OID to codec.

use std::collections::HashMap;

use crate::catalog::codecs::{array, record, scalar_recv, scalar_send};
use crate::catalog::value::ColumnValue;
use crate::error::{Error, Result};
use crate::protocol::types::{oid, Oid};

/// `pg_type.typtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Base,
    Composite,
    Domain,
    Enum,
    Pseudo,
    Range,
    Multirange,
}

impl TypeKind {
    pub fn from_char(c: char) -> Result<Self> {
        Ok(match c {
            'b' => TypeKind::Base,
            'c' => TypeKind::Composite,
            'd' => TypeKind::Domain,
            'e' => TypeKind::Enum,
            'p' => TypeKind::Pseudo,
            'r' => TypeKind::Range,
            'm' => TypeKind::Multirange,
            other => return Err(Error::Decode(format!("unknown pg_type.typtype {other:?}"))),
        })
    }
}

/// One row of the in-memory type catalogue.
#[derive(Debug, Clone)]
pub struct TypeRow {
    pub oid: Oid,
    pub name: String,
    pub kind: TypeKind,
    pub element_oid: Oid,
    pub attribute_oids: Vec<Oid>,
    pub recv_name: String,
    pub send_name: String,
}

/// The query used to (re)populate the registry from the server's own
/// catalogue. `typname` is cast from `name` to `text`, and `typreceive`/
/// `typsend` from `regproc` to `text`, so the binary wire format carries
/// plain UTF-8 instead of the fixed-width `name` encoding or a `regproc`
/// OID — the latter is what the dispatch-by-name design in §4.3 requires.
pub const RELOAD_TYPES_QUERY: &str = "SELECT oid, typname::text, typtype, typelem, \
    typreceive::text, typsend::text, \
    array(SELECT atttypid FROM pg_attribute \
          WHERE attrelid = typrelid AND NOT attisdropped AND attnum > 0 \
          ORDER BY attnum) AS attrtypids \
    FROM pg_type WHERE typisdefined";

/// In-memory catalogue of type rows, loaded from `pg_type`.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    rows: HashMap<Oid, TypeRow>,
}

impl TypeRegistry {
    /// Minimal entries (`int4`, `text`, `"char"`, and their one-dim arrays,
    /// plus `oid` aliasing `int4`) sufficient to execute `RELOAD_TYPES_QUERY`
    /// and decode its own result set.
    pub fn bootstrap() -> Self {
        let mut registry = Self::default();
        let base = |oid, name: &str, recv: &str, send: &str| TypeRow {
            oid,
            name: name.to_string(),
            kind: TypeKind::Base,
            element_oid: 0,
            attribute_oids: Vec::new(),
            recv_name: recv.to_string(),
            send_name: send.to_string(),
        };
        let array = |oid, name: &str, element_oid| TypeRow {
            oid,
            name: name.to_string(),
            kind: TypeKind::Base,
            element_oid,
            attribute_oids: Vec::new(),
            recv_name: "array_recv".to_string(),
            send_name: "array_send".to_string(),
        };

        registry.insert(base(oid::INT4, "int4", "int4recv", "int4send"));
        registry.insert(base(oid::OID, "oid", "oidrecv", "oidsend"));
        registry.insert(base(oid::TEXT, "text", "textrecv", "textsend"));
        registry.insert(base(oid::CHAR, "char", "charrecv", "charsend"));
        registry.insert(array(oid::INT4_ARRAY, "_int4", oid::INT4));
        registry.insert(array(oid::TEXT_ARRAY, "_text", oid::TEXT));
        registry.insert(array(oid::OID_ARRAY, "_oid", oid::OID));
        registry
    }

    pub fn insert(&mut self, row: TypeRow) {
        self.rows.insert(row.oid, row);
    }

    pub fn row(&self, type_oid: Oid) -> Option<&TypeRow> {
        self.rows.get(&type_oid)
    }

    /// Repopulate from decoded rows of `RELOAD_TYPES_QUERY`, replacing any
    /// prior contents (the bootstrap entries are always re-derived from the
    /// server's own catalogue, so nothing is lost).
    pub fn reload(&mut self, rows: impl IntoIterator<Item = Vec<ColumnValue>>) -> Result<()> {
        let mut next = HashMap::new();
        for columns in rows {
            let row = parse_type_row(&columns)?;
            next.insert(row.oid, row);
        }
        self.rows = next;
        Ok(())
    }

    /// Decode `bytes` as `type_oid` using the binary wire format.
    pub fn recv(&self, type_oid: Oid, bytes: &[u8]) -> Result<ColumnValue> {
        let row = self
            .row(type_oid)
            .ok_or_else(|| Error::Decode(format!("Unknown type: oid {type_oid}")))?;

        match row.recv_name.as_str() {
            "array_recv" => array::recv(self, row, bytes),
            "record_recv" => record::recv(self, row, bytes),
            name => match scalar_recv(name) {
                Some(f) => f(bytes),
                None => Err(Error::Decode(format!(
                    "Unsupported type: {} (oid {}, typreceive {})",
                    row.name, row.oid, row.recv_name
                ))),
            },
        }
    }

    /// Encode `value` as `type_oid` using the binary wire format.
    pub fn send(&self, type_oid: Oid, value: &ColumnValue, buf: &mut Vec<u8>) -> Result<()> {
        let row = self
            .row(type_oid)
            .ok_or_else(|| Error::Decode(format!("Unknown type: oid {type_oid}")))?;

        match row.send_name.as_str() {
            "array_send" => array::send(self, row, value, buf),
            "record_send" => record::send(self, row, value, buf),
            name => match scalar_send(name) {
                Some(f) => f(value, buf),
                None => Err(Error::Decode(format!(
                    "Unsupported type: {} (oid {}, typsend {})",
                    row.name, row.oid, row.send_name
                ))),
            },
        }
    }
}

fn parse_type_row(columns: &[ColumnValue]) -> Result<TypeRow> {
    let [oid_v, name_v, kind_v, elem_v, recv_v, send_v, attrs_v] = columns else {
        return Err(Error::Decode(format!(
            "reload_types row: expected 7 columns, got {}",
            columns.len()
        )));
    };

    let oid = oid_v
        .as_i64()
        .ok_or_else(|| Error::Decode("reload_types: oid column not an integer".into()))? as Oid;
    let name = name_v
        .as_str()
        .ok_or_else(|| Error::Decode("reload_types: typname column not text".into()))?
        .to_string();
    let kind_char = kind_v
        .as_str()
        .and_then(|s| s.chars().next())
        .ok_or_else(|| Error::Decode("reload_types: typtype column not a char".into()))?;
    let kind = TypeKind::from_char(kind_char)?;
    let element_oid = elem_v
        .as_i64()
        .ok_or_else(|| Error::Decode("reload_types: typelem column not an integer".into()))? as Oid;
    let recv_name = recv_v
        .as_str()
        .ok_or_else(|| Error::Decode("reload_types: typreceive column not text".into()))?
        .to_string();
    let send_name = send_v
        .as_str()
        .ok_or_else(|| Error::Decode("reload_types: typsend column not text".into()))?
        .to_string();
    let attribute_oids = match attrs_v {
        ColumnValue::Array(items) => items
            .iter()
            .map(|v| {
                v.as_i64()
                    .map(|n| n as Oid)
                    .ok_or_else(|| Error::Decode("reload_types: attrtypids element not an integer".into()))
            })
            .collect::<Result<Vec<_>>>()?,
        ColumnValue::Null => Vec::new(),
        other => {
            return Err(Error::Decode(format!(
                "reload_types: attrtypids column not an array, got {other:?}"
            )));
        }
    };

    Ok(TypeRow {
        oid,
        name,
        kind,
        element_oid,
        attribute_oids,
        recv_name,
        send_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_decodes_int4() {
        let registry = TypeRegistry::bootstrap();
        let value = registry.recv(oid::INT4, &42_i32.to_be_bytes()).unwrap();
        assert_eq!(value, ColumnValue::I32(42));
    }

    #[test]
    fn unknown_oid_is_clear_error() {
        let registry = TypeRegistry::bootstrap();
        let err = registry.recv(999_999, b"").unwrap_err();
        assert!(err.to_string().contains("Unknown type: oid 999999"));
    }

    #[test]
    fn reload_replaces_bootstrap_rows() {
        let mut registry = TypeRegistry::bootstrap();
        let rows = vec![vec![
            ColumnValue::I32(oid::BOOL as i32),
            ColumnValue::Text("bool".into()),
            ColumnValue::Text("b".into()),
            ColumnValue::I32(0),
            ColumnValue::Text("boolrecv".into()),
            ColumnValue::Text("boolsend".into()),
            ColumnValue::Array(vec![]),
        ]];
        registry.reload(rows).unwrap();
        assert!(registry.row(oid::INT4).is_none());
        assert_eq!(registry.recv(oid::BOOL, &[1]).unwrap(), ColumnValue::Bool(true));
    }
}
