//! `record_recv`/`record_send`: the composite-type codec.

use crate::catalog::registry::{TypeRegistry, TypeRow};
use crate::catalog::value::ColumnValue;
use crate::error::{Error, Result};

pub(crate) fn recv(registry: &TypeRegistry, row: &TypeRow, bytes: &[u8]) -> Result<ColumnValue> {
    let mut cursor = bytes;
    let nelems = read_i32(&mut cursor)?;
    if nelems as usize != row.attribute_oids.len() {
        return Err(Error::Decode(format!(
            "record {}: expected {} fields, wire data has {}",
            row.name,
            row.attribute_oids.len(),
            nelems
        )));
    }

    let mut fields = Vec::with_capacity(nelems as usize);
    for (i, &expected_oid) in row.attribute_oids.iter().enumerate() {
        let elem_oid = read_i32(&mut cursor)? as crate::protocol::types::Oid;
        if elem_oid != expected_oid {
            return Err(Error::Decode(format!(
                "record {}: field {i} has oid {elem_oid}, expected {expected_oid}"
            )));
        }
        let len = read_i32(&mut cursor)?;
        if len == -1 {
            fields.push(ColumnValue::Null);
            continue;
        }
        let len = len as usize;
        if cursor.len() < len {
            return Err(Error::Decode(format!("record {}: truncated field {i}", row.name)));
        }
        let (data, rest) = cursor.split_at(len);
        cursor = rest;
        let value = registry
            .recv(expected_oid, data)
            .map_err(|e| Error::Decode(format!("Record field {i}: {e}")))?;
        fields.push(value);
    }

    Ok(ColumnValue::Record(fields))
}

pub(crate) fn send(
    registry: &TypeRegistry,
    row: &TypeRow,
    value: &ColumnValue,
    buf: &mut Vec<u8>,
) -> Result<()> {
    use crate::catalog::registry::TypeKind;

    if row.kind != TypeKind::Composite {
        return Err(Error::Decode(format!("{} is not a composite type", row.name)));
    }
    let fields = match value {
        ColumnValue::Record(fields) => fields,
        other => {
            return Err(Error::Decode(format!(
                "expected a Record value for {}, got {other:?}",
                row.name
            )));
        }
    };
    if fields.len() != row.attribute_oids.len() {
        return Err(Error::Decode(format!(
            "record {}: expected {} fields, got {}",
            row.name,
            row.attribute_oids.len(),
            fields.len()
        )));
    }

    buf.extend_from_slice(&(fields.len() as i32).to_be_bytes());
    for (i, (field, &attr_oid)) in fields.iter().zip(&row.attribute_oids).enumerate() {
        buf.extend_from_slice(&(attr_oid as i32).to_be_bytes());
        if field.is_null() {
            buf.extend_from_slice(&(-1_i32).to_be_bytes());
            continue;
        }
        let mut elem_buf = Vec::new();
        registry
            .send(attr_oid, field, &mut elem_buf)
            .map_err(|e| Error::Decode(format!("Record field {i}: {e}")))?;
        buf.extend_from_slice(&(elem_buf.len() as i32).to_be_bytes());
        buf.extend_from_slice(&elem_buf);
    }
    Ok(())
}

fn read_i32(cursor: &mut &[u8]) -> Result<i32> {
    if cursor.len() < 4 {
        return Err(Error::Decode("record: truncated header".into()));
    }
    let (head, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(i32::from_be_bytes(head.try_into().unwrap()))
}
