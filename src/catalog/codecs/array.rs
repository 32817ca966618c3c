//! `array_recv`/`array_send`: the one type-aware, recursive array codec.

use crate::catalog::registry::{TypeRegistry, TypeRow};
use crate::catalog::value::ColumnValue;
use crate::error::{Error, Result};

pub(crate) fn recv(registry: &TypeRegistry, row: &TypeRow, bytes: &[u8]) -> Result<ColumnValue> {
    let mut cursor = bytes;

    let ndim = read_i32(&mut cursor)?;
    let flags = read_i32(&mut cursor)?;
    if flags != 0 && flags != 1 {
        return Err(Error::Decode(format!("array: invalid flags {flags}")));
    }
    let elem_oid = read_i32(&mut cursor)? as crate::protocol::types::Oid;

    if ndim == 0 {
        return Ok(ColumnValue::Array(Vec::new()));
    }
    if ndim < 0 {
        return Err(Error::Decode(format!("array: invalid ndim {ndim}")));
    }

    let mut dims = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        let len = read_i32(&mut cursor)?;
        let lower_bound = read_i32(&mut cursor)?;
        if lower_bound != 1 {
            return Err(Error::Decode(format!(
                "array: unsupported lower bound {lower_bound}, only 1 is supported"
            )));
        }
        dims.push(len);
    }

    let total: i64 = dims.iter().map(|&d| d as i64).product();
    let mut flat = Vec::with_capacity(total.max(0) as usize);
    for _ in 0..total {
        let len = read_i32(&mut cursor)?;
        if len == -1 {
            flat.push(ColumnValue::Null);
            continue;
        }
        let len = len as usize;
        if cursor.len() < len {
            return Err(Error::Decode("array: truncated element".into()));
        }
        let (elem_bytes, rest) = cursor.split_at(len);
        cursor = rest;
        flat.push(registry.recv(elem_oid, elem_bytes)?);
    }

    let mut iter = flat.into_iter();
    Ok(nest(&mut iter, &dims))
}

fn nest(flat: &mut impl Iterator<Item = ColumnValue>, dims: &[i32]) -> ColumnValue {
    if dims.len() == 1 {
        return ColumnValue::Array(flat.by_ref().take(dims[0] as usize).collect());
    }
    let count = dims[0];
    let rest = &dims[1..];
    ColumnValue::Array((0..count).map(|_| nest(flat, rest)).collect())
}

pub(crate) fn send(
    registry: &TypeRegistry,
    row: &TypeRow,
    value: &ColumnValue,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let dims = dims_of(value)?;
    let ndim = dims.len() as i32;
    let has_null = {
        let mut flat = Vec::new();
        flatten(value, dims.len(), &mut flat);
        flat.iter().any(|v| v.is_null())
    };

    buf.extend_from_slice(&ndim.to_be_bytes());
    buf.extend_from_slice(&(has_null as i32).to_be_bytes());
    buf.extend_from_slice(&(row.element_oid as i32).to_be_bytes());
    for &len in &dims {
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&1_i32.to_be_bytes()); // lower bound
    }

    let mut flat = Vec::new();
    flatten(value, dims.len(), &mut flat);
    for leaf in flat {
        if leaf.is_null() {
            buf.extend_from_slice(&(-1_i32).to_be_bytes());
            continue;
        }
        let mut elem_buf = Vec::new();
        registry.send(row.element_oid, leaf, &mut elem_buf)?;
        buf.extend_from_slice(&(elem_buf.len() as i32).to_be_bytes());
        buf.extend_from_slice(&elem_buf);
    }
    Ok(())
}

/// Dimension-inference rule: a scalar has dims `[]`, an empty sequence has
/// dims `[0]`, a non-empty sequence is `[len] ++ dims(first element)` with
/// every element required to agree.
fn dims_of(value: &ColumnValue) -> Result<Vec<i32>> {
    match value {
        ColumnValue::Array(items) => {
            if items.is_empty() {
                return Ok(vec![0]);
            }
            let first = dims_of(&items[0])?;
            for item in &items[1..] {
                if dims_of(item)? != first {
                    return Err(Error::Decode(
                        "Multidimensional arrays must have sub-arrays with matching dimensions."
                            .into(),
                    ));
                }
            }
            let mut dims = vec![items.len() as i32];
            dims.extend(first);
            Ok(dims)
        }
        _ => Ok(vec![]),
    }
}

fn flatten<'a>(value: &'a ColumnValue, ndim: usize, out: &mut Vec<&'a ColumnValue>) {
    if ndim == 0 {
        out.push(value);
        return;
    }
    if let ColumnValue::Array(items) = value {
        for item in items {
            flatten(item, ndim - 1, out);
        }
    }
}

fn read_i32(cursor: &mut &[u8]) -> Result<i32> {
    if cursor.len() < 4 {
        return Err(Error::Decode("array: truncated header".into()));
    }
    let (head, rest) = cursor.split_at(4);
    *cursor = rest;
    Ok(i32::from_be_bytes(head.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::oid;

    #[test]
    fn one_dim_roundtrip() {
        let registry = TypeRegistry::bootstrap();
        let row = registry.row(oid::INT4_ARRAY).unwrap().clone();
        let value = ColumnValue::Array(vec![
            ColumnValue::I32(1),
            ColumnValue::Null,
            ColumnValue::I32(3),
        ]);

        let mut buf = Vec::new();
        send(&registry, &row, &value, &mut buf).unwrap();
        let decoded = recv(&registry, &row, &buf).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn empty_array_is_dim_zero_len() {
        let registry = TypeRegistry::bootstrap();
        let row = registry.row(oid::TEXT_ARRAY).unwrap().clone();
        let value = ColumnValue::Array(vec![]);

        let mut buf = Vec::new();
        send(&registry, &row, &value, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &1_i32.to_be_bytes());
        assert_eq!(&buf[12..16], &0_i32.to_be_bytes());
    }

    #[test]
    fn mismatched_subarray_dims_error() {
        let value = ColumnValue::Array(vec![
            ColumnValue::Array(vec![ColumnValue::I32(1)]),
            ColumnValue::Array(vec![ColumnValue::I32(1), ColumnValue::I32(2)]),
        ]);
        assert!(dims_of(&value).is_err());
    }
}
