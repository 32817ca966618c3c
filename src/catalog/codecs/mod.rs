//! Function-pointer dispatch tables keyed by `typreceive`/`typsend` name.

pub mod array;
pub mod record;
pub mod scalar;

use crate::catalog::value::ColumnValue;
use crate::error::Result;

pub(crate) type ScalarRecvFn = fn(&[u8]) -> Result<ColumnValue>;
pub(crate) type ScalarSendFn = fn(&ColumnValue, &mut Vec<u8>) -> Result<()>;

/// Look up the non-recursive scalar decoder for a `typreceive` name.
///
/// Returns `None` for `array_recv`/`record_recv`, which the registry
/// dispatches to recursively instead (they need access to the element or
/// attribute type rows).
pub(crate) fn scalar_recv(name: &str) -> Option<ScalarRecvFn> {
    Some(match name {
        "textrecv" | "varcharrecv" | "bpcharrecv" | "namerecv" | "enum_recv" => scalar::recv_text,
        "boolrecv" => scalar::recv_bool,
        "int2recv" => scalar::recv_int2,
        "int4recv" | "oidrecv" => scalar::recv_int4,
        "int8recv" => scalar::recv_int8,
        "float4recv" => scalar::recv_float4,
        "float8recv" => scalar::recv_float8,
        "bytearecv" => scalar::recv_bytea,
        "timestamp_recv" | "timestamptz_recv" => scalar::recv_timestamp,
        "json_recv" => scalar::recv_json,
        "jsonb_recv" => scalar::recv_jsonb,
        "void_recv" => scalar::recv_void,
        "charrecv" => scalar::recv_char,
        _ => return None,
    })
}

/// Look up the non-recursive scalar encoder for a `typsend` name.
pub(crate) fn scalar_send(name: &str) -> Option<ScalarSendFn> {
    Some(match name {
        "textsend" | "varcharsend" | "bpcharsend" | "namesend" | "enum_send" => scalar::send_text,
        "boolsend" => scalar::send_bool,
        "int2send" => scalar::send_int2,
        "int4send" | "oidsend" => scalar::send_int4,
        "int8send" => scalar::send_int8,
        "float4send" => scalar::send_float4,
        "float8send" => scalar::send_float8,
        "byteasend" => scalar::send_bytea,
        "timestamp_send" | "timestamptz_send" => scalar::send_timestamp,
        "json_send" => scalar::send_json,
        "jsonb_send" => scalar::send_jsonb,
        "void_send" => scalar::send_void,
        "charsend" => scalar::send_char,
        _ => return None,
    })
}
