//! Owned backend message union.
//!
//! Messages crossing from the read dispatcher task into the rest of the
//! connection must be `'static` (they travel through an `mpsc` channel), so
//! this module re-parses the borrowed, zero-copy structures in
//! `protocol::backend` into owned values.

use crate::error::{Error, Result};
use crate::protocol::backend::{self, msg_type};
use crate::protocol::types::{FormatCode, Oid, TransactionStatus};

/// Metadata for one column of a result set, as reported by `RowDescription`.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub name: String,
    pub table_oid: Oid,
    pub column_attnum: i16,
    pub type_oid: Oid,
    pub type_size: i16,
    pub type_mod: i32,
    pub format: FormatCode,
}

/// An owned, decoded server message.
#[derive(Debug)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationMd5Password { salt: [u8; 4] },
    BackendKeyData { pid: u32, secret_key: u32 },
    BindComplete,
    CloseComplete,
    CommandComplete { tag: String },
    DataRow { values: Vec<Option<Vec<u8>>> },
    EmptyQueryResponse,
    ErrorResponse { fields: crate::error::ErrorFields },
    NoticeResponse { fields: crate::error::ErrorFields },
    NoData,
    NotificationResponse { pid: u32, channel: String, payload: String },
    ParameterDescription { type_oids: Vec<Oid> },
    ParameterStatus { name: String, value: String },
    ParseComplete,
    ReadyForQuery { status: TransactionStatus },
    RowDescription { columns: Vec<ColumnMetadata> },
}

impl BackendMessage {
    /// Whether this message can arrive at any point in the message stream,
    /// independent of whatever synchronous exchange is in progress.
    pub fn is_async(type_byte: u8) -> bool {
        backend::RawMessage::is_async_type(type_byte)
    }
}

/// Decode one message body given its type byte.
pub fn decode(type_byte: u8, payload: &[u8]) -> Result<BackendMessage> {
    match type_byte {
        msg_type::AUTHENTICATION => match backend::auth::AuthenticationMessage::parse(payload)? {
            backend::auth::AuthenticationMessage::Ok => Ok(BackendMessage::AuthenticationOk),
            backend::auth::AuthenticationMessage::CleartextPassword => {
                Ok(BackendMessage::AuthenticationCleartextPassword)
            }
            backend::auth::AuthenticationMessage::Md5Password { salt } => {
                Ok(BackendMessage::AuthenticationMd5Password { salt })
            }
            other => Err(Error::Auth(format!(
                "unsupported authentication method requested by server: {other:?}"
            ))),
        },
        msg_type::BACKEND_KEY_DATA => {
            let data = backend::auth::BackendKeyData::parse(payload)?;
            Ok(BackendMessage::BackendKeyData {
                pid: data.process_id(),
                secret_key: data.secret(),
            })
        }
        msg_type::PARAMETER_STATUS => {
            let status = backend::auth::ParameterStatus::parse(payload)?;
            Ok(BackendMessage::ParameterStatus {
                name: status.name.to_string(),
                value: status.value.to_string(),
            })
        }
        msg_type::READY_FOR_QUERY => {
            let rfq = backend::auth::ReadyForQuery::parse(payload)?;
            let status = rfq.transaction_status().ok_or_else(|| {
                Error::Protocol(format!("ReadyForQuery: unknown status byte {}", rfq.status))
            })?;
            Ok(BackendMessage::ReadyForQuery { status })
        }
        msg_type::NOTIFICATION_RESPONSE => {
            let notif = backend::auth::NotificationResponse::parse(payload)?;
            Ok(BackendMessage::NotificationResponse {
                pid: notif.pid,
                channel: notif.channel.to_string(),
                payload: notif.payload.to_string(),
            })
        }
        msg_type::ERROR_RESPONSE => {
            let resp = backend::error::ErrorResponse::parse(payload)?;
            Ok(BackendMessage::ErrorResponse { fields: resp.fields })
        }
        msg_type::NOTICE_RESPONSE => {
            let resp = backend::error::NoticeResponse::parse(payload)?;
            Ok(BackendMessage::NoticeResponse { fields: resp.fields })
        }
        msg_type::PARSE_COMPLETE => Ok(BackendMessage::ParseComplete),
        msg_type::BIND_COMPLETE => Ok(BackendMessage::BindComplete),
        msg_type::CLOSE_COMPLETE => Ok(BackendMessage::CloseComplete),
        msg_type::NO_DATA => Ok(BackendMessage::NoData),
        msg_type::PARAMETER_DESCRIPTION => {
            let desc = backend::extended::ParameterDescription::parse(payload)?;
            Ok(BackendMessage::ParameterDescription {
                type_oids: desc.oids().to_vec(),
            })
        }
        msg_type::ROW_DESCRIPTION => {
            let desc = backend::query::RowDescription::parse(payload)?;
            let columns = desc
                .iter()
                .map(|field| ColumnMetadata {
                    name: field.name.to_string(),
                    table_oid: field.table_oid(),
                    column_attnum: field.column_id(),
                    type_oid: field.type_oid(),
                    type_size: field.type_size(),
                    type_mod: field.type_modifier(),
                    format: field.format(),
                })
                .collect();
            Ok(BackendMessage::RowDescription { columns })
        }
        msg_type::DATA_ROW => {
            let row = backend::query::DataRow::parse(payload)?;
            let values = row.iter().map(|v| v.map(<[u8]>::to_vec)).collect();
            Ok(BackendMessage::DataRow { values })
        }
        msg_type::COMMAND_COMPLETE => {
            let cc = backend::query::CommandComplete::parse(payload)?;
            Ok(BackendMessage::CommandComplete {
                tag: cc.tag.to_string(),
            })
        }
        msg_type::EMPTY_QUERY_RESPONSE => Ok(BackendMessage::EmptyQueryResponse),
        other => Err(Error::Protocol(format!(
            "unexpected or unsupported message type byte: {:?} ({other})",
            other as char
        ))),
    }
}

/// Parse the row count / affected-row count out of a `CommandComplete` tag.
///
/// `SELECT/UPDATE/DELETE/MOVE/FETCH/COPY n` -> n; `INSERT oid n` -> n.
pub fn parse_completion_tag(tag: &str) -> Option<u64> {
    let parts: Vec<&str> = tag.split_whitespace().collect();
    match parts.as_slice() {
        ["SELECT", n] | ["UPDATE", n] | ["DELETE", n] | ["MOVE", n] | ["FETCH", n]
        | ["COPY", n] => n.parse().ok(),
        ["INSERT", _oid, n] => n.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ready_for_query() {
        let msg = decode(msg_type::READY_FOR_QUERY, b"I").unwrap();
        assert!(matches!(
            msg,
            BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle
            }
        ));
    }

    #[test]
    fn decodes_data_row_with_null() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u16.to_be_bytes());
        payload.extend_from_slice(&4i32.to_be_bytes());
        payload.extend_from_slice(b"1234");
        payload.extend_from_slice(&(-1i32).to_be_bytes());

        let msg = decode(msg_type::DATA_ROW, &payload).unwrap();
        match msg {
            BackendMessage::DataRow { values } => {
                assert_eq!(values, vec![Some(b"1234".to_vec()), None]);
            }
            _ => panic!("expected DataRow"),
        }
    }

    #[test]
    fn completion_tag_parsing() {
        assert_eq!(parse_completion_tag("SELECT 42"), Some(42));
        assert_eq!(parse_completion_tag("INSERT 0 1"), Some(1));
        assert_eq!(parse_completion_tag("DELETE 3"), Some(3));
        assert_eq!(parse_completion_tag("BEGIN"), None);
    }

    #[test]
    fn unknown_type_byte_is_protocol_error() {
        assert!(decode(0xFF, b"").is_err());
    }
}
