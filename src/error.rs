//! Error types for the client.

use thiserror::Error;

/// Result type for all fallible operations in this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// PostgreSQL error/notice field type codes (protocol v3 section 53.8).
pub mod field_type {
    pub const SEVERITY: u8 = b'S';
    pub const SEVERITY_NON_LOCALIZED: u8 = b'V';
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    pub const POSITION: u8 = b'P';
    pub const INTERNAL_POSITION: u8 = b'p';
    pub const INTERNAL_QUERY: u8 = b'q';
    pub const WHERE: u8 = b'W';
    pub const SCHEMA: u8 = b's';
    pub const TABLE: u8 = b't';
    pub const COLUMN: u8 = b'c';
    pub const DATA_TYPE: u8 = b'd';
    pub const CONSTRAINT: u8 = b'n';
    pub const FILE: u8 = b'F';
    pub const LINE: u8 = b'L';
    pub const ROUTINE: u8 = b'R';
}

/// The field set carried by an `ErrorResponse` or `NoticeResponse` message.
#[derive(Debug, Clone, Default)]
pub struct ErrorFields {
    pub severity: Option<String>,
    pub severity_non_localized: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub position: Option<u32>,
    pub internal_position: Option<u32>,
    pub internal_query: Option<String>,
    pub where_: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub data_type: Option<String>,
    pub constraint: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub routine: Option<String>,
}

impl ErrorFields {
    /// Parse a `(tag-byte, NUL-terminated string)*` stream, terminated by a zero tag.
    pub fn parse(mut data: &[u8]) -> Result<Self> {
        let mut fields = Self::default();
        while !data.is_empty() && data[0] != 0 {
            let tag = data[0];
            let (value, rest) = crate::protocol::codec::read_cstr(&data[1..])?;
            data = rest;
            match tag {
                field_type::SEVERITY => fields.severity = Some(value.to_string()),
                field_type::SEVERITY_NON_LOCALIZED => {
                    fields.severity_non_localized = Some(value.to_string());
                }
                field_type::CODE => fields.code = Some(value.to_string()),
                field_type::MESSAGE => fields.message = Some(value.to_string()),
                field_type::DETAIL => fields.detail = Some(value.to_string()),
                field_type::HINT => fields.hint = Some(value.to_string()),
                field_type::POSITION => fields.position = value.parse().ok(),
                field_type::INTERNAL_POSITION => fields.internal_position = value.parse().ok(),
                field_type::INTERNAL_QUERY => fields.internal_query = Some(value.to_string()),
                field_type::WHERE => fields.where_ = Some(value.to_string()),
                field_type::SCHEMA => fields.schema = Some(value.to_string()),
                field_type::TABLE => fields.table = Some(value.to_string()),
                field_type::COLUMN => fields.column = Some(value.to_string()),
                field_type::DATA_TYPE => fields.data_type = Some(value.to_string()),
                field_type::CONSTRAINT => fields.constraint = Some(value.to_string()),
                field_type::FILE => fields.file = Some(value.to_string()),
                field_type::LINE => fields.line = value.parse().ok(),
                field_type::ROUTINE => fields.routine = Some(value.to_string()),
                other => tracing::debug!(tag = other as char, "unrecognized error field"),
            }
        }
        Ok(fields)
    }

    /// Severity, preferring the non-localized field (present on PostgreSQL 9.6+).
    pub fn severity(&self) -> &str {
        self.severity_non_localized
            .as_deref()
            .or(self.severity.as_deref())
            .unwrap_or("")
    }

    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.severity(), "FATAL" | "PANIC")
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} (SQLSTATE {})",
            self.severity(),
            self.message(),
            self.code()
        )?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {hint}")?;
        }
        Ok(())
    }
}

/// A PostgreSQL-reported error, carrying the full field set.
pub type ServerError = ErrorFields;

/// Error type for all client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A non-fatal or fatal `ErrorResponse` reported by the server.
    #[error("PostgreSQL error: {0}")]
    Server(ServerError),

    /// Framing or assertion failure while reading/writing the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed or an unsupported auth method was requested.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// TLS handshake or configuration failure.
    #[cfg(feature = "tls")]
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// The connection is closed; carries the fixed lifecycle message.
    #[error("Connection closed before query finished.")]
    ConnectionClosed,

    /// A value could not be encoded or decoded by the type registry.
    #[error("decode error: {0}")]
    Decode(String),

    /// A caller-visible contract violation (wrong parameter count, ambiguous
    /// column name, row-shape mismatch).
    #[error("contract error: {0}")]
    Contract(String),
}

impl Error {
    /// Whether this error indicates the connection can no longer be used.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Io(_) | Error::ConnectionClosed => true,
            Error::Server(fields) => fields.is_fatal(),
            _ => false,
        }
    }

    /// The SQLSTATE code, if this is a server-reported error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(fields) => Some(fields.code()),
            _ => None,
        }
    }
}

impl<Src: std::fmt::Debug, Dst: std::fmt::Debug + ?Sized> From<zerocopy::error::CastError<Src, Dst>>
    for Error
{
    fn from(err: zerocopy::error::CastError<Src, Dst>) -> Self {
        Error::Protocol(format!("zerocopy cast error: {err:?}"))
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fields_stops_at_zero_tag() {
        let mut payload = Vec::new();
        payload.push(field_type::SEVERITY);
        payload.extend_from_slice(b"ERROR\0");
        payload.push(field_type::MESSAGE);
        payload.extend_from_slice(b"syntax error at or near \"SELEKT\"\0");
        payload.push(0);

        let fields = ErrorFields::parse(&payload).unwrap();
        assert_eq!(fields.severity(), "ERROR");
        assert!(fields.message().contains("SELEKT"));
    }

    #[test]
    fn display_includes_sqlstate_and_detail() {
        let mut fields = ErrorFields::default();
        fields.severity = Some("ERROR".into());
        fields.message = Some("boom".into());
        fields.code = Some("42601".into());
        fields.detail = Some("extra context".into());
        let rendered = fields.to_string();
        assert!(rendered.contains("SQLSTATE 42601"));
        assert!(rendered.contains("DETAIL: extra context"));
    }

    #[test]
    fn fatal_severity_marks_connection_broken() {
        let mut fields = ErrorFields::default();
        fields.severity_non_localized = Some("FATAL".into());
        assert!(Error::Server(fields).is_connection_broken());
    }
}
