//! An async PostgreSQL wire-protocol client with a runtime type registry.
//!
//! # Features
//!
//! - Binary-only wire protocol (v3): no text-format fallback, no simple
//!   query path.
//! - A single background task owns the read half of the socket and
//!   dispatches frames to whichever call currently holds the connection's
//!   lock token, in FIFO order.
//! - Types are resolved dynamically against the server's own `pg_type`
//!   catalogue, so custom types and extensions work without codegen.
//!
//! # Example
//!
//! ```no_run
//! use pgwire_client::{Connection, ConnectionOptions};
//!
//! #[tokio::main]
//! async fn main() -> pgwire_client::Result<()> {
//!     let opts = ConnectionOptions {
//!         host: "localhost".into(),
//!         user: "postgres".into(),
//!         database: Some("mydb".into()),
//!         password: Some("secret".into()),
//!         ..Default::default()
//!     };
//!
//!     let conn = Connection::connect(opts).await?;
//!     let row = conn.query("SELECT 1", &[]).await?.one_row()?;
//!     println!("{:?}", row.get(0));
//!
//!     conn.close().await?;
//!     Ok(())
//! }
//! ```

// private
mod error;
mod opts;
mod row;
mod statement;
mod stream;
mod sync_primitives;

// pub
pub mod catalog;
pub mod connection;
pub mod protocol;
pub mod query_result;

pub use catalog::ColumnValue;
pub use connection::{Connection, DoneReason};
pub use connection::notify::{ListenerId, NotificationCallback};
pub use error::{Error, ErrorFields, Result, ServerError};
pub use opts::{ConnectionOptions, Notification, NoticeHandler, NotificationHandler, SslMode};
pub use query_result::{BufferedQueryResult, CompletionInfo, StreamingQueryResult};
pub use row::Row;
pub use statement::PreparedStatement;
