//! A statement parsed and described once, then executed (and bound) many
//! times under its own name.

use crate::catalog::ColumnValue;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::frontend;
use crate::protocol::message::{BackendMessage, ColumnMetadata};
use crate::protocol::types::{FormatCode, Oid};
use crate::query_result::StreamingQueryResult;

/// A named, server-side prepared statement.
///
/// Holds the parameter and result-column types reported by the server at
/// `prepare` time, so every `execute` call can validate the argument list
/// and encode parameters without another round trip.
pub struct PreparedStatement {
    connection: Connection,
    name: String,
    param_oids: Vec<Oid>,
    columns: Vec<ColumnMetadata>,
}

impl PreparedStatement {
    pub(crate) fn new(
        connection: Connection,
        name: String,
        param_oids: Vec<Oid>,
        columns: Vec<ColumnMetadata>,
    ) -> Self {
        Self {
            connection,
            name,
            param_oids,
            columns,
        }
    }

    pub fn param_oids(&self) -> &[Oid] {
        &self.param_oids
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Bind `params`, run the statement, and buffer every row.
    pub async fn execute(&self, params: &[ColumnValue]) -> Result<crate::query_result::BufferedQueryResult> {
        self.execute_streaming(params).await?.buffer().await
    }

    /// Bind `params` and run the statement, returning a streaming result.
    pub async fn execute_streaming(&self, params: &[ColumnValue]) -> Result<StreamingQueryResult> {
        if params.len() != self.param_oids.len() {
            return Err(Error::Contract(format!(
                "statement {:?} expects {} parameters, got {}",
                self.name,
                self.param_oids.len(),
                params.len()
            )));
        }

        self.connection.lock_acquire().await?;
        let param_bytes = match self.connection.encode_params(params, &self.param_oids).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.connection.release_lock();
                return Err(e);
            }
        };

        let mut buf = Vec::new();
        frontend::write_bind(&mut buf, "", &self.name, &param_bytes, &[FormatCode::Binary]);
        frontend::write_execute(&mut buf, "", 0);
        frontend::write_sync(&mut buf);
        self.connection.write_raw(&buf).await?;

        match self.connection.next_or_fail().await? {
            BackendMessage::BindComplete => {}
            other => {
                return Err(Error::Protocol(format!(
                    "execute: expected BindComplete, got {other:?}"
                )));
            }
        }

        Ok(StreamingQueryResult::new(self.connection.clone(), self.columns.clone()))
    }

    /// Close the statement on the server, freeing its plan.
    pub async fn close(&self) -> Result<()> {
        self.connection.lock_acquire().await?;
        let mut buf = Vec::new();
        frontend::write_close_statement(&mut buf, &self.name);
        frontend::write_sync(&mut buf);
        self.connection.write_raw(&buf).await?;

        match self.connection.next_or_fail().await? {
            BackendMessage::CloseComplete => {}
            other => {
                return Err(Error::Protocol(format!(
                    "close: expected CloseComplete, got {other:?}"
                )));
            }
        }
        match self.connection.next_or_fail().await? {
            BackendMessage::ReadyForQuery { .. } => {}
            other => {
                return Err(Error::Protocol(format!(
                    "close: expected ReadyForQuery, got {other:?}"
                )));
            }
        }
        self.connection.release_lock();
        Ok(())
    }
}
