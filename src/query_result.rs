//! Streaming and buffered result sets produced by `query_streaming` and
//! `PreparedStatement::execute`.

use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::message::{BackendMessage, ColumnMetadata};
use crate::protocol::message::parse_completion_tag;
use crate::row::Row;

/// The command tag and, for DML/SELECT, the row count reported by
/// `CommandComplete`.
#[derive(Debug, Clone)]
pub struct CompletionInfo {
    pub tag: String,
    pub rows_affected: Option<u64>,
}

enum ResultState {
    Streaming,
    Completed(CompletionInfo),
}

/// A result set being read row by row from the wire.
///
/// Dropping this before reading through to completion spawns a detached
/// task that drains the remaining rows and releases the connection's lock
/// token — Rust has no async `Drop`, so this is the closest equivalent to
/// the synchronous cancel-and-drain a caller would otherwise have to do by
/// hand.
pub struct StreamingQueryResult {
    connection: Connection,
    columns: Arc<Vec<ColumnMetadata>>,
    state: ResultState,
}

impl StreamingQueryResult {
    pub(crate) fn new(connection: Connection, columns: Vec<ColumnMetadata>) -> Self {
        Self {
            connection,
            columns: Arc::new(columns),
            state: ResultState::Streaming,
        }
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// `Some` once the final `CommandComplete` has been read.
    pub fn completion_info(&self) -> Option<&CompletionInfo> {
        match &self.state {
            ResultState::Completed(info) => Some(info),
            ResultState::Streaming => None,
        }
    }

    pub fn completed(&self) -> bool {
        matches!(self.state, ResultState::Completed(_))
    }

    /// Read the next row, or `None` once `CommandComplete` has been seen.
    /// Calling this again after `None` simply returns `None` again.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.completed() {
            return Ok(None);
        }
        loop {
            match self.connection.next_or_fail().await? {
                BackendMessage::DataRow { values } => {
                    let row = self.decode_row(values).await?;
                    return Ok(Some(row));
                }
                BackendMessage::CommandComplete { tag } => {
                    let rows_affected = parse_completion_tag(&tag);
                    match self.connection.next_or_fail().await? {
                        BackendMessage::ReadyForQuery { .. } => {}
                        other => {
                            return Err(Error::Protocol(format!(
                                "expected ReadyForQuery after CommandComplete, got {other:?}"
                            )));
                        }
                    }
                    self.connection.release_lock();
                    self.state = ResultState::Completed(CompletionInfo { tag, rows_affected });
                    return Ok(None);
                }
                BackendMessage::EmptyQueryResponse => continue,
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message while streaming rows: {other:?}"
                    )));
                }
            }
        }
    }

    async fn decode_row(&self, values: Vec<Option<Vec<u8>>>) -> Result<Row> {
        let registry = self.connection.registry_read().await;
        let mut decoded = Vec::with_capacity(values.len());
        for (i, (column, value)) in self.columns.iter().zip(values).enumerate() {
            let value = match value {
                None => crate::catalog::ColumnValue::Null,
                Some(bytes) => registry
                    .recv(column.type_oid, &bytes)
                    .map_err(|e| Error::Decode(format!("Error receiving column {i}: {e}")))?,
            };
            decoded.push(value);
        }
        Ok(Row::new(self.columns.clone(), decoded))
    }

    /// Read every remaining row into memory.
    pub async fn buffer(mut self) -> Result<BufferedQueryResult> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        let completion = match &self.state {
            ResultState::Completed(info) => info.clone(),
            ResultState::Streaming => {
                return Err(Error::Protocol(
                    "stream ended without a CommandComplete".into(),
                ));
            }
        };
        Ok(BufferedQueryResult {
            columns: self.columns.clone(),
            rows,
            completion,
        })
    }
}

impl Drop for StreamingQueryResult {
    fn drop(&mut self) {
        if self.completed() {
            return;
        }
        let connection = self.connection.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.drain_current_result().await {
                tracing::debug!(error = %e, "failed to drain abandoned query result");
            }
        });
    }
}

/// A fully-read result set.
#[derive(Debug, Clone)]
pub struct BufferedQueryResult {
    pub columns: Arc<Vec<ColumnMetadata>>,
    pub rows: Vec<Row>,
    pub completion: CompletionInfo,
}

impl BufferedQueryResult {
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn completion_info(&self) -> &CompletionInfo {
        &self.completion
    }

    /// Consume the result, asserting it has exactly one row.
    pub fn one_row(mut self) -> Result<Row> {
        match self.rows.len() {
            1 => Ok(self.rows.remove(0)),
            n => Err(Error::Contract(format!("expected exactly one row, got {n}"))),
        }
    }

    /// Consume the result, asserting exactly one row with exactly one column.
    pub fn one_value(self) -> Result<crate::catalog::ColumnValue> {
        self.one_row()?.into_only_value()
    }
}
