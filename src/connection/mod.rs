//! The connection core: startup/auth, the lock-token discipline that
//! serialises concurrent callers onto one socket, and the extended-query
//! primitives (`prepare`, `query_streaming`) that `PreparedStatement` and
//! `StreamingQueryResult` are built from.

pub mod dispatcher;
pub mod notify;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};

use crate::catalog::{ColumnValue, TypeRegistry};
use crate::error::{Error, Result};
use crate::opts::ConnectionOptions;
use crate::protocol::frontend;
use crate::protocol::message::BackendMessage;
use crate::protocol::types::FormatCode;
use crate::query_result::StreamingQueryResult;
use crate::statement::PreparedStatement;
use crate::stream::Stream;
use crate::sync_primitives::{Deferred, Pipe, TokenQueue};

/// Why the connection is no longer usable.
#[derive(Debug, Clone)]
pub enum DoneReason {
    /// `close()` was called.
    Closed,
    /// The transport failed, a frame could not be decoded, or the server
    /// sent a FATAL/PANIC `ErrorResponse`.
    Errored(String),
}

pub(crate) struct Inner {
    write_half: Mutex<WriteHalf<Stream>>,
    pipe: Pipe<BackendMessage>,
    lock: TokenQueue,
    done: Deferred<DoneReason>,
    server_params: RwLock<HashMap<String, String>>,
    registry: RwLock<TypeRegistry>,
    notify: notify::Registry,
    pid: AtomicU32,
    secret_key: AtomicU32,
    name_counter: AtomicU64,
}

/// A live connection to a PostgreSQL server.
///
/// Cheap to clone: it is a handle onto the shared state backing the one
/// socket and the one background read-dispatcher task.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Open a connection and run it through the full startup sequence:
    /// transport (+ optional TLS), `StartupMessage`, authentication,
    /// `BackendKeyData`, the first `ReadyForQuery`, parameter assertions,
    /// and an initial `reload_types`.
    pub async fn connect(options: ConnectionOptions) -> Result<Self> {
        let stream = Stream::connect(&options).await?;
        let (read_half, write_half): (ReadHalf<Stream>, WriteHalf<Stream>) =
            tokio::io::split(stream);

        let (pipe_writer, pipe) = Pipe::bounded(1);

        let inner = Arc::new(Inner {
            write_half: Mutex::new(write_half),
            pipe,
            lock: TokenQueue::new(),
            done: Deferred::new(),
            server_params: RwLock::new(HashMap::new()),
            registry: RwLock::new(TypeRegistry::bootstrap()),
            notify: notify::Registry::new(),
            pid: AtomicU32::new(0),
            secret_key: AtomicU32::new(0),
            name_counter: AtomicU64::new(0),
        });

        let dispatcher_inner = inner.clone();
        let dispatcher_options = options.clone();
        tokio::spawn(async move {
            dispatcher::run(dispatcher_inner, read_half, pipe_writer, dispatcher_options).await;
        });

        let connection = Self { inner };
        connection.startup(&options).await?;
        Ok(connection)
    }

    async fn startup(&self, options: &ConnectionOptions) -> Result<()> {
        let database = options.database().to_string();
        let mut params: Vec<(&str, &str)> = vec![("user", &options.user), ("database", &database)];
        for (name, value) in &options.params {
            params.push((name, value));
        }
        let mut buf = Vec::new();
        frontend::write_startup(&mut buf, &params);
        self.write_raw(&buf).await?;

        loop {
            match self.next_message().await? {
                BackendMessage::AuthenticationOk => break,
                BackendMessage::AuthenticationCleartextPassword => {
                    let password = options.password.as_deref().ok_or_else(|| {
                        Error::Auth("server requested a password but none was configured".into())
                    })?;
                    let mut pw_buf = Vec::new();
                    frontend::write_password(&mut pw_buf, password);
                    self.write_raw(&pw_buf).await?;
                }
                BackendMessage::AuthenticationMd5Password { salt } => {
                    let password = options.password.as_deref().ok_or_else(|| {
                        Error::Auth("server requested a password but none was configured".into())
                    })?;
                    let response = frontend::md5_password(&options.user, password, &salt);
                    let mut pw_buf = Vec::new();
                    frontend::write_password(&mut pw_buf, &response);
                    self.write_raw(&pw_buf).await?;
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "startup: unexpected message during authentication: {other:?}"
                    )));
                }
            }
        }

        loop {
            match self.next_message().await? {
                BackendMessage::BackendKeyData { pid, secret_key } => {
                    self.inner.pid.store(pid, Ordering::SeqCst);
                    self.inner.secret_key.store(secret_key, Ordering::SeqCst);
                }
                BackendMessage::ReadyForQuery { .. } => {
                    self.inner.lock.release();
                    break;
                }
                other => {
                    return Err(Error::Protocol(format!(
                        "startup: unexpected message before ReadyForQuery: {other:?}"
                    )));
                }
            }
        }

        {
            let params = self.inner.server_params.read().await;
            if params.get("integer_datetimes").map(String::as_str) != Some("on") {
                return Err(Error::Protocol(format!(
                    "server reports integer_datetimes={:?}, this client requires \"on\"",
                    params.get("integer_datetimes")
                )));
            }
            if params.get("client_encoding").map(String::as_str) != Some("UTF8") {
                return Err(Error::Protocol(format!(
                    "server reports client_encoding={:?}, this client requires UTF8",
                    params.get("client_encoding")
                )));
            }
        }

        self.reload_types().await
    }

    /// Backend process ID, usable for out-of-band `CancelRequest`.
    pub fn pid(&self) -> u32 {
        self.inner.pid.load(Ordering::SeqCst)
    }

    pub(crate) fn secret_key(&self) -> u32 {
        self.inner.secret_key.load(Ordering::SeqCst)
    }

    /// A snapshot of the server's reported parameters (`server_version`,
    /// `TimeZone`, ...).
    pub async fn server_params(&self) -> HashMap<String, String> {
        self.inner.server_params.read().await.clone()
    }

    /// Whether `close()` has been called or the connection has failed.
    pub fn is_closed(&self) -> bool {
        self.inner.done.peek().is_some()
    }

    /// Wait until the connection is no longer usable, returning why.
    pub async fn closed(&self) -> DoneReason {
        self.inner.done.wait().await
    }

    /// Reload the type registry from the server's `pg_type` catalogue.
    /// Called once during startup; safe to call again after `CREATE TYPE`.
    pub async fn reload_types(&self) -> Result<()> {
        let result = self
            .query_streaming(crate::catalog::RELOAD_TYPES_QUERY, &[])
            .await?;
        let buffered = result.buffer().await?;
        let rows = buffered
            .rows
            .into_iter()
            .map(crate::row::Row::into_values)
            .collect::<Vec<_>>();
        self.inner.registry.write().await.reload(rows)?;
        Ok(())
    }

    /// Subscribe `callback` to `channel`, issuing `LISTEN` if this is the
    /// first subscriber.
    pub async fn add_listener(
        &self,
        channel: &str,
        callback: notify::NotificationCallback,
    ) -> Result<notify::ListenerId> {
        self.inner.notify.add_listener(self, channel, callback).await
    }

    /// Unsubscribe; issues `UNLISTEN` once the last subscriber on `channel`
    /// is removed.
    pub async fn remove_listener(&self, channel: &str, id: notify::ListenerId) -> Result<()> {
        self.inner.notify.remove_listener(self, channel, id).await
    }

    pub(crate) async fn listen(&self, channel: &str) -> Result<()> {
        self.execute_command(&format!("LISTEN \"{channel}\"")).await
    }

    pub(crate) async fn unlisten(&self, channel: &str) -> Result<()> {
        self.execute_command(&format!("UNLISTEN \"{channel}\"")).await
    }

    /// Run `sql` for its side effects only, discarding any rows.
    async fn execute_command(&self, sql: &str) -> Result<()> {
        let mut result = self.query_streaming(sql, &[]).await?;
        while result.next_row().await?.is_some() {}
        Ok(())
    }

    /// Parse and describe `sql` as a named, reusable statement.
    pub async fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        self.lock_acquire().await?;
        let name = self.next_statement_name();

        let mut buf = Vec::new();
        frontend::write_parse(&mut buf, &name, sql, &[]);
        frontend::write_describe_statement(&mut buf, &name);
        frontend::write_sync(&mut buf);
        self.write_raw(&buf).await?;

        match self.next_or_fail().await? {
            BackendMessage::ParseComplete => {}
            other => {
                return Err(Error::Protocol(format!(
                    "prepare: expected ParseComplete, got {other:?}"
                )));
            }
        }
        let param_oids = match self.next_or_fail().await? {
            BackendMessage::ParameterDescription { type_oids } => type_oids,
            other => {
                return Err(Error::Protocol(format!(
                    "prepare: expected ParameterDescription, got {other:?}"
                )));
            }
        };
        let columns = match self.next_or_fail().await? {
            BackendMessage::RowDescription { columns } => columns,
            BackendMessage::NoData => Vec::new(),
            other => {
                return Err(Error::Protocol(format!(
                    "prepare: expected RowDescription or NoData, got {other:?}"
                )));
            }
        };
        match self.next_or_fail().await? {
            BackendMessage::ReadyForQuery { .. } => {}
            other => {
                return Err(Error::Protocol(format!(
                    "prepare: expected ReadyForQuery, got {other:?}"
                )));
            }
        }
        self.inner.lock.release();

        Ok(PreparedStatement::new(self.clone(), name, param_oids, columns))
    }

    /// Run `sql` as a one-shot unnamed statement and buffer every row.
    pub async fn query(
        &self,
        sql: &str,
        params: &[ColumnValue],
    ) -> Result<crate::query_result::BufferedQueryResult> {
        self.query_streaming(sql, params).await?.buffer().await
    }

    /// Parse, bind, and execute `sql` as a one-shot unnamed statement, all
    /// in a single fused round trip (no intervening `ReadyForQuery`).
    pub async fn query_streaming(
        &self,
        sql: &str,
        params: &[ColumnValue],
    ) -> Result<StreamingQueryResult> {
        self.lock_acquire().await?;
        let param_oids: Vec<_> = params.iter().map(ColumnValue::natural_oid).collect();

        let mut buf = Vec::new();
        frontend::write_parse(&mut buf, "", sql, &param_oids);
        frontend::write_describe_statement(&mut buf, "");

        let param_bytes = match self.encode_params(params, &param_oids).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.inner.lock.release();
                return Err(e);
            }
        };
        frontend::write_bind(&mut buf, "", "", &param_bytes, &[FormatCode::Binary]);
        frontend::write_execute(&mut buf, "", 0);
        frontend::write_sync(&mut buf);
        self.write_raw(&buf).await?;

        match self.next_or_fail().await? {
            BackendMessage::ParseComplete => {}
            other => {
                return Err(Error::Protocol(format!(
                    "query_streaming: expected ParseComplete, got {other:?}"
                )));
            }
        }
        match self.next_or_fail().await? {
            BackendMessage::ParameterDescription { .. } => {}
            other => {
                return Err(Error::Protocol(format!(
                    "query_streaming: expected ParameterDescription, got {other:?}"
                )));
            }
        }
        let columns = match self.next_or_fail().await? {
            BackendMessage::RowDescription { columns } => columns,
            BackendMessage::NoData => Vec::new(),
            other => {
                return Err(Error::Protocol(format!(
                    "query_streaming: expected RowDescription or NoData, got {other:?}"
                )));
            }
        };
        match self.next_or_fail().await? {
            BackendMessage::BindComplete => {}
            other => {
                return Err(Error::Protocol(format!(
                    "query_streaming: expected BindComplete, got {other:?}"
                )));
            }
        }

        Ok(StreamingQueryResult::new(self.clone(), columns))
    }

    pub(crate) async fn encode_params(
        &self,
        params: &[ColumnValue],
        oids: &[crate::protocol::types::Oid],
    ) -> Result<Vec<Option<Vec<u8>>>> {
        let registry = self.inner.registry.read().await;
        let mut encoded = Vec::with_capacity(params.len());
        for (i, (value, &oid)) in params.iter().zip(oids).enumerate() {
            if value.is_null() {
                encoded.push(None);
                continue;
            }
            let mut bytes = Vec::new();
            registry
                .send(oid, value, &mut bytes)
                .map_err(|e| Error::Contract(format!("Error sending param ${}: {e}", i + 1)))?;
            encoded.push(Some(bytes));
        }
        Ok(encoded)
    }

    pub(crate) async fn registry_read(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.inner.registry.read().await
    }

    /// Acquire the lock token, FIFO-ordered against every other caller.
    ///
    /// Raced against the done-latch: a token already queued behind other
    /// callers when the connection closes must reject rather than wait on a
    /// token that will now never come back around.
    pub(crate) async fn lock_acquire(&self) -> Result<()> {
        tokio::select! {
            result = self.inner.lock.acquire() => result,
            _ = self.inner.done.wait() => Err(Error::ConnectionClosed),
        }
    }

    pub(crate) async fn write_raw(&self, buf: &[u8]) -> Result<()> {
        if self.inner.done.peek().is_some() {
            return Err(Error::ConnectionClosed);
        }
        let mut write_half = self.inner.write_half.lock().await;
        write_half.write_all(buf).await?;
        write_half.flush().await?;
        Ok(())
    }

    /// Read the next dispatcher message, raced against the done-latch so a
    /// read already blocked when the connection closes rejects instead of
    /// waiting on a dispatcher that has stopped sending.
    pub(crate) async fn next_message(&self) -> Result<BackendMessage> {
        tokio::select! {
            result = self.inner.pipe.read() => result,
            _ = self.inner.done.wait() => Err(Error::ConnectionClosed),
        }
    }

    /// Read the next message; on a non-fatal `ErrorResponse`, drain to
    /// `ReadyForQuery`, release the lock, and surface the server error.
    /// Any other error leaves the lock held — the connection's state is
    /// unknown, so releasing it would violate the "clean state" invariant.
    pub(crate) async fn next_or_fail(&self) -> Result<BackendMessage> {
        match self.next_message().await? {
            BackendMessage::ErrorResponse { fields } => {
                let _ = self.drain_to_ready_for_query().await;
                self.inner.lock.release();
                Err(Error::Server(fields))
            }
            other => Ok(other),
        }
    }

    async fn drain_to_ready_for_query(&self) -> Result<()> {
        loop {
            if let BackendMessage::ReadyForQuery { .. } = self.next_message().await? {
                return Ok(());
            }
        }
    }

    /// Drain a result a consumer abandoned mid-stream, then release the
    /// lock. Spawned by `StreamingQueryResult::drop` on cancellation.
    pub(crate) async fn drain_current_result(&self) -> Result<()> {
        loop {
            if let BackendMessage::CommandComplete { .. } = self.next_message().await? {
                break;
            }
        }
        if let BackendMessage::ReadyForQuery { .. } = self.next_message().await? {
            self.inner.lock.release();
        }
        Ok(())
    }

    pub(crate) fn release_lock(&self) {
        self.inner.lock.release();
    }

    fn next_statement_name(&self) -> String {
        let n = self.inner.name_counter.fetch_add(1, Ordering::Relaxed);
        format!("pw_stmt_{n}")
    }

    /// Close gracefully: send `Terminate`, mark the connection done, and
    /// shut down the transport. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.inner.done.peek().is_some() {
            return Ok(());
        }
        let mut buf = Vec::new();
        frontend::write_terminate(&mut buf);
        let _ = self.write_raw(&buf).await;
        self.inner.done.resolve(DoneReason::Closed);
        let mut write_half = self.inner.write_half.lock().await;
        let _ = write_half.shutdown().await;
        Ok(())
    }
}
