//! The background task that owns the read half of the transport.
//!
//! Everything the rest of the connection learns about the server arrives
//! through this task: it decodes frames, handles the messages that can
//! arrive asynchronously (`ParameterStatus`, `NoticeResponse`,
//! `NotificationResponse`) itself, and forwards everything else into the
//! single-slot synchronous channel that whichever operation holds the lock
//! reads from.

use std::sync::Arc;

use tokio::io::ReadHalf;

use super::{DoneReason, Inner};
use crate::opts::{ConnectionOptions, Notification};
use crate::protocol::message::{self, BackendMessage};
use crate::stream::{read_frame, Stream};
use crate::sync_primitives::PipeWriter;

pub(super) async fn run(
    inner: Arc<Inner>,
    mut read_half: ReadHalf<Stream>,
    pipe_writer: PipeWriter<BackendMessage>,
    options: ConnectionOptions,
) {
    loop {
        let (type_byte, payload) = match read_frame(&mut read_half).await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "connection read failed; closing");
                inner.done.resolve(DoneReason::Errored(e.to_string()));
                return;
            }
        };

        if options.debug {
            tracing::debug!(type_byte = type_byte as char, len = payload.len(), "recv frame");
        }

        let message = match message::decode(type_byte, &payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode frame; closing");
                inner.done.resolve(DoneReason::Errored(e.to_string()));
                return;
            }
        };

        match message {
            BackendMessage::ParameterStatus { name, value } => {
                tracing::trace!(name = %name, value = %value, "parameter status");
                inner.server_params.write().await.insert(name, value);
            }
            BackendMessage::NoticeResponse { fields } => {
                tracing::debug!(message = %fields.message(), "notice response");
                if let Some(handler) = &options.notice_handler {
                    handler(fields);
                }
            }
            BackendMessage::NotificationResponse { pid, channel, payload } => {
                tracing::trace!(pid, channel = %channel, "notification response");
                let notification = Notification { pid, channel, payload };
                let delivered = inner.notify.dispatch(notification.clone()).await;
                if !delivered {
                    if let Some(handler) = &options.notification_handler {
                        handler(notification);
                    }
                }
            }
            other => {
                if let BackendMessage::ErrorResponse { fields } = &other {
                    if fields.is_fatal() {
                        tracing::warn!(message = %fields.message(), "fatal error from server; closing connection");
                        inner.done.resolve(DoneReason::Errored(fields.to_string()));
                    }
                }
                if pipe_writer.write(other).await.is_err() {
                    return;
                }
            }
        }
    }
}
