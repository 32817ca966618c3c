//! Async transport abstraction: plain TCP, TLS, or a Unix-domain socket.
//!
//! `Stream` itself only implements `AsyncRead`/`AsyncWrite`; the connection
//! core splits it with `tokio::io::split` so the background read dispatcher
//! and the command writer can make progress independently.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpStream, UnixStream};

#[cfg(feature = "tls")]
use tokio_native_tls::TlsStream;

use crate::error::{Error, Result};
use crate::opts::{ConnectionOptions, SslMode};
use crate::protocol::frontend;

pub enum Stream {
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(TlsStream<TcpStream>),
    Unix(UnixStream),
}

impl Stream {
    /// Open the transport named by `options` and, if requested, negotiate
    /// TLS before returning. Does not perform the PostgreSQL startup
    /// handshake itself.
    pub async fn connect(options: &ConnectionOptions) -> Result<Self> {
        let mut stream = if let Some(path) = &options.socket {
            Self::Unix(UnixStream::connect(path).await?)
        } else {
            let addr = format!("{}:{}", options.host, options.port);
            Self::Tcp(TcpStream::connect(&addr).await?)
        };

        if options.ssl_mode == SslMode::VerifyFull {
            stream = stream.upgrade_to_tls(options).await?;
        }

        Ok(stream)
    }

    #[cfg(feature = "tls")]
    async fn upgrade_to_tls(self, options: &ConnectionOptions) -> Result<Self> {
        let Stream::Tcp(mut tcp_stream) = self else {
            return Err(Error::Protocol("TLS is only supported over TCP".into()));
        };

        let mut request = Vec::new();
        frontend::write_ssl_request(&mut request);
        tcp_stream.write_all(&request).await?;
        tcp_stream.flush().await?;

        let mut reply = [0u8; 1];
        tcp_stream.read_exact(&mut reply).await?;
        match reply[0] {
            b'S' => {}
            b'N' => {
                return Err(Error::Protocol(
                    "Server does not allow SSL connections".into(),
                ));
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected SSLRequest reply byte: {other:#x}"
                )));
            }
        }

        let mut builder = native_tls::TlsConnector::builder();
        if let Some(cert_path) = &options.ssl_root_cert {
            let pem = std::fs::read(cert_path).map_err(Error::Io)?;
            let cert = native_tls::Certificate::from_pem(&pem)?;
            builder.add_root_certificate(cert);
        }
        let connector = tokio_native_tls::TlsConnector::from(builder.build()?);
        let tls_stream = connector
            .connect(&options.host, tcp_stream)
            .await
            .map_err(|e| Error::Protocol(format!("TLS handshake failed: {e}")))?;
        Ok(Stream::Tls(tls_stream))
    }

    #[cfg(not(feature = "tls"))]
    async fn upgrade_to_tls(self, _options: &ConnectionOptions) -> Result<Self> {
        Err(Error::Protocol(
            "sslmode=verify-full requires the `tls` feature".into(),
        ))
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "tls")]
            Stream::Tls(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "tls")]
            Stream::Tls(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(feature = "tls")]
            Stream::Tls(s) => Pin::new(s).poll_flush(cx),
            Stream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "tls")]
            Stream::Tls(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Read one frame (`type byte`, `payload`) from any `AsyncRead` half.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(u8, Vec<u8>)> {
    let type_byte = reader.read_u8().await?;

    let mut length_bytes = [0u8; 4];
    reader.read_exact(&mut length_bytes).await?;
    let length = u32::from_be_bytes(length_bytes) as usize;
    let payload_len = length.checked_sub(4).ok_or_else(|| {
        Error::Protocol(format!("frame length {length} smaller than the length field itself"))
    })?;

    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;
    Ok((type_byte, payload))
}
