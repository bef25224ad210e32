//! Framed TCP bridge: handshake, keepalive and command frames.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use super::frame::{FrameCodec, FrameError, PING, PONG};
use crate::dispatch::{CommandRequest, CommandResponse, Dispatcher};

pub const DEFAULT_HANDSHAKE_REQUEST: &str = "YAUM_HANDSHAKE_REQUEST";
pub const DEFAULT_HANDSHAKE_RESPONSE: &str = "YAUM_HANDSHAKE_RESPONSE";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session ended early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("unexpected handshake {0:?}")]
    BadHandshake(String),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

#[derive(Debug, Clone)]
pub struct TcpBridge {
    dispatcher: Dispatcher,
    codec: FrameCodec,
    handshake_request: String,
    handshake_response: String,
    handshake_timeout: Duration,
}

impl TcpBridge {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            codec: FrameCodec::default(),
            handshake_request: DEFAULT_HANDSHAKE_REQUEST.to_string(),
            handshake_response: DEFAULT_HANDSHAKE_RESPONSE.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_codec(mut self, codec: FrameCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_handshake(mut self, request: impl Into<String>, response: impl Into<String>) -> Self {
        self.handshake_request = request.into();
        self.handshake_response = response.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Accept connections forever, one task per client.
    pub async fn serve(&self, listener: TcpListener) -> io::Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
            }
            tracing::info!("Client connected: {}", peer);

            let bridge = self.clone();
            tokio::spawn(async move {
                match bridge.handle_connection(stream).await {
                    Ok(()) => tracing::info!("Client disconnected: {}", peer),
                    Err(e) => tracing::warn!("Session with {} ended: {}", peer, e),
                }
            });
        }
    }

    /// Run one session until the peer closes the stream.
    pub async fn handle_connection<S>(&self, mut stream: S) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.handshake(&mut stream).await?;

        let mut buf = BytesMut::with_capacity(8 * 1024);
        loop {
            loop {
                match self.codec.decode(&mut buf) {
                    Ok(Some(body)) => {
                        let reply = self.reply_to(&body).await?;
                        stream.write_all(&reply).await?;
                    }
                    Ok(None) => break,
                    Err(e) => tracing::warn!("Dropping malformed frame: {}", e),
                }
            }

            if stream.read_buf(&mut buf).await? == 0 {
                return Ok(());
            }
        }
    }

    async fn handshake<S>(&self, stream: &mut S) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut received = vec![0u8; self.handshake_request.len()];
        tokio::time::timeout(self.handshake_timeout, stream.read_exact(&mut received))
            .await
            .map_err(|_| SessionError::HandshakeTimeout)??;

        if received != self.handshake_request.as_bytes() {
            let text = String::from_utf8_lossy(&received).into_owned();
            tracing::warn!("Handshake rejected: {:?}", text);
            return Err(SessionError::BadHandshake(text));
        }

        stream.write_all(self.handshake_response.as_bytes()).await?;
        stream.flush().await?;
        tracing::debug!("Handshake complete");
        Ok(())
    }

    /// Encoded reply frame for one inbound body.
    async fn reply_to(&self, body: &str) -> Result<BytesMut, SessionError> {
        let mut out = BytesMut::new();
        if body == PING {
            self.codec.encode(PONG, &mut out)?;
            return Ok(out);
        }

        let response = match serde_json::from_str::<CommandRequest>(body) {
            Ok(request) => {
                tracing::debug!("Command '{}' (id {:?})", request.command, request.id);
                self.dispatcher.handle(request).await
            }
            Err(e) => {
                tracing::warn!("Malformed command: {}", e);
                let id = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));
                CommandResponse::protocol_error(id, format!("malformed request: {}", e))
            }
        };

        let encoded = serde_json::to_string(&response)?;
        if let Err(e) = self.codec.encode(&encoded, &mut out) {
            tracing::error!("Response does not fit in a frame: {}", e);
            let fallback = CommandResponse::protocol_error(response.id, e.to_string());
            self.codec.encode(&serde_json::to_string(&fallback)?, &mut out)?;
        }
        Ok(out)
    }
}
