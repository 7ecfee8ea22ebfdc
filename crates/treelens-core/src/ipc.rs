//! Unix socket transport for the bridge.
//!
//! A [`BridgeServer`] exposes a backend to one inspector at a time using a
//! JSON-over-newlines protocol:
//! - the inspector writes one [`InboundCommand`] per line
//! - the server writes one [`BridgeFrame`] per line
//!
//! Each connection gets its own [`ChannelBridge`], attached for the lifetime
//! of the connection. An inspector connecting while another is attached
//! receives an `error` frame and is disconnected.
//!
//! # Socket Location
//!
//! Sockets are created in `~/.treelens/` with the naming pattern
//! `treelens_{session_name}.sock`. Use [`socket_path`] to get the path for a
//! session.
//!
//! # Example
//!
//! ```no_run
//! use treelens_core::ipc::BridgeClient;
//! use treelens_core::protocol::InboundCommand;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = BridgeClient::connect("my-app").await.unwrap();
//!     client.send(&InboundCommand::HideHighlight).await.unwrap();
//!     let frame = client.read_frame().await.unwrap();
//!     println!("{:?}", frame);
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::backend::Backend;
use crate::bridge::ChannelBridge;
use crate::config::treelens_dir;
use crate::protocol::{BridgeFrame, InboundCommand};

/// Errors that can occur in the socket transport.
#[derive(Error, Debug)]
pub enum IpcError {
    /// An I/O error occurred (connection, read, write).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend refused the connection's bridge.
    #[error("bridge rejected: {0}")]
    BridgeRejected(String),
}

/// Returns the Unix socket path for a session
/// (`~/.treelens/treelens_{session_name}.sock`).
pub fn socket_path(session_name: &str) -> PathBuf {
    treelens_dir().join(format!("treelens_{}.sock", session_name))
}

async fn write_line<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(message)? + "\n";
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Serves a backend's bridge on a Unix socket.
///
/// The socket file is removed when the server is dropped.
pub struct BridgeServer {
    backend: Arc<Backend>,
    socket_path: PathBuf,
}

impl BridgeServer {
    pub fn new(backend: Arc<Backend>, session_name: &str) -> Self {
        Self {
            backend,
            socket_path: socket_path(session_name),
        }
    }

    /// Accepts inspector connections until an accept fails.
    ///
    /// Any existing socket file at the path is removed before binding.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the socket cannot be bound or an accept fails
    pub async fn run(&self) -> Result<(), IpcError> {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove existing socket");
            }
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "bridge server listening");

        loop {
            let (stream, _) = listener.accept().await?;
            debug!("inspector connected");
            let backend = self.backend.clone();
            tokio::spawn(
                async move {
                    if let Err(e) = Self::handle_inspector(stream, backend).await {
                        debug!(error = %e, "inspector disconnected");
                    }
                }
                .instrument(info_span!("inspector")),
            );
        }
    }

    async fn handle_inspector(stream: UnixStream, backend: Arc<Backend>) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let (bridge, mut frames) = ChannelBridge::new();

        if let Err(e) = backend.attach_bridge(bridge.clone()) {
            write_line(&mut writer, &BridgeFrame::Error { message: e.to_string() }).await?;
            return Err(IpcError::BridgeRejected(e.to_string()));
        }

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if let Err(e) = write_line(&mut writer, &frame).await {
                    debug!(error = %e, "failed to write frame to inspector");
                    break;
                }
            }
        });

        let result = Self::read_commands(reader, &bridge).await;
        backend.detach_bridge();
        writer_task.abort();
        debug!("inspector bridge closed");
        result
    }

    async fn read_commands(reader: OwnedReadHalf, bridge: &ChannelBridge) -> Result<(), IpcError> {
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(()); // Inspector disconnected
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundCommand>(trimmed) {
                Ok(command) => {
                    bridge.dispatch(command);
                }
                Err(e) => {
                    warn!(error = %e, "malformed inbound command");
                    bridge.report_error(format!("malformed command: {e}"));
                }
            }
        }
    }

    /// Returns a reference to the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to clean up socket on drop");
            }
        }
    }
}

/// Inspector-side connection to a [`BridgeServer`].
pub struct BridgeClient {
    stream: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl BridgeClient {
    /// Connects to the bridge server of `session_name`.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the connection fails (e.g., server not running)
    pub async fn connect(session_name: &str) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(socket_path(session_name)).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            stream: BufReader::new(reader),
            writer,
        })
    }

    /// Sends one command. Commands have no direct reply.
    pub async fn send(&mut self, command: &InboundCommand) -> Result<(), IpcError> {
        write_line(&mut self.writer, command).await
    }

    /// Reads the next frame from the server.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the read fails or the server closed the connection
    /// - [`IpcError::Json`] if the frame cannot be parsed
    pub async fn read_frame(&mut self) -> Result<BridgeFrame, IpcError> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "bridge server closed the connection",
            )));
        }
        Ok(serde_json::from_str(line.trim())?)
    }
}
