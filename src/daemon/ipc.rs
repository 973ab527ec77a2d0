// Inter-process communication via Unix domain sockets with length-prefixed JSON protocol

use crate::corpus::NewEntry;
use crate::error::{Result, TextsimError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// Maximum message size (64MB, enough for a 5000-entry extend batch)
const MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024;

/// IPC requests sent from the CLI (or any other client) to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IpcMessage {
    /// Build the similarity index if it does not exist yet
    Initialize,
    /// Rank corpus entries by similarity to a query
    Search {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        top_n: Option<i64>,
    },
    /// Append entries to the corpus
    Extend { entries: Vec<NewEntry> },
    /// Corpus totals per category
    Stats,
    /// Request daemon status
    Status,
    /// Request daemon to stop
    Stop,
}

/// Why a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Internal,
}

/// IPC response message sent from daemon back to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl IpcResponse {
    /// Create a successful response
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error_kind: None,
        }
    }

    /// Create a successful response with data
    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error_kind: None,
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error_kind: Some(ErrorKind::Internal),
        }
    }

    /// Error response classified by the error's cause
    pub fn from_error(err: &TextsimError) -> Self {
        let kind = if err.is_invalid_argument() {
            ErrorKind::InvalidArgument
        } else {
            ErrorKind::Internal
        };
        Self {
            success: false,
            message: Some(err.to_string()),
            data: None,
            error_kind: Some(kind),
        }
    }

    /// Serialize a payload into a successful response
    pub fn with_payload<T: Serialize>(payload: &T) -> Result<Self> {
        let data = serde_json::to_value(payload).map_err(|e| TextsimError::Json {
            source: e,
            context: "Failed to serialize response payload".to_string(),
        })?;
        Ok(Self::success_with_data(data))
    }

    /// Decode `data` into a typed payload, turning failures into errors
    pub fn into_payload<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        if !self.success {
            let message = self.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(match self.error_kind {
                Some(ErrorKind::InvalidArgument) => TextsimError::InvalidArgument(message),
                _ => TextsimError::Daemon(message),
            });
        }

        let data = self
            .data
            .ok_or_else(|| TextsimError::Daemon("Response carried no data".to_string()))?;
        serde_json::from_value(data).map_err(|e| TextsimError::Json {
            source: e,
            context: "Failed to decode response payload".to_string(),
        })
    }
}

/// Unix domain socket server for IPC
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            listener: None,
        }
    }

    /// Bind to the socket path and start listening
    pub async fn bind(&mut self) -> Result<()> {
        // Remove existing socket file if it exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| TextsimError::Io {
                source: e,
                context: format!("Failed to remove existing socket: {:?}", self.socket_path),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TextsimError::Io {
                source: e,
                context: format!("Failed to create socket directory: {:?}", parent),
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to bind to socket: {:?}", self.socket_path),
        })?;

        self.listener = Some(listener);

        tracing::info!("IPC server listening on {:?}", self.socket_path);
        Ok(())
    }

    /// Accept incoming connections
    pub async fn accept(&self) -> Result<UnixStream> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| TextsimError::Daemon("Server not bound".to_string()))?;

        let (stream, _addr) = listener.accept().await.map_err(|e| TextsimError::Io {
            source: e,
            context: "Failed to accept connection".to_string(),
        })?;

        Ok(stream)
    }

    /// Shutdown the server and clean up socket file
    pub fn shutdown(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| TextsimError::Io {
                source: e,
                context: format!("Failed to remove socket: {:?}", self.socket_path),
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Read a length-prefixed JSON frame
async fn read_frame<T: for<'de> Deserialize<'de>>(stream: &mut UnixStream, what: &str) -> Result<T> {
    let length = stream.read_u32().await.map_err(|e| TextsimError::Io {
        source: e,
        context: format!("Failed to read {} length", what),
    })?;

    if length > MAX_MESSAGE_SIZE {
        return Err(TextsimError::Daemon(format!(
            "{} too large: {} bytes (max: {})",
            what, length, MAX_MESSAGE_SIZE
        )));
    }

    let mut buffer = vec![0u8; length as usize];
    stream
        .read_exact(&mut buffer)
        .await
        .map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to read {} payload", what),
        })?;

    serde_json::from_slice(&buffer).map_err(|e| TextsimError::Json {
        source: e,
        context: format!("Failed to deserialize {}", what),
    })
}

/// Write a length-prefixed JSON frame (4-byte big-endian length)
async fn write_frame<T: Serialize>(stream: &mut UnixStream, value: &T, what: &str) -> Result<()> {
    let payload = serde_json::to_vec(value).map_err(|e| TextsimError::Json {
        source: e,
        context: format!("Failed to serialize {}", what),
    })?;

    if payload.len() > MAX_MESSAGE_SIZE as usize {
        return Err(TextsimError::Daemon(format!(
            "{} too large: {} bytes (max: {})",
            what,
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    stream
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to write {} length", what),
        })?;

    stream
        .write_all(&payload)
        .await
        .map_err(|e| TextsimError::Io {
            source: e,
            context: format!("Failed to write {} payload", what),
        })?;

    stream.flush().await.map_err(|e| TextsimError::Io {
        source: e,
        context: format!("Failed to flush {}", what),
    })?;

    Ok(())
}

/// Read a request from a client
pub async fn read_message(stream: &mut UnixStream) -> Result<IpcMessage> {
    read_frame(stream, "IPC message").await
}

/// Write a response back to a client
pub async fn write_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
    write_frame(stream, response, "IPC response").await
}

/// IPC client for sending messages to the daemon
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Connect to the daemon and send a message, returning the response
    pub async fn send(&self, message: &IpcMessage) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                    TextsimError::DaemonNotRunning
                }
                _ => TextsimError::Io {
                    source: e,
                    context: format!("Failed to connect to daemon at {:?}", self.socket_path),
                },
            })?;

        write_frame(&mut stream, message, "IPC message").await?;
        read_frame(&mut stream, "IPC response").await
    }
}
