//! Line-delimited transport for JSON-RPC messages
//!
//! Each message is a single line of JSON terminated by a newline. The
//! transport is generic over the reader and writer so the server can be
//! driven from stdio in production and from in-memory buffers in tests.

use super::{JsonRpcRequest, JsonRpcResponse};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error};

/// Transport over stdin/stdout
pub type StdioTransport = LineTransport<io::Stdin, io::Stdout>;

/// A frame read from the transport
#[derive(Debug)]
pub enum Incoming {
    /// A well-formed request or notification
    Request(JsonRpcRequest),
    /// A line that was not a valid JSON-RPC request
    Malformed(String),
}

/// Newline-delimited JSON-RPC transport
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl StdioTransport {
    /// Create a transport over the process stdio
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a transport over an arbitrary reader/writer pair
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Read the next frame
    ///
    /// Blank lines are skipped. Returns None on EOF. A line that does not
    /// parse is returned as [`Incoming::Malformed`] so the caller can answer
    /// with a parse error and keep serving.
    pub async fn read_request(&mut self) -> io::Result<Option<Incoming>> {
        loop {
            let mut line = String::new();

            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => {
                    debug!(method = %request.method, id = ?request.id, "Received JSON-RPC request");
                    Ok(Some(Incoming::Request(request)))
                }
                Err(e) => {
                    error!(error = %e, line = %trimmed, "Failed to parse JSON-RPC request");
                    Ok(Some(Incoming::Malformed(e.to_string())))
                }
            };
        }
    }

    /// Write a JSON-RPC response as a single line, then flush
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response).map_err(|e| {
            error!(error = %e, "Failed to serialize JSON-RPC response");
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        debug!(id = ?response.id, is_error = response.error.is_some(), "Sending JSON-RPC response");

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Flush and shut down the writer
    pub async fn close(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Consume the transport and return the writer
    pub fn into_writer(self) -> W {
        self.writer
    }
}
