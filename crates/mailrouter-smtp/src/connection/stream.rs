//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::trace;

/// Byte stream an SMTP session can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Buffered SMTP stream, remembering the host it was opened to.
pub struct SmtpStream {
    reader: BufReader<Box<dyn AsyncStream>>,
    host: String,
}

impl std::fmt::Debug for SmtpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpStream")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl SmtpStream {
    /// Wraps an already connected stream.
    ///
    /// `host` is the name the stream was dialed with; host-bound
    /// credentials are checked against it.
    pub fn new(io: impl AsyncStream + 'static, host: impl Into<String>) -> Self {
        Self {
            reader: BufReader::new(Box::new(io)),
            host: host.into(),
        }
    }

    /// Host this stream was opened to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Reads a line from the stream, without the line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] at end of stream, or an I/O error.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        trace!(host = %self.host, "S: {line}");
        Ok(line)
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let inner = self.reader.get_mut();
        inner.write_all(data).await?;
        inner.flush().await?;
        Ok(())
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let stream = TcpStream::connect((hostname, port)).await?;
    stream.set_nodelay(true)?;
    Ok(SmtpStream::new(stream, hostname))
}
