use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected byte stream that can be read, written, split and closed.
///
/// This is the stream type the codecs are built on. Reading and writing go
/// through the `Read`/`Write` supertraits; the methods here are the controls
/// an RPC connection owner needs.
pub trait DuplexStream: Read + Write + Send + Sized + 'static {
    /// Set read timeout on the underlying stream.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Set write timeout on the underlying stream.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Create an independent handle to the same connection (new descriptor).
    fn try_clone_stream(&self) -> Result<Self>;

    /// Shut down both directions. In-flight reads and writes on any handle fail.
    fn shutdown(&self) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl DuplexStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_read_timeout(self, timeout).map_err(TransportError::Configure)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_write_timeout(self, timeout).map_err(TransportError::Configure)
    }

    fn try_clone_stream(&self) -> Result<Self> {
        self.try_clone().map_err(TransportError::Clone)
    }

    fn shutdown(&self) -> Result<()> {
        ignore_not_connected(TcpStream::shutdown(self, Shutdown::Both))
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(unix)]
impl DuplexStream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
            .map_err(TransportError::Configure)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
            .map_err(TransportError::Configure)
    }

    fn try_clone_stream(&self) -> Result<Self> {
        self.try_clone().map_err(TransportError::Clone)
    }

    fn shutdown(&self) -> Result<()> {
        ignore_not_connected(std::os::unix::net::UnixStream::shutdown(
            self,
            Shutdown::Both,
        ))
    }

    fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

// The peer may already have torn the connection down; that is still a close.
fn ignore_not_connected(result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
        Err(err) => Err(TransportError::Io(err)),
    }
}

type ShutdownFn = Box<dyn FnOnce() -> Result<()> + Send>;

/// Close handle for a connection. Only the first `close` reaches the stream.
pub struct Closer {
    shutdown: Option<ShutdownFn>,
    closed: bool,
}

impl Closer {
    /// A closer with nothing to shut down (in-memory streams, test buffers).
    pub fn noop() -> Self {
        Self {
            shutdown: None,
            closed: false,
        }
    }

    /// A closer that shuts `stream` down on first close.
    pub fn for_stream<S: DuplexStream>(stream: S) -> Self {
        let name = stream.transport_name();
        Self {
            shutdown: Some(Box::new(move || {
                debug!(transport = name, "shutting down stream");
                stream.shutdown()
            })),
            closed: false,
        }
    }

    /// Close the connection. A second call is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.shutdown.take() {
            Some(shutdown) => shutdown(),
            None => Ok(()),
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for Closer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closer")
            .field("closed", &self.closed)
            .field("has_stream", &self.shutdown.is_some())
            .finish()
    }
}
