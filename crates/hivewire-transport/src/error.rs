/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to split the stream into independent halves.
    #[error("failed to clone stream: {0}")]
    Clone(std::io::Error),

    /// Failed to apply a socket option such as a timeout.
    #[error("failed to configure stream: {0}")]
    Configure(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
