/// Envelope did not conform to the wire contract.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A required key is absent (or, for `ok`/`data`, unusable).
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A key is present but holds the wrong kind of value.
    #[error("field `{field}` has wrong type (expected {expected}, found {found})")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// The bytes are not a single MessagePack map.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// A value could not be packed into an argument map.
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    /// Record fields must all be public to be packed.
    #[error("field `{field}` is not exported")]
    NotExported { field: &'static str },

    /// The serializer rejected the value.
    #[error("failed to encode value: {0}")]
    Encode(String),
}

/// A decoded value could not be written into its destination.
#[derive(Debug, thiserror::Error)]
pub enum UnmarshalError {
    /// The destination is not writable.
    #[error("attempt to decode into a non-writable destination")]
    NotAPointer,

    /// No coercion path exists from the wire value to the destination type.
    #[error("argument {index} cannot be assigned: {source}")]
    Incompatible {
        index: u32,
        #[source]
        source: CoerceError,
    },
}

/// Neither direct conversion nor re-encoding produced the destination type.
#[derive(Debug, thiserror::Error)]
#[error("cannot coerce {found} into {target}: {reason}")]
pub struct CoerceError {
    pub found: &'static str,
    pub target: &'static str,
    pub reason: String,
}

/// Errors surfaced to the RPC engine.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] hivewire_frame::FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] hivewire_transport::TransportError),

    /// Envelope error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Packing error.
    #[error("marshal error: {0}")]
    Marshal(#[from] MarshalError),

    /// Unpacking error.
    #[error("unmarshal error: {0}")]
    Unmarshal(#[from] UnmarshalError),
}

pub type Result<T> = std::result::Result<T, CodecError>;
