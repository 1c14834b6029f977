use hivewire_frame::FrameConfig;

/// What to do when a wire value has no coercion path to its destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoercionMode {
    /// Fail the unpack with `UnmarshalError::Incompatible`.
    #[default]
    Strict,
    /// Leave the destination field as it was and carry on.
    Permissive,
}

/// Configuration for [`ClientCodec`](crate::ClientCodec) and [`ServerCodec`](crate::ServerCodec).
#[derive(Debug, Clone, Default)]
pub struct CodecConfig {
    /// Frame limits and stream timeouts.
    pub frame: FrameConfig,
    /// Coercion policy for body decoding.
    pub coercion: CoercionMode,
}

impl CodecConfig {
    /// Bound frame payloads on both read and write.
    pub fn with_max_payload(mut self, max_payload_size: usize) -> Self {
        self.frame.max_payload_size = Some(max_payload_size);
        self
    }

    /// Use `mode` when decoding bodies.
    pub fn with_coercion(mut self, mode: CoercionMode) -> Self {
        self.coercion = mode;
        self
    }
}
