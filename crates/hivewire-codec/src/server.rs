use std::io::{Read, Write};

use hivewire_frame::{FrameReader, FrameWriter};
use hivewire_transport::{Closer, DuplexStream};
use tracing::debug;

use crate::args::{Destination, Marshal};
use crate::config::CodecConfig;
use crate::envelope::{decode_call, encode_result, CallHeader, DecodedCall, Seq};
use crate::error::{Result, UnmarshalError};

/// Serving side of one connection.
///
/// Reads call envelopes and writes result envelopes. Calls whose header
/// reports [`no_resp`](CallHeader::no_resp) must not be answered.
pub struct ServerCodec<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: CodecConfig,
    closer: Closer,
    pending: Option<DecodedCall>,
}

impl<R: Read, W: Write> ServerCodec<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config_parts(reader, writer, CodecConfig::default())
    }

    pub fn with_config_parts(reader: R, writer: W, config: CodecConfig) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.frame.clone()),
            writer: FrameWriter::with_config(writer, config.frame.clone()),
            config,
            closer: Closer::noop(),
            pending: None,
        }
    }

    /// Replace the close handle.
    pub fn with_closer(mut self, closer: Closer) -> Self {
        self.closer = closer;
        self
    }

    /// Read the next call frame and return its header.
    pub fn read_call_header(&mut self) -> Result<CallHeader> {
        self.pending = None;
        let frame = self.reader.read_frame()?;
        let call = decode_call(&frame.payload)?;
        debug!(
            service = %call.header.service,
            method = %call.header.method,
            session = ?call.header.session,
            len = frame.payload.len(),
            "call read"
        );
        let header = call.header.clone();
        self.pending = Some(call);
        Ok(header)
    }

    /// Unpack the arguments of the call whose header was read last.
    ///
    /// Without a pending call this is a no-op, same as a call with no `args`.
    /// A non-writable destination is rejected either way.
    pub fn read_call_body(&mut self, destination: Destination<'_>) -> Result<()> {
        if matches!(destination, Destination::Ref(_)) {
            self.pending = None;
            return Err(UnmarshalError::NotAPointer.into());
        }
        match self.pending.take() {
            Some(call) => call.decode_body(destination, self.config.coercion),
            None => Ok(()),
        }
    }

    /// Send the result for `session`.
    ///
    /// A non-empty `error` is sent as a failure. A `result` that cannot be
    /// packed is sent as a failure carrying the pack error.
    pub fn write_result(
        &mut self,
        session: Seq,
        error: Option<&str>,
        result: Option<&dyn Marshal>,
    ) -> Result<()> {
        let payload = encode_result(session, error, result)?;
        self.writer.send(&payload)?;
        debug!(session, len = payload.len(), "result written");
        Ok(())
    }

    /// Shut the connection down. A second call is a no-op.
    pub fn close(&mut self) -> Result<()> {
        self.pending = None;
        self.closer.close()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Consume the codec and return the read and write halves.
    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

impl<S: DuplexStream> ServerCodec<S, S> {
    pub fn from_stream(stream: S) -> Result<Self> {
        Self::with_config(stream, CodecConfig::default())
    }

    /// Build a codec over an accepted socket, applying timeouts from `config`.
    pub fn with_config(stream: S, config: CodecConfig) -> Result<Self> {
        let closer = Closer::for_stream(stream.try_clone_stream()?);
        let reader =
            FrameReader::with_config_stream(stream.try_clone_stream()?, config.frame.clone())?;
        let writer = FrameWriter::with_config_stream(stream, config.frame.clone())?;
        Ok(Self {
            reader,
            writer,
            config,
            closer,
            pending: None,
        })
    }
}
