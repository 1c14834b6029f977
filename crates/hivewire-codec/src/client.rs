use std::io::{Read, Write};

use hivewire_frame::{FrameReader, FrameWriter};
use hivewire_transport::{Closer, DuplexStream};
use tracing::debug;

use crate::args::{Destination, Marshal};
use crate::config::CodecConfig;
use crate::envelope::{decode_result, encode_call, DecodedResult, ResultHeader, Seq, KEY_DATA};
use crate::error::{ProtocolError, Result};

/// Calling side of one connection.
///
/// Writes call envelopes and reads result envelopes. A result is read in two
/// steps: [`read_result_header`](Self::read_result_header) returns the
/// metadata, then [`read_result_body`](Self::read_result_body) unpacks the
/// value of that same result.
pub struct ClientCodec<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    config: CodecConfig,
    closer: Closer,
    pending: Option<DecodedResult>,
}

impl<R: Read, W: Write> ClientCodec<R, W> {
    /// Build a codec over separate read and write halves with default config.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config_parts(reader, writer, CodecConfig::default())
    }

    /// Build a codec over separate halves. Stream timeouts in `config` are
    /// not applied here; use [`ClientCodec::with_config`] for sockets.
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

    /// Send one call. `session: None` makes it fire-and-forget.
    pub fn write_call(
        &mut self,
        service: &str,
        method: &str,
        session: Option<Seq>,
        args: Option<&dyn Marshal>,
    ) -> Result<()> {
        let payload = encode_call(service, method, session, args)?;
        self.writer.send(&payload)?;
        debug!(service, method, ?session, len = payload.len(), "call written");
        Ok(())
    }

    /// Read the next result frame and return its header.
    ///
    /// A result the remote side marked as failed is returned with
    /// `error` set; it is not an `Err`.
    pub fn read_result_header(&mut self) -> Result<ResultHeader> {
        self.pending = None;
        let frame = self.reader.read_frame()?;
        let result = decode_result(&frame.payload)?;
        debug!(session = result.header.session, len = frame.payload.len(), "result read");
        let header = result.header.clone();
        self.pending = Some(result);
        Ok(header)
    }

    /// Unpack the body of the result whose header was read last.
    pub fn read_result_body(&mut self, destination: Destination<'_>) -> Result<()> {
        match self.pending.take() {
            Some(result) => result.decode_body(destination, self.config.coercion),
            None if matches!(destination, Destination::None) => Ok(()),
            None => Err(ProtocolError::MissingField(KEY_DATA).into()),
        }
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

impl<S: DuplexStream> ClientCodec<S, S> {
    /// Build a codec over a connected socket with default config.
    pub fn from_stream(stream: S) -> Result<Self> {
        Self::with_config(stream, CodecConfig::default())
    }

    /// Build a codec over a connected socket, applying timeouts from `config`.
    ///
    /// The stream is cloned into independent read and write halves; closing
    /// the codec shuts the connection down for both.
    pub fn with_config(stream: S, config: CodecConfig) -> Result<Self> {
        let closer = Closer::for_stream(stream.try_clone_stream()?);
        let reader = FrameReader::with_config_stream(stream.try_clone_stream()?, config.frame.clone())?;
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

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hivewire_frame::{read_frame, write_frame, FrameError};

    use super::*;
    use crate::envelope::{decode_call, encode_result};
    use crate::error::{CodecError, UnmarshalError};

    fn result_stream(results: &[Vec<u8>]) -> Cursor<Vec<u8>> {
        let mut wire = Vec::new();
        for payload in results {
            write_frame(&mut wire, payload).unwrap();
        }
        Cursor::new(wire)
    }

    #[test]
    fn write_call_emits_one_frame() {
        let mut codec = ClientCodec::new(Cursor::new(Vec::<u8>::new()), Vec::<u8>::new());
        codec
            .write_call("svc", "Add", Some(7), Some(&(1i64)))
            .unwrap();

        let (_, written) = codec.into_parts();
        let mut wire = Cursor::new(written);
        let payload = read_frame(&mut wire).unwrap();
        let call = decode_call(&payload).unwrap();
        assert_eq!(call.header.service, "svc");
        assert_eq!(call.header.method, "Add");
        assert_eq!(call.header.session, Some(7));
        assert_eq!(wire.position() as usize, wire.get_ref().len());
    }

    #[test]
    fn header_then_body() {
        let reader = result_stream(&[encode_result(7, None, Some(&3i64)).unwrap()]);
        let mut codec = ClientCodec::new(reader, Vec::<u8>::new());

        let header = codec.read_result_header().unwrap();
        assert_eq!(header.session, 7);
        assert!(header.is_ok());

        let mut sum = 0i32;
        codec.read_result_body((&mut sum).into()).unwrap();
        assert_eq!(sum, 3);
    }

    #[test]
    fn failed_result_is_a_header_not_an_error() {
        let reader = result_stream(&[encode_result(2, Some("no such method"), None).unwrap()]);
        let mut codec = ClientCodec::new(reader, Vec::<u8>::new());

        let header = codec.read_result_header().unwrap();
        assert_eq!(header.error.as_deref(), Some("no such method"));
        codec.read_result_body(Destination::None).unwrap();
    }

    #[test]
    fn body_without_header() {
        let mut codec = ClientCodec::new(Cursor::new(Vec::<u8>::new()), Vec::<u8>::new());
        codec.read_result_body(Destination::None).unwrap();

        let mut out = 0i64;
        let err = codec.read_result_body((&mut out).into()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::MissingField("data"))
        ));
    }

    #[test]
    fn body_into_shared_reference_fails() {
        let reader = result_stream(&[encode_result(1, None, Some(&5i64)).unwrap()]);
        let mut codec = ClientCodec::new(reader, Vec::<u8>::new());
        codec.read_result_header().unwrap();

        let out = 0i64;
        let err = codec.read_result_body((&out).into()).unwrap_err();
        assert!(matches!(err, CodecError::Unmarshal(UnmarshalError::NotAPointer)));
    }

    #[test]
    fn results_are_read_in_order() {
        let reader = result_stream(&[
            encode_result(1, None, Some(&10i64)).unwrap(),
            encode_result(2, None, Some(&20i64)).unwrap(),
        ]);
        let mut codec = ClientCodec::new(reader, Vec::<u8>::new());

        let mut out = 0i64;
        assert_eq!(codec.read_result_header().unwrap().session, 1);
        codec.read_result_body((&mut out).into()).unwrap();
        assert_eq!(out, 10);
        // Skipping a body is allowed; the next header replaces it.
        assert_eq!(codec.read_result_header().unwrap().session, 2);
        assert!(matches!(
            codec.read_result_header().unwrap_err(),
            CodecError::Frame(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_call_is_rejected_before_writing() {
        let config = CodecConfig::default().with_max_payload(8);
        let mut codec = ClientCodec::with_config_parts(Cursor::new(Vec::<u8>::new()), Vec::<u8>::new(), config);

        let err = codec
            .write_call("a-long-service-name", "Method", Some(1), None)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Frame(FrameError::PayloadTooLarge { max: 8, .. })
        ));
        let (_, written) = codec.into_parts();
        assert!(written.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn close_is_idempotent_and_shuts_down() {
        use std::os::unix::net::UnixStream;

        let (local, remote) = UnixStream::pair().unwrap();
        let mut codec = ClientCodec::from_stream(local).unwrap();
        assert!(!codec.is_closed());

        codec.close().unwrap();
        codec.close().unwrap();
        assert!(codec.is_closed());

        let mut remote = remote;
        let mut buf = [0u8; 1];
        assert_eq!(remote.read(&mut buf).unwrap(), 0);
    }
}
