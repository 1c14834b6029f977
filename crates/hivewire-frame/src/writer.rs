use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use hivewire_transport::DuplexStream;
use tracing::trace;

use crate::codec::{check_limit, encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.payload.as_ref())
    }

    /// Encode and send a payload as one frame.
    ///
    /// Only `Interrupted` is retried. A write timeout on the stream surfaces
    /// as `FrameError::Io` (`WouldBlock` or `TimedOut`); the stream may then
    /// hold a partial frame and must not be reused.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        check_limit(payload.len(), self.config.max_payload_size)?;

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        trace!(len = payload.len(), "wrote frame");
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: Option<usize>) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: DuplexStream> FrameWriter<T> {
    /// Create a frame writer for a socket stream and apply write timeout from config.
    pub fn with_config_stream(inner: T, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn header_is_little_endian_length() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&[0xAA; 258]).unwrap();

        let wire = written(writer);
        assert_eq!(&wire[..HEADER], &[2, 1, 0, 0]);
        assert_eq!(wire.len(), HEADER + 258);
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"").unwrap();
        writer.write_frame(&Frame::new("call")).unwrap();

        let mut reader = FrameReader::new(Cursor::new(written(writer)));
        assert!(reader.read_frame().unwrap().payload.is_empty());
        assert_eq!(reader.read_frame().unwrap(), Frame::new("call"));
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let config = FrameConfig {
            max_payload_size: Some(4),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), config);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(writer.get_ref().get_ref().is_empty());

        writer.set_max_payload_size(None);
        writer.send(b"oversized").unwrap();
    }

    fn hiccup(kind: ErrorKind) -> Hiccup {
        Hiccup {
            kind,
            write_failed: false,
            flush_failed: false,
            flushed: false,
            data: Vec::new(),
        }
    }

    #[test]
    fn interrupted_writes_are_retried() {
        let mut writer = FrameWriter::new(hiccup(ErrorKind::Interrupted));
        writer.send(b"retry").unwrap();

        let sink = writer.into_inner();
        assert!(sink.flushed);
        assert_eq!(sink.data, [&[5u8, 0, 0, 0][..], &b"retry"[..]].concat());
    }

    #[test]
    fn would_block_is_not_retried() {
        let mut writer = FrameWriter::new(hiccup(ErrorKind::WouldBlock));
        assert!(matches!(
            writer.send(b"retry").unwrap_err(),
            FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock
        ));
        assert!(writer.get_ref().data.is_empty());
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut writer = FrameWriter::new(Closed);
        assert!(matches!(
            writer.send(b"x").unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[cfg(unix)]
    #[test]
    fn socket_write_timeout_is_applied() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let timeout = std::time::Duration::from_millis(10);
        let config = FrameConfig {
            write_timeout: Some(timeout),
            ..FrameConfig::default()
        };

        let writer = FrameWriter::with_config_stream(left, config).unwrap();
        assert_eq!(writer.get_ref().write_timeout().unwrap(), Some(timeout));
    }

    #[cfg(unix)]
    #[test]
    fn socket_write_timeout_fires_when_peer_stops_reading() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let config = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_stream(left, config).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = done_tx.send(writer.send(&vec![0u8; 8 * 1024 * 1024]));
        });

        let result = done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("send should give up after the write timeout");
        assert!(matches!(
            result.unwrap_err(),
            FrameError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
    }

    const HEADER: usize = crate::codec::HEADER_SIZE;

    // Fails the first write and the first flush with `kind`.
    struct Hiccup {
        kind: ErrorKind,
        write_failed: bool,
        flush_failed: bool,
        flushed: bool,
        data: Vec<u8>,
    }

    impl Write for Hiccup {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !std::mem::replace(&mut self.write_failed, true) {
                return Err(std::io::Error::from(self.kind));
            }
            // Short writes exercise the resume offset.
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !std::mem::replace(&mut self.flush_failed, true) {
                return Err(std::io::Error::from(self.kind));
            }
            self.flushed = true;
            Ok(())
        }
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
