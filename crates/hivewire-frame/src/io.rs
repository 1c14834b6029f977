//! Unbuffered single-frame I/O.
//!
//! These read exactly one frame's worth of bytes from the stream and never
//! consume past the end of the frame, so they can be mixed with other users
//! of the same stream. [`FrameReader`](crate::FrameReader) buffers ahead and
//! is the better fit when it owns the read half outright.

use std::io::{ErrorKind, Read, Write};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{check_limit, encode_frame, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Write one frame: 4-byte little-endian length, then `payload`.
///
/// Header and payload go out in a single `write_all` so one writer never
/// leaves a half frame between its own writes.
pub fn write_frame<W: Write + ?Sized>(stream: &mut W, payload: &[u8]) -> Result<()> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(payload, &mut buf)?;
    stream.write_all(&buf).map_err(closed_or_io)?;
    stream.flush()?;
    trace!(len = payload.len(), "wrote frame");
    Ok(())
}

/// Read one frame and return its payload.
pub fn read_frame<R: Read + ?Sized>(stream: &mut R) -> Result<Bytes> {
    read_frame_with_limit(stream, None)
}

/// Read one frame, rejecting payloads larger than `max_payload` before
/// allocating for them.
pub fn read_frame_with_limit<R: Read + ?Sized>(
    stream: &mut R,
    max_payload: Option<usize>,
) -> Result<Bytes> {
    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).map_err(closed_or_io)?;
    let len = u32::from_le_bytes(header) as usize;
    check_limit(len, max_payload)?;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).map_err(closed_or_io)?;
    trace!(len, "read frame");
    Ok(Bytes::from(payload))
}

fn closed_or_io(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::WriteZero => FrameError::ConnectionClosed,
        _ => FrameError::Io(err),
    }
}
