//! Length-prefixed message framing.
//!
//! Every message on the wire is a 4-byte little-endian payload length followed
//! by exactly that many payload bytes. The header carries nothing else; the
//! payload is one serialized envelope.
//!
//! [`FrameReader`] and [`FrameWriter`] own a stream half and hide partial
//! reads and writes. The free functions in [`io`] move a single frame.

pub mod codec;
pub mod error;
pub mod io;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use io::{read_frame, read_frame_with_limit, write_frame};
pub use reader::FrameReader;
pub use writer::FrameWriter;
