//! Framed MessagePack RPC codec.
//!
//! hivewire carries calls and results between an RPC engine and its peers
//! over any connected byte stream. It has no opinion on dispatch, retries or
//! correlation; the engine owns those.
//!
//! # Crate Structure
//!
//! - [`transport`]: stream abstraction (TCP, Unix sockets) and close handles
//! - [`frame`]: 4-byte little-endian length-prefixed framing
//! - [`codec`]: call/result envelopes, positional argument marshaling and
//!   the engine-facing client and server codecs
//! - [`logging`]: subscriber setup for binaries (behind `logging` feature)

/// Re-export transport types.
pub mod transport {
    pub use hivewire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hivewire_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use hivewire_codec::*;
}

#[cfg(feature = "logging")]
pub mod logging;

pub use hivewire_codec::{record, ClientCodec, CodecConfig, CodecError, CoercionMode, ServerCodec};
