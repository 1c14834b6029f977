//! Duplex byte stream abstraction.
//!
//! The codec layers above only need `Read + Write`. This crate adds the few
//! stream controls an RPC connection needs on top of that:
//! - read/write timeouts
//! - splitting one socket into a reader half and a writer half
//! - an idempotent close
//!
//! Implemented for TCP streams and, on Unix, Unix domain socket streams.

pub mod error;
pub mod traits;

pub use error::{Result, TransportError};
pub use traits::{Closer, DuplexStream};
