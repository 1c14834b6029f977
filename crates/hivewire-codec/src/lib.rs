//! Call/result envelopes and argument marshaling.
//!
//! A call travels as a MessagePack map with the keys `service`, `func`,
//! optional `session` and optional `args`. A result travels as a map with
//! `session`, `ok` and optional `data`. Arguments and results are packed into
//! an [`ArgMap`]: integer keys `1..N` in field declaration order, plus an
//! advisory `"n"` count.
//!
//! The codec is stateless across frames. [`ClientCodec`] and [`ServerCodec`]
//! wrap one connection for an RPC engine; the free functions in [`envelope`]
//! work on byte buffers directly.

pub mod args;
pub mod client;
pub mod coerce;
pub mod config;
pub mod envelope;
pub mod error;
pub mod server;
pub mod value;

pub use args::{pack, unpack, unpack_with, ArgMap, Argument, Destination, Field, Marshal, Scalar, Unmarshal};
pub use client::ClientCodec;
pub use config::{CodecConfig, CoercionMode};
pub use envelope::{
    decode_call, decode_result, encode_call, encode_result, CallEnvelope, CallHeader, DecodedCall,
    DecodedResult, ResultData, ResultEnvelope, ResultHeader, Seq, GENERIC_CALL_ERROR,
};
pub use error::{CodecError, CoerceError, MarshalError, ProtocolError, Result, UnmarshalError};
pub use server::ServerCodec;

pub use rmpv::Value;
