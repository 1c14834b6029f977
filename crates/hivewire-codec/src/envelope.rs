//! Call and result envelopes.
//!
//! Wire keys are fixed: a call carries `service`, `func`, `session` and
//! `args`; a result carries `session`, `ok` and `data`. A call without
//! `session` is fire-and-forget and must not be answered.

use rmpv::Value;
use tracing::{debug, warn};

use crate::args::{pack, unpack_with, ArgMap, Destination, Marshal};
use crate::coerce::coerce_session;
use crate::config::CoercionMode;
use crate::error::{ProtocolError, Result, UnmarshalError};
use crate::value::{decode_value, encode_value, kind_name, lookup};

pub const KEY_SERVICE: &str = "service";
pub const KEY_METHOD: &str = "func";
pub const KEY_SESSION: &str = "session";
pub const KEY_ARGS: &str = "args";
pub const KEY_OK: &str = "ok";
pub const KEY_DATA: &str = "data";

/// Error text used when a failed result carries no usable message.
pub const GENERIC_CALL_ERROR: &str = "call error";

/// Host correlation identifier type.
pub type Seq = u64;

/// A call, as built by the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    pub service: String,
    pub method: String,
    /// `None` marks a fire-and-forget call.
    pub session: Option<Seq>,
    pub args: Option<ArgMap>,
}

impl CallEnvelope {
    pub fn to_value(&self) -> Value {
        let mut map = Vec::with_capacity(4);
        map.push((Value::from(KEY_SERVICE), Value::from(self.service.as_str())));
        map.push((Value::from(KEY_METHOD), Value::from(self.method.as_str())));
        if let Some(session) = self.session {
            map.push((Value::from(KEY_SESSION), Value::from(session)));
        }
        if let Some(args) = &self.args {
            map.push((Value::from(KEY_ARGS), args.to_value()));
        }
        Value::Map(map)
    }
}

/// Outcome carried in a result's `data` slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    /// `ok=true` with a packed return value.
    Value(ArgMap),
    /// `ok=true` with no return value; `data` is omitted.
    Empty,
    /// `ok=false`; the message goes in `data`.
    Error(String),
}

/// A result, as built by the responder.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope {
    pub session: Seq,
    pub data: ResultData,
}

impl ResultEnvelope {
    pub fn is_ok(&self) -> bool {
        !matches!(self.data, ResultData::Error(_))
    }

    pub fn to_value(&self) -> Value {
        let mut map = Vec::with_capacity(3);
        map.push((Value::from(KEY_SESSION), Value::from(self.session)));
        map.push((Value::from(KEY_OK), Value::from(self.is_ok())));
        match &self.data {
            ResultData::Value(args) => map.push((Value::from(KEY_DATA), args.to_value())),
            ResultData::Error(message) => {
                map.push((Value::from(KEY_DATA), Value::from(message.as_str())))
            }
            ResultData::Empty => {}
        }
        Value::Map(map)
    }
}

/// Metadata of a received call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeader {
    pub service: String,
    pub method: String,
    pub session: Option<Seq>,
}

impl CallHeader {
    /// True when the caller expects no result.
    pub fn no_resp(&self) -> bool {
        self.session.is_none()
    }
}

/// Metadata of a received result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultHeader {
    pub session: Seq,
    /// Set when the remote side reported failure.
    pub error: Option<String>,
}

impl ResultHeader {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A decoded call whose body has not been unpacked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub header: CallHeader,
    args: Option<Value>,
}

impl DecodedCall {
    /// Unpack the call arguments into `destination`.
    ///
    /// Absent destination or absent `args` (a zero-argument call) is a no-op.
    pub fn decode_body(&self, destination: Destination<'_>, mode: CoercionMode) -> Result<()> {
        if matches!(destination, Destination::None) {
            return Ok(());
        }
        if matches!(destination, Destination::Ref(_)) {
            return Err(UnmarshalError::NotAPointer.into());
        }
        let Some(raw) = &self.args else {
            return Ok(());
        };
        let args = ArgMap::from_value(raw).ok_or(ProtocolError::TypeMismatch {
            field: KEY_ARGS,
            expected: "map",
            found: kind_name(raw),
        })?;
        unpack_with(destination, &args, mode)?;
        Ok(())
    }

    /// Raw `args` value, if the call carried one.
    pub fn raw_args(&self) -> Option<&Value> {
        self.args.as_ref()
    }
}

/// A decoded result whose body has not been unpacked yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResult {
    pub header: ResultHeader,
    data: Option<Value>,
}

impl DecodedResult {
    /// Unpack the returned value into `destination`.
    pub fn decode_body(&self, destination: Destination<'_>, mode: CoercionMode) -> Result<()> {
        if matches!(destination, Destination::None) {
            return Ok(());
        }
        if matches!(destination, Destination::Ref(_)) {
            return Err(UnmarshalError::NotAPointer.into());
        }
        let args = self
            .data
            .as_ref()
            .and_then(ArgMap::from_value)
            .ok_or(ProtocolError::MissingField(KEY_DATA))?;
        unpack_with(destination, &args, mode)?;
        Ok(())
    }
}

/// Encode a call envelope.
///
/// `args` is packed first, so a value that cannot be packed fails here
/// before anything reaches the stream.
pub fn encode_call(
    service: &str,
    method: &str,
    session: Option<Seq>,
    args: Option<&dyn Marshal>,
) -> Result<Vec<u8>> {
    let args = args.map(pack).transpose()?;
    let envelope = CallEnvelope {
        service: service.to_string(),
        method: method.to_string(),
        session,
        args,
    };
    debug!(service, method, ?session, "encoding call");
    Ok(encode_value(&envelope.to_value())?)
}

/// Decode a call envelope.
pub fn decode_call(bytes: &[u8]) -> Result<DecodedCall> {
    let value = decode_value(bytes)?;
    let entries = as_envelope(&value)?;

    let session = match lookup(entries, KEY_SESSION) {
        None => None,
        Some(raw) => Some(session_from(raw)?),
    };
    let service = required_str(entries, KEY_SERVICE)?;
    let method = required_str(entries, KEY_METHOD)?;
    let args = lookup(entries, KEY_ARGS).cloned();

    debug!(service, method, ?session, "decoded call");
    Ok(DecodedCall {
        header: CallHeader {
            service: service.to_string(),
            method: method.to_string(),
            session,
        },
        args,
    })
}

/// Encode a result envelope.
///
/// A non-empty `error` produces a failure and `result` is ignored. If
/// `result` cannot be packed, the envelope becomes a failure carrying the
/// pack error message instead of returning an error.
pub fn encode_result(
    session: Seq,
    error: Option<&str>,
    result: Option<&dyn Marshal>,
) -> Result<Vec<u8>> {
    let data = match error.filter(|message| !message.is_empty()) {
        Some(message) => ResultData::Error(message.to_string()),
        None => match result.map(pack).transpose() {
            Ok(Some(args)) => ResultData::Value(args),
            Ok(None) => ResultData::Empty,
            Err(err) => {
                warn!(session, error = %err, "result could not be packed, sending failure");
                ResultData::Error(err.to_string())
            }
        },
    };
    let envelope = ResultEnvelope { session, data };
    debug!(session, ok = envelope.is_ok(), "encoding result");
    Ok(encode_value(&envelope.to_value())?)
}

/// Decode a result envelope.
///
/// For a failure the error message is taken from `data`, falling back to
/// [`GENERIC_CALL_ERROR`]; the body is not retained.
pub fn decode_result(bytes: &[u8]) -> Result<DecodedResult> {
    let value = decode_value(bytes)?;
    let entries = as_envelope(&value)?;

    let session = lookup(entries, KEY_SESSION).ok_or(ProtocolError::MissingField(KEY_SESSION))?;
    let session = session_from(session)?;
    let ok = lookup(entries, KEY_OK)
        .and_then(Value::as_bool)
        .ok_or(ProtocolError::MissingField(KEY_OK))?;
    let data = lookup(entries, KEY_DATA);

    debug!(session, ok, "decoded result");
    if !ok {
        let message = data
            .and_then(Value::as_str)
            .unwrap_or(GENERIC_CALL_ERROR)
            .to_string();
        return Ok(DecodedResult {
            header: ResultHeader {
                session,
                error: Some(message),
            },
            data: None,
        });
    }

    Ok(DecodedResult {
        header: ResultHeader {
            session,
            error: None,
        },
        data: data.cloned(),
    })
}

fn as_envelope(value: &Value) -> std::result::Result<&[(Value, Value)], ProtocolError> {
    value.as_map().map(Vec::as_slice).ok_or_else(|| {
        ProtocolError::Malformed(format!("envelope is {}, expected map", kind_name(value)))
    })
}

fn session_from(raw: &Value) -> std::result::Result<Seq, ProtocolError> {
    coerce_session(raw).ok_or(ProtocolError::TypeMismatch {
        field: KEY_SESSION,
        expected: "unsigned integer",
        found: kind_name(raw),
    })
}

fn required_str<'a>(
    entries: &'a [(Value, Value)],
    key: &'static str,
) -> std::result::Result<&'a str, ProtocolError> {
    let raw = lookup(entries, key).ok_or(ProtocolError::MissingField(key))?;
    raw.as_str().ok_or(ProtocolError::TypeMismatch {
        field: key,
        expected: "string",
        found: kind_name(raw),
    })
}
