//! Coercion from decoded wire values into typed destinations.
//!
//! Three paths are tried in order:
//! 1. Direct conversion: the generic value is deserialized straight into the
//!    destination type. Covers identical types, integer width changes that
//!    stay in range, integer to float, and string representations.
//! 2. Integral float: a float with no fractional part is retried as the
//!    equivalent integer, so `3.0` reaches an integer destination. Fractional,
//!    non-finite or out-of-range floats are not truncated.
//! 3. Re-encode: the generic value is serialized back to MessagePack and
//!    decoded directly into the destination type. Lets nested composites
//!    (maps, sequences, nested records, optionals) reach concrete types.

use rmpv::Value;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::args::ArgMap;
use crate::config::CoercionMode;
use crate::error::{CoerceError, UnmarshalError};
use crate::value::kind_name;

/// Coerce `value` into `T` through the paths listed in the module docs.
pub fn coerce<T: DeserializeOwned>(value: &Value) -> Result<T, CoerceError> {
    match convert(value) {
        Ok(converted) => Ok(converted),
        Err(direct) => {
            if let Some(integral) = float_as_integer(value) {
                if let Ok(converted) = convert(&integral) {
                    return Ok(converted);
                }
            }
            trace!(
                found = kind_name(value),
                target = std::any::type_name::<T>(),
                error = %direct.reason,
                "direct conversion failed, re-encoding"
            );
            reencode(value).map_err(|fallback| CoerceError {
                reason: format!("{}; {}", direct.reason, fallback.reason),
                ..fallback
            })
        }
    }
}

/// Direct conversion path only.
pub fn convert<T: DeserializeOwned>(value: &Value) -> Result<T, CoerceError> {
    rmpv::ext::from_value(value.clone()).map_err(|err| coerce_error::<T>(value, err.to_string()))
}

/// Re-encode path only: serialize `value` and decode the bytes as `T`.
pub fn reencode<T: DeserializeOwned>(value: &Value) -> Result<T, CoerceError> {
    let bytes = rmp_serde::to_vec(value).map_err(|err| coerce_error::<T>(value, err.to_string()))?;
    rmp_serde::from_slice(&bytes).map_err(|err| coerce_error::<T>(value, err.to_string()))
}

fn float_as_integer(value: &Value) -> Option<Value> {
    let f = match value {
        Value::F32(f) => f64::from(*f),
        Value::F64(f) => *f,
        _ => return None,
    };
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    // Bounds are exclusive at the top: i64::MAX and u64::MAX round up as f64.
    if f < 0.0 && f >= i64::MIN as f64 {
        Some(Value::from(f as i64))
    } else if f >= 0.0 && f < u64::MAX as f64 {
        Some(Value::from(f as u64))
    } else {
        None
    }
}

fn coerce_error<T>(value: &Value, reason: String) -> CoerceError {
    CoerceError {
        found: kind_name(value),
        target: std::any::type_name::<T>(),
        reason,
    }
}

/// Assign positional argument `index` of `args` into `slot`.
///
/// An absent key leaves `slot` untouched. A value that cannot be coerced is
/// an error in [`CoercionMode::Strict`] and is skipped in
/// [`CoercionMode::Permissive`].
pub fn unpack_field<T: DeserializeOwned>(
    slot: &mut T,
    index: u32,
    args: &ArgMap,
    mode: CoercionMode,
) -> Result<(), UnmarshalError> {
    let Some(value) = args.get(index) else {
        return Ok(());
    };

    match coerce(value) {
        Ok(coerced) => {
            *slot = coerced;
            Ok(())
        }
        Err(err) if mode == CoercionMode::Permissive => {
            debug!(index, error = %err, "leaving argument unset");
            Ok(())
        }
        Err(source) => Err(UnmarshalError::Incompatible { index, source }),
    }
}

/// Coerce a wire correlation id into the host [`Seq`](crate::Seq) type.
///
/// Any integer width is accepted as long as the value is non-negative and
/// fits; integral floats are accepted the same way.
pub fn coerce_session(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(n) => n.as_u64(),
        Value::F32(f) => integral_float(f64::from(*f)),
        Value::F64(f) => integral_float(*f),
        _ => None,
    }
}

fn integral_float(f: f64) -> Option<u64> {
    // u64::MAX as f64 rounds up to 2^64, which is out of range.
    if f.is_finite() && f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}
