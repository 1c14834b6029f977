//! Positional argument marshaling.
//!
//! A call argument (or a call result) is either a single scalar or a record
//! of named fields. On the wire both become an [`ArgMap`]: a scalar sits
//! under key `1`, a record's fields sit under keys `1..N` in declaration
//! order. Key `"n"` carries the entry count and is never needed to decode.
//!
//! Records are declared with [`record!`](crate::record), which implements
//! [`Marshal`] and [`Unmarshal`] from the field list. A record field that is
//! not `pub` makes packing fail rather than silently dropping data.

use std::collections::BTreeMap;

use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::coerce::unpack_field;
use crate::config::CoercionMode;
use crate::error::{MarshalError, UnmarshalError};
use crate::value::to_value;

/// Advisory entry-count key.
pub const COUNT_KEY: &str = "n";

/// One record field, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub exported: bool,
    pub value: Value,
}

impl Field {
    /// Serialize `value` as a field named `name`.
    pub fn new<T: Serialize + ?Sized>(
        name: &'static str,
        exported: bool,
        value: &T,
    ) -> Result<Self, MarshalError> {
        Ok(Self {
            name,
            exported,
            value: to_value(value)?,
        })
    }
}

/// Shape of a typed value before it is laid out positionally.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A single value, packed under key `1`.
    Scalar(Value),
    /// Ordered named fields, packed under keys `1..N`.
    Record(Vec<Field>),
}

/// Values that can be sent as call arguments or results.
pub trait Marshal {
    fn to_argument(&self) -> Result<Argument, MarshalError>;
}

/// Destinations that can receive call arguments or results.
pub trait Unmarshal {
    /// Assign every entry of `args` that this destination has a slot for.
    /// Slots without a matching key keep their current value.
    fn unmarshal(&mut self, args: &ArgMap, mode: CoercionMode) -> Result<(), UnmarshalError>;
}

impl<T: Marshal + ?Sized> Marshal for &T {
    fn to_argument(&self) -> Result<Argument, MarshalError> {
        (**self).to_argument()
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn to_argument(&self) -> Result<Argument, MarshalError> {
        (**self).to_argument()
    }
}

impl<T: Unmarshal + ?Sized> Unmarshal for Box<T> {
    fn unmarshal(&mut self, args: &ArgMap, mode: CoercionMode) -> Result<(), UnmarshalError> {
        (**self).unmarshal(args, mode)
    }
}

/// An empty option is allocated only when there is something to assign.
impl<T: Unmarshal + Default> Unmarshal for Option<T> {
    fn unmarshal(&mut self, args: &ArgMap, mode: CoercionMode) -> Result<(), UnmarshalError> {
        if args.is_empty() {
            return Ok(());
        }
        self.get_or_insert_with(T::default).unmarshal(args, mode)
    }
}

/// Carries any serde type as a scalar argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scalar<T>(pub T);

impl<T: Serialize> Marshal for Scalar<T> {
    fn to_argument(&self) -> Result<Argument, MarshalError> {
        Ok(Argument::Scalar(to_value(&self.0)?))
    }
}

impl<T: DeserializeOwned> Unmarshal for Scalar<T> {
    fn unmarshal(&mut self, args: &ArgMap, mode: CoercionMode) -> Result<(), UnmarshalError> {
        unpack_field(&mut self.0, 1, args, mode)
    }
}

macro_rules! scalar_impls {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Marshal for $ty {
                fn to_argument(&self) -> Result<Argument, MarshalError> {
                    Ok(Argument::Scalar(to_value(self)?))
                }
            }

            impl Unmarshal for $ty {
                fn unmarshal(&mut self, args: &ArgMap, mode: CoercionMode) -> Result<(), UnmarshalError> {
                    unpack_field(self, 1, args, mode)
                }
            }
        )*
    };
}

scalar_impls!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String);

impl Marshal for str {
    fn to_argument(&self) -> Result<Argument, MarshalError> {
        Ok(Argument::Scalar(Value::from(self)))
    }
}

impl Marshal for Value {
    fn to_argument(&self) -> Result<Argument, MarshalError> {
        Ok(Argument::Scalar(self.clone()))
    }
}

impl Unmarshal for Value {
    fn unmarshal(&mut self, args: &ArgMap, _mode: CoercionMode) -> Result<(), UnmarshalError> {
        if let Some(value) = args.get(1) {
            *self = value.clone();
        }
        Ok(())
    }
}

/// Position-keyed argument container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgMap {
    entries: BTreeMap<u32, Value>,
    count: Option<u64>,
}

impl ArgMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at 1-based position `index`.
    pub fn get(&self, index: u32) -> Option<&Value> {
        self.entries.get(&index)
    }

    pub fn insert(&mut self, index: u32, value: Value) -> Option<Value> {
        self.entries.insert(index, value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advisory `"n"` value, if the sender included one.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn set_count(&mut self, count: u64) {
        self.count = Some(count);
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.entries.iter().map(|(index, value)| (*index, value))
    }

    /// Wire form: integer keys in order, then `"n"` if set.
    pub fn to_value(&self) -> Value {
        let mut map: Vec<(Value, Value)> = self
            .entries
            .iter()
            .map(|(index, value)| (Value::from(*index), value.clone()))
            .collect();
        if let Some(count) = self.count {
            map.push((Value::from(COUNT_KEY), Value::from(count)));
        }
        Value::Map(map)
    }

    /// Parse the wire form. Returns `None` when `value` is not a map.
    ///
    /// Keys that are neither a positive 32-bit index nor `"n"` are ignored.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_map()?;
        let mut args = Self::new();
        for (key, value) in entries {
            match key {
                Value::Integer(n) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
                    Some(index) if index > 0 => {
                        args.entries.insert(index, value.clone());
                    }
                    _ => trace!(key = %key, "ignoring out-of-range argument key"),
                },
                Value::String(s) if s.as_str() == Some(COUNT_KEY) => {
                    args.count = value.as_u64();
                }
                _ => trace!(key = %key, "ignoring unknown argument key"),
            }
        }
        Some(args)
    }
}

/// Pack a typed value into its positional form.
///
/// Fails with [`MarshalError::NotExported`] on the first non-public record
/// field; nothing is packed in that case.
pub fn pack(value: &dyn Marshal) -> Result<ArgMap, MarshalError> {
    let mut args = ArgMap::new();
    match value.to_argument()? {
        Argument::Scalar(value) => {
            args.insert(1, value);
            args.set_count(1);
        }
        Argument::Record(fields) => {
            if let Some(hidden) = fields.iter().find(|field| !field.exported) {
                return Err(MarshalError::NotExported { field: hidden.name });
            }
            let count = fields.len() as u64;
            for (index, field) in (1u32..).zip(fields) {
                args.insert(index, field.value);
            }
            args.set_count(count);
        }
    }
    Ok(args)
}

/// Where a decoded body should go.
pub enum Destination<'a> {
    /// Nothing to decode into; body decoding is skipped.
    None,
    /// A shared reference. It cannot be written, so decoding fails.
    Ref(&'a dyn Unmarshal),
    /// A writable destination.
    Mut(&'a mut dyn Unmarshal),
}

impl<'a, T: Unmarshal + 'a> From<&'a mut T> for Destination<'a> {
    fn from(value: &'a mut T) -> Self {
        Destination::Mut(value)
    }
}

impl<'a, T: Unmarshal + 'a> From<&'a T> for Destination<'a> {
    fn from(value: &'a T) -> Self {
        Destination::Ref(value)
    }
}

impl std::fmt::Debug for Destination<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::None => f.write_str("Destination::None"),
            Destination::Ref(_) => f.write_str("Destination::Ref(..)"),
            Destination::Mut(_) => f.write_str("Destination::Mut(..)"),
        }
    }
}

/// Unpack `source` into `destination` with strict coercion.
pub fn unpack(destination: Destination<'_>, source: &ArgMap) -> Result<(), UnmarshalError> {
    unpack_with(destination, source, CoercionMode::Strict)
}

/// Unpack `source` into `destination` using `mode` for values without a
/// coercion path.
pub fn unpack_with(
    destination: Destination<'_>,
    source: &ArgMap,
    mode: CoercionMode,
) -> Result<(), UnmarshalError> {
    match destination {
        Destination::None => Ok(()),
        Destination::Ref(_) => Err(UnmarshalError::NotAPointer),
        Destination::Mut(target) => target.unmarshal(source, mode),
    }
}

#[doc(hidden)]
pub fn is_public(visibility: &str) -> bool {
    visibility == "pub"
}

/// Declare a struct usable as a positional call argument or result.
///
/// Fields map to keys `1..N` in declaration order. Every field type must be
/// `Serialize + DeserializeOwned`. Fields without `pub` are allowed in the
/// declaration but make [`pack`] fail with `NotExported`.
///
/// ```
/// hivewire_codec::record! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct AddArgs {
///         pub a: i64,
///         pub b: i64,
///     }
/// }
///
/// let packed = hivewire_codec::pack(&AddArgs { a: 1, b: 2 }).unwrap();
/// let mut out = AddArgs::default();
/// hivewire_codec::unpack((&mut out).into(), &packed).unwrap();
/// assert_eq!(out, AddArgs { a: 1, b: 2 });
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Marshal for $name {
            fn to_argument(
                &self,
            ) -> ::core::result::Result<$crate::Argument, $crate::MarshalError> {
                ::core::result::Result::Ok($crate::Argument::Record(::std::vec![
                    $(
                        $crate::Field::new(
                            ::core::stringify!($field),
                            $crate::args::is_public(::core::stringify!($field_vis)),
                            &self.$field,
                        )?,
                    )*
                ]))
            }
        }

        impl $crate::Unmarshal for $name {
            #[allow(unused_mut, unused_variables)]
            fn unmarshal(
                &mut self,
                args: &$crate::ArgMap,
                mode: $crate::CoercionMode,
            ) -> ::core::result::Result<(), $crate::UnmarshalError> {
                let mut index: u32 = 0;
                $(
                    index += 1;
                    $crate::coerce::unpack_field(&mut self.$field, index, args, mode)?;
                )*
                ::core::result::Result::Ok(())
            }
        }
    };
}
