use bytes::Bytes;

use crate::address::Address;
use crate::error::CallError;

/// A decoded contract-call reply or argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    /// Unsigned integer. Serialized as a decimal string so wei amounts
    /// survive JSON tooling that truncates to f64.
    Uint(#[serde(with = "decimal")] u128),
    Bytes(#[serde(with = "hex_bytes")] Bytes),
    String(String),
    Address(Address),
    Array(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Uint(_) => "uint",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Address(_) => "address",
            Self::Array(_) => "array",
        }
    }

    fn mismatch(&self, expected: &'static str) -> CallError {
        CallError::Decode {
            expected,
            found: self.kind(),
        }
    }
}

impl From<Address> for Value {
    fn from(a: Address) -> Self {
        Self::Address(a)
    }
}

impl From<u128> for Value {
    fn from(n: u128) -> Self {
        Self::Uint(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Uint(u128::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Typed view of a [`Value`]. The equivalent of decoding a call reply into
/// a typed target.
pub trait Decode: Sized {
    /// # Errors
    /// Returns `CallError::Decode` when the value has the wrong shape and
    /// `CallError::Overflow` when an integer does not fit.
    fn decode(value: Value) -> Result<Self, CallError>;
}

impl Decode for Value {
    fn decode(value: Value) -> Result<Self, CallError> {
        Ok(value)
    }
}

impl Decode for bool {
    fn decode(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl Decode for u128 {
    fn decode(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Uint(n) => Ok(n),
            other => Err(other.mismatch("uint")),
        }
    }
}

macro_rules! narrow_uint {
    ($ty:ty) => {
        impl Decode for $ty {
            fn decode(value: Value) -> Result<Self, CallError> {
                let wide = u128::decode(value)?;
                <$ty>::try_from(wide).map_err(|_| CallError::Overflow(stringify!($ty)))
            }
        }
    };
}

narrow_uint!(u8);
narrow_uint!(u32);
narrow_uint!(u64);

impl Decode for String {
    fn decode(value: Value) -> Result<Self, CallError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }
}

impl Decode for Bytes {
    fn decode(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(other.mismatch("bytes")),
        }
    }
}

impl Decode for Address {
    fn decode(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Address(a) => Ok(a),
            other => Err(other.mismatch("address")),
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: Value) -> Result<Self, CallError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::decode).collect(),
            other => Err(other.mismatch("array")),
        }
    }
}

mod decimal {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(n: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&n.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(D::Error::custom)
    }
}

mod hex_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(b: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        let raw = String::deserialize(d)?;
        let digits = raw.strip_prefix("0x").unwrap_or(&raw);
        hex::decode(digits).map(Bytes::from).map_err(D::Error::custom)
    }
}
