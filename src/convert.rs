//! Conversion layer (spec §4.4): host values ⇄ [`Value`], and
//! [`Value`] ⇄ a requested target natural shape.
//!
//! The teacher has no analogous layer (LiteDB's own mapper lives in the
//! engine/expression modules this crate drops); this is grounded directly
//! on spec.md §4.4's rules, expressed the idiomatic Rust way: a
//! `ToBson`/`FromBson` trait pair stands in for the source's runtime
//! `object`-typed dispatch, the same shape `serde`'s `Serialize`/
//! `Deserialize` traits use, which `mongodb-mongo-rust-driver`
//! (`examples/`) relies on throughout its own document conversions.

use crate::bson::{Array, Binary, Decimal128, Document, ObjectId, Value};
use crate::bson::date_time::DateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not parse {input:?} as {target}")]
    Format { input: String, target: &'static str },

    #[error("value {value} does not fit in target type {target} (checked arithmetic overflow)")]
    Overflow { value: String, target: &'static str },

    #[error("bson kind {found:?} cannot convert to {target}")]
    UnsupportedKind { found: crate::bson::BsonType, target: &'static str },

    /// Right BSON kind, wrong shape for the target (spec §4.4 taxonomy
    /// item #10): e.g. a `Binary` of the right variant but the wrong
    /// subtype or length for a `Guid`.
    #[error("malformed value for {target}: {detail}")]
    MalformedValue { detail: String, target: &'static str },
}

/// Host → BSON (spec §4.4 "Host → BSON").
pub trait ToBson {
    fn to_bson(&self) -> Value;
}

/// BSON → host target type (spec §4.4 "BSON → Host"), the idiomatic
/// per-target-type replacement for the source's `from_bson(value,
/// target_type)` runtime dispatch.
pub trait FromBson: Sized {
    fn from_bson(value: &Value) -> Result<Self, ConvertError>;
}

pub fn to_bson<T: ToBson>(value: &T) -> Value {
    value.to_bson()
}

pub fn from_bson<T: FromBson>(value: &Value) -> Result<T, ConvertError> {
    T::from_bson(value)
}

macro_rules! to_bson_int32 {
    ($($ty:ty),*) => {$(
        impl ToBson for $ty {
            fn to_bson(&self) -> Value {
                Value::Int32(i32::from(*self))
            }
        }
    )*};
}

to_bson_int32!(i8, i16, i32, u8, u16, u32);

impl ToBson for i64 {
    fn to_bson(&self) -> Value {
        Value::Int64(*self)
    }
}

impl ToBson for u64 {
    fn to_bson(&self) -> Value {
        Value::Int64(*self as i64)
    }
}

impl ToBson for f32 {
    fn to_bson(&self) -> Value {
        Value::Double(f64::from(*self))
    }
}

impl ToBson for f64 {
    fn to_bson(&self) -> Value {
        Value::Double(*self)
    }
}

impl ToBson for bool {
    fn to_bson(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl ToBson for str {
    fn to_bson(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToBson for String {
    fn to_bson(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToBson for Vec<u8> {
    fn to_bson(&self) -> Value {
        Value::Binary(Binary::generic(self.clone()))
    }
}

impl ToBson for DateTime {
    fn to_bson(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl ToBson for ObjectId {
    fn to_bson(&self) -> Value {
        Value::ObjectId(*self)
    }
}

impl ToBson for Decimal128 {
    fn to_bson(&self) -> Value {
        Value::Decimal128(*self)
    }
}

impl ToBson for Document {
    fn to_bson(&self) -> Value {
        Value::Document(self.clone())
    }
}

impl<T: ToBson> ToBson for Vec<T> {
    fn to_bson(&self) -> Value {
        Value::Array(self.iter().map(ToBson::to_bson).collect::<Vec<_>>().into())
    }
}

impl<T: ToBson> ToBson for Option<T> {
    fn to_bson(&self) -> Value {
        match self {
            Some(v) => v.to_bson(),
            None => Value::Null,
        }
    }
}

/// A 16-byte globally-unique id. Not its own [`Value`] variant — spec.md's
/// 19 kinds don't list one — represented as `Binary` subtype `Uuid` on the
/// wire (spec §4.4 "Guid → Binary subtype Uuid, 16 bytes ... little-endian").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub [u8; 16]);

impl ToBson for Guid {
    fn to_bson(&self) -> Value {
        Value::Binary(Binary::uuid(self.0))
    }
}

impl FromBson for Guid {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Binary(b) if b.subtype().is_uuid() && b.bytes().len() == 16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(b.bytes());
                Ok(Guid(bytes))
            }
            // Right variant, wrong subtype or length (spec.md:143, :278):
            // a shape violation, not a kind mismatch.
            Value::Binary(b) => Err(ConvertError::MalformedValue {
                detail: format!("expected a 16-byte Uuid-subtype Binary, found subtype {:?} with {} byte(s)", b.subtype(), b.bytes().len()),
                target: "Guid",
            }),
            other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "Guid" }),
        }
    }
}

fn overflow(value: impl std::fmt::Display, target: &'static str) -> ConvertError {
    ConvertError::Overflow { value: value.to_string(), target }
}

fn format_err(input: impl std::fmt::Display, target: &'static str) -> ConvertError {
    ConvertError::Format { input: input.to_string(), target }
}

/// Numeric value as an `f64`, used as the common currency for checked
/// numeric cross-conversions (spec §4.4 "Numeric cross-type conversions
/// use checked arithmetic").
fn as_math_f64(value: &Value) -> Option<f64> {
    match value {
        &Value::Int32(i) => Some(f64::from(i)),
        &Value::Int64(i) => Some(i as f64),
        &Value::Double(d) => Some(d),
        Value::Decimal128(d) => d.to_string().parse().ok(),
        _ => None,
    }
}

macro_rules! from_bson_int {
    ($ty:ty, $name:literal) => {
        impl FromBson for $ty {
            fn from_bson(value: &Value) -> Result<Self, ConvertError> {
                match value {
                    Value::Null => Ok(<$ty>::default()),
                    Value::String(s) => s.trim().parse().map_err(|_| format_err(s, $name)),
                    // Integral BSON kinds convert through exact integer
                    // arithmetic, never an f64 intermediate: round-tripping
                    // through f64 loses precision above 2^53 and rounds
                    // i64::MAX/u64::MAX past their own range, which would
                    // wrongly report an in-range identity conversion as
                    // overflowing (spec §4.4 "within range round-trips").
                    &Value::Int32(i) => <$ty>::try_from(i).map_err(|_| overflow(i, $name)),
                    &Value::Int64(i) => <$ty>::try_from(i).map_err(|_| overflow(i, $name)),
                    other => {
                        let f = as_math_f64(other).ok_or_else(|| ConvertError::UnsupportedKind {
                            found: other.kind(),
                            target: $name,
                        })?;
                        let truncated = f.trunc();
                        <$ty>::try_from(truncated as i128).map_err(|_| overflow(f, $name))
                    }
                }
            }
        }
    };
}

from_bson_int!(i8, "i8");
from_bson_int!(i16, "i16");
from_bson_int!(i32, "i32");
from_bson_int!(i64, "i64");
from_bson_int!(u8, "u8");
from_bson_int!(u16, "u16");
from_bson_int!(u32, "u32");
from_bson_int!(u64, "u64");

impl FromBson for f64 {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Null => Ok(0.0),
            Value::String(s) => s.trim().parse().map_err(|_| format_err(s, "f64")),
            other => as_math_f64(other).ok_or_else(|| ConvertError::UnsupportedKind { found: other.kind(), target: "f64" }),
        }
    }
}

impl FromBson for bool {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Null => Ok(false),
            &Value::Boolean(b) => Ok(b),
            other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "bool" }),
        }
    }
}

impl FromBson for String {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) | Value::Symbol(s) => Ok(s.clone()),
            other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "String" }),
        }
    }
}

impl FromBson for Vec<u8> {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Binary(b) => Ok(b.bytes().to_vec()),
            Value::String(s) => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(|_| format_err(s, "Vec<u8>"))
            }
            other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "Vec<u8>" }),
        }
    }
}

impl FromBson for DateTime {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            &Value::DateTime(dt) => Ok(dt),
            other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "DateTime" }),
        }
    }
}

impl FromBson for ObjectId {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            &Value::ObjectId(id) => Ok(id),
            other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "ObjectId" }),
        }
    }
}

impl<T: FromBson> FromBson for Option<T> {
    fn from_bson(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Null => Ok(None),
            other => Ok(Some(T::from_bson(other)?)),
        }
    }
}

/// The "object target" host-natural mapping (spec §4.4 "Object target →
/// returns a natural host value per kind"). Infallible: every [`Value`]
/// has a natural host shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Natural {
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(Decimal128),
    Boolean(bool),
    String(String),
    DateTime(DateTime),
    ObjectId(ObjectId),
    Guid(Guid),
    Bytes(Vec<u8>),
    Document(Document),
    Array(Vec<Natural>),
}

pub fn into_natural(value: &Value) -> Natural {
    match value {
        Value::MinKey | Value::MaxKey | Value::Null => Natural::Null,
        &Value::Int32(i) => Natural::Int32(i),
        &Value::Int64(i) => Natural::Int64(i),
        &Value::Double(d) => Natural::Double(d),
        &Value::Decimal128(d) => Natural::Decimal(d),
        &Value::Boolean(b) => Natural::Boolean(b),
        Value::String(s) | Value::Symbol(s) | Value::JavaScript(s) => Natural::String(s.clone()),
        &Value::DateTime(dt) => Natural::DateTime(dt),
        &Value::Timestamp(ts) => Natural::Int64(ts.as_raw() as i64),
        &Value::ObjectId(id) => Natural::ObjectId(id),
        Value::Binary(b) if b.subtype().is_uuid() && b.bytes().len() == 16 => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(b.bytes());
            Natural::Guid(Guid(bytes))
        }
        Value::Binary(b) => Natural::Bytes(b.bytes().to_vec()),
        Value::RegularExpression(r) => Natural::String(format!("/{}/{}", r.pattern(), r.options())),
        Value::Document(d) => Natural::Document(d.clone()),
        Value::Array(a) => Natural::Array(a.iter().map(into_natural).collect()),
        Value::JavaScriptWithScope { code, .. } => Natural::String(code.clone()),
    }
}

/// Collection (iterable) → Array, element-wise (spec §4.4).
pub fn array_to_bson<T: ToBson>(items: impl IntoIterator<Item = T>) -> Value {
    let arr: Array = items.into_iter().map(|v| v.to_bson()).collect();
    Value::Array(arr)
}

/// Mapping with string keys → Document (spec §4.4). Non-string keys are
/// not representable by this signature, which is the point: the type
/// system rejects them instead of raising at runtime.
pub fn mapping_to_bson<T: ToBson>(entries: impl IntoIterator<Item = (String, T)>) -> Value {
    let mut doc = Document::new();
    for (k, v) in entries {
        doc.insert(k, v.to_bson());
    }
    Value::Document(doc)
}

/// Widens an enum's integer discriminant (spec §4.4 "Enum → Int32").
pub fn enum_to_bson(discriminant: i64) -> Value {
    match i32::try_from(discriminant) {
        Ok(d) => Value::Int32(d),
        Err(_) => Value::Int64(discriminant),
    }
}

/// String-valued enum coercion, opt-in per call (spec §4.4): the caller
/// picks this entry point explicitly rather than it being implied by the
/// enum's declared representation.
pub fn enum_to_bson_named(variant_name: &str) -> Value {
    Value::String(variant_name.to_string())
}

/// Resolves a BSON value back to an enum discriminant, given the
/// variant's `(name, discriminant)` table. Accepts both the Int32/Int64
/// form and the opt-in string form.
pub fn convert_enum(value: &Value, variants: &[(&str, i64)]) -> Result<i64, ConvertError> {
    match value {
        &Value::Int32(i) => Ok(i64::from(i)),
        &Value::Int64(i) => Ok(i),
        Value::String(s) => variants
            .iter()
            .find(|(name, _)| name == s)
            .map(|(_, d)| *d)
            .ok_or_else(|| format_err(s, "enum")),
        other => Err(ConvertError::UnsupportedKind { found: other.kind(), target: "enum" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_widening_round_trips() {
        assert_eq!(5i32.to_bson(), Value::Int32(5));
        assert_eq!(5u64.to_bson(), Value::Int64(5));
        assert_eq!(i32::from_bson(&Value::Int64(41)).unwrap(), 41);
    }

    #[test]
    fn overflow_is_detected() {
        let err = i32::from_bson(&Value::Int64(1i64 << 40));
        assert!(matches!(err, Err(ConvertError::Overflow { .. })));
    }

    #[test]
    fn string_to_numeric_uses_invariant_parse() {
        assert_eq!(i32::from_bson(&Value::String("42".into())).unwrap(), 42);
        assert!(i32::from_bson(&Value::String("not a number".into())).is_err());
    }

    #[test]
    fn guid_round_trips_through_binary_uuid() {
        let guid = Guid([7u8; 16]);
        let value = guid.to_bson();
        assert_eq!(Guid::from_bson(&value).unwrap(), guid);
    }

    #[test]
    fn guid_rejects_wrong_length_as_malformed() {
        let short = Value::Binary(Binary::new(crate::bson::binary::BinarySubtype::Uuid, vec![1u8; 15]));
        assert!(matches!(Guid::from_bson(&short), Err(ConvertError::MalformedValue { .. })));
    }

    #[test]
    fn guid_rejects_wrong_subtype_as_malformed() {
        let generic = Value::Binary(crate::bson::Binary::generic(vec![1u8; 16]));
        assert!(matches!(Guid::from_bson(&generic), Err(ConvertError::MalformedValue { .. })));
    }

    #[test]
    fn string_to_bytes_uses_base64() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"hi");
        let bytes = Vec::<u8>::from_bson(&Value::String(encoded)).unwrap();
        assert_eq!(bytes, b"hi");
    }

    #[test]
    fn into_natural_classifies_every_kind() {
        assert_eq!(into_natural(&Value::Null), Natural::Null);
        assert_eq!(into_natural(&Value::Int32(1)), Natural::Int32(1));
        assert!(matches!(into_natural(&Value::Array(Array::new())), Natural::Array(v) if v.is_empty()));
    }

    #[test]
    fn enum_conversion_accepts_int_and_string() {
        let variants = [("Red", 0i64), ("Green", 1), ("Blue", 2)];
        assert_eq!(convert_enum(&Value::Int32(1), &variants).unwrap(), 1);
        assert_eq!(convert_enum(&Value::String("Blue".into()), &variants).unwrap(), 2);
        assert!(convert_enum(&Value::String("Purple".into()), &variants).is_err());
    }
}
