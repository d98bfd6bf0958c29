//! BSON value model, wire codec and size calculator (spec §3, §4.1-§4.3).
//!
//! This is a from-scratch tagged union covering the full 19-kind BSON
//! spec, generalized from the teacher's (`vrc-get-litedb`) 15-kind LiteDB
//! subset: `String`/`Symbol`/`Binary` gain the distinctions LiteDB
//! collapses (plain binary only, no subtype; no regex/JS/timestamp kinds
//! at all), and `Guid` is demoted from its own `Value` variant to a
//! `Binary`-subtype concept handled in the conversion layer (`convert`),
//! matching spec.md's 19-kind table exactly.

pub mod array;
pub mod binary;
pub mod date_time;
pub mod decimal128;
pub mod document;
pub mod error;
pub mod reader;
pub mod regex;
pub mod scanner;
pub mod size;
pub mod span_reader;
pub mod timestamp;
pub mod writer;

pub use array::Array;
pub use binary::{Binary, BinarySubtype};
pub use date_time::DateTime;
pub use decimal128::Decimal128;
pub use document::Document;
pub use error::ParseError;
pub use object_id::ObjectId;
pub use regex::Regex;
pub use timestamp::Timestamp;

mod object_id;

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// The tag byte a [`Value`] serializes under (spec §3 table + real BSON
/// wire tags, so existing BSON tooling can read our output).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BsonType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    RegularExpression = 0x0B,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MinKey = 0xFF,
    MaxKey = 0x7F,
}

impl BsonType {
    pub fn as_tag_byte(self) -> u8 {
        self as u8
    }

    pub fn from_tag_byte(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => Self::Double,
            0x02 => Self::String,
            0x03 => Self::Document,
            0x04 => Self::Array,
            0x05 => Self::Binary,
            0x07 => Self::ObjectId,
            0x08 => Self::Boolean,
            0x09 => Self::DateTime,
            0x0A => Self::Null,
            0x0B => Self::RegularExpression,
            0x0D => Self::JavaScript,
            0x0E => Self::Symbol,
            0x0F => Self::JavaScriptWithScope,
            0x10 => Self::Int32,
            0x11 => Self::Timestamp,
            0x12 => Self::Int64,
            0x13 => Self::Decimal128,
            0xFF => Self::MinKey,
            0x7F => Self::MaxKey,
            _ => return None,
        })
    }

    /// Bucket used for the cross-kind ordering of spec §4.1: `Null <
    /// MinKey < Numeric < String/Symbol < Document < Array < Binary <
    /// ObjectId < Boolean < DateTime < Timestamp < Regex < JS <
    /// JSWithScope < MaxKey`.
    fn order_bucket(self) -> u8 {
        match self {
            BsonType::Null => 0,
            BsonType::MinKey => 1,
            BsonType::Int32 | BsonType::Int64 | BsonType::Double | BsonType::Decimal128 => 2,
            BsonType::String | BsonType::Symbol => 3,
            BsonType::Document => 4,
            BsonType::Array => 5,
            BsonType::Binary => 6,
            BsonType::ObjectId => 7,
            BsonType::Boolean => 8,
            BsonType::DateTime => 9,
            BsonType::Timestamp => 10,
            BsonType::RegularExpression => 11,
            BsonType::JavaScript => 12,
            BsonType::JavaScriptWithScope => 13,
            BsonType::MaxKey => 14,
        }
    }

    fn is_numeric(self) -> bool {
        self.order_bucket() == 2
    }
}

/// One BSON value (spec §3). Immutable after construction: `Document`'s
/// and `Array`'s "mutators" build a new owning value rather than aliasing
/// a previously observed one (spec §3 "Lifecycles").
#[derive(Debug, Clone)]
pub enum Value {
    MinKey,
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal128(Decimal128),
    String(String),
    Symbol(String),
    Document(Document),
    Array(Array),
    Binary(Binary),
    ObjectId(ObjectId),
    Boolean(bool),
    DateTime(DateTime),
    Timestamp(Timestamp),
    RegularExpression(Regex),
    JavaScript(String),
    JavaScriptWithScope { code: String, scope: Document },
    MaxKey,
}

impl Value {
    pub fn kind(&self) -> BsonType {
        match self {
            Value::MinKey => BsonType::MinKey,
            Value::Null => BsonType::Null,
            Value::Int32(_) => BsonType::Int32,
            Value::Int64(_) => BsonType::Int64,
            Value::Double(_) => BsonType::Double,
            Value::Decimal128(_) => BsonType::Decimal128,
            Value::String(_) => BsonType::String,
            Value::Symbol(_) => BsonType::Symbol,
            Value::Document(_) => BsonType::Document,
            Value::Array(_) => BsonType::Array,
            Value::Binary(_) => BsonType::Binary,
            Value::ObjectId(_) => BsonType::ObjectId,
            Value::Boolean(_) => BsonType::Boolean,
            Value::DateTime(_) => BsonType::DateTime,
            Value::Timestamp(_) => BsonType::Timestamp,
            Value::RegularExpression(_) => BsonType::RegularExpression,
            Value::JavaScript(_) => BsonType::JavaScript,
            Value::JavaScriptWithScope { .. } => BsonType::JavaScriptWithScope,
            Value::MaxKey => BsonType::MaxKey,
        }
    }

    /// The total order used by indexes (spec §4.1 `compare_to`).
    pub fn compare_to(&self, other: &Value) -> Ordering {
        let (a, b) = (self.kind(), other.kind());
        if a.is_numeric() && b.is_numeric() {
            return numeric_order(self, other);
        }
        a.order_bucket().cmp(&b.order_bucket()).then_with(|| match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::String(a), Value::Symbol(b)) => a.cmp(b),
            (Value::Symbol(a), Value::String(b)) => a.cmp(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.compare_to(b),
            (Value::Array(a), Value::Array(b)) => a.compare_to(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::RegularExpression(a), Value::RegularExpression(b)) => a.cmp(b),
            (Value::JavaScript(a), Value::JavaScript(b)) => a.cmp(b),
            (
                Value::JavaScriptWithScope { code: ca, scope: sa },
                Value::JavaScriptWithScope { code: cb, scope: sb },
            ) => ca.cmp(cb).then_with(|| sa.compare_to(sb)),
            _ => Ordering::Equal,
        })
    }

    /// Equality by kind + payload, except numeric kinds compare by
    /// mathematical value (spec §4.1: "Decimal128/Double not cross-equal
    /// unless mathematically equal" implies the converse too).
    pub fn bson_eq(&self, other: &Value) -> bool {
        let (a, b) = (self.kind(), other.kind());
        if a.is_numeric() && b.is_numeric() {
            return numeric_order(self, other) == Ordering::Equal;
        }
        self.compare_to(other) == Ordering::Equal && a == b
    }

    pub fn bson_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => {
                numeric_canonical_string(self).hash(state);
            }
            Value::MinKey => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::String(s) | Value::Symbol(s) | Value::JavaScript(s) => s.hash(state),
            Value::Document(d) => d.hash_into(state),
            Value::Array(a) => a.hash_into(state),
            Value::Binary(b) => b.hash(state),
            Value::ObjectId(o) => o.hash(state),
            Value::Boolean(b) => b.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Timestamp(t) => t.hash(state),
            Value::RegularExpression(r) => r.hash(state),
            Value::JavaScriptWithScope { code, scope } => {
                code.hash(state);
                scope.hash_into(state);
            }
            Value::MaxKey => 2u8.hash(state),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            &Value::Int32(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            &Value::Int64(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            &Value::Double(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_decimal128(&self) -> Option<Decimal128> {
        match self {
            &Value::Decimal128(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn into_document(self) -> Result<Document, Self> {
        match self {
            Value::Document(d) => Ok(d),
            _ => Err(self),
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn into_array(self) -> Result<Array, Self> {
        match self {
            Value::Array(a) => Ok(a),
            _ => Err(self),
        }
    }

    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            &Value::ObjectId(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            &Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<DateTime> {
        match self {
            &Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

fn numeric_canonical_string(v: &Value) -> String {
    match v {
        Value::Int32(i) => i.to_string(),
        Value::Int64(i) => i.to_string(),
        Value::Decimal128(d) => d.to_string(),
        Value::Double(f) => {
            if let Ok(d) = Decimal128::try_from(*f) {
                d.to_string()
            } else {
                format!("f64:{}", f.to_bits())
            }
        }
        _ => unreachable!("numeric_canonical_string called on non-numeric value"),
    }
}

/// Mathematical-value comparison across Int32/Int64/Double/Decimal128
/// (spec §4.1 "Within numerics... compare by mathematical value").
fn numeric_order(a: &Value, b: &Value) -> Ordering {
    // Two exact integers: compare as i64, no precision loss.
    if let (Some(a), Some(b)) = (as_exact_i64(a), as_exact_i64(b)) {
        return a.cmp(&b);
    }
    // Either side is a float: compare as f64 (spec allows the minor
    // precision loss this implies for huge integers, same tradeoff the
    // reference runtime makes when boxing numerics as `double`).
    if matches!(a, Value::Double(_)) || matches!(b, Value::Double(_)) {
        let af = as_f64_lossy(a);
        let bf = as_f64_lossy(b);
        return af.partial_cmp(&bf).unwrap_or(Ordering::Equal);
    }
    // Otherwise at least one side is Decimal128: promote both to Decimal128.
    let ad = as_decimal128_lossy(a);
    let bd = as_decimal128_lossy(b);
    ad.cmp(&bd)
}

fn as_exact_i64(v: &Value) -> Option<i64> {
    match v {
        &Value::Int32(i) => Some(i as i64),
        &Value::Int64(i) => Some(i),
        _ => None,
    }
}

fn as_f64_lossy(v: &Value) -> f64 {
    match v {
        &Value::Int32(i) => i as f64,
        &Value::Int64(i) => i as f64,
        &Value::Double(d) => d,
        Value::Decimal128(d) => d.to_string().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn as_decimal128_lossy(v: &Value) -> Decimal128 {
    match v {
        &Value::Int32(i) => Decimal128::from(i),
        &Value::Int64(i) => Decimal128::from(i),
        &Value::Decimal128(d) => d,
        &Value::Double(f) => Decimal128::try_from(f).unwrap_or(Decimal128::ZERO),
        _ => Decimal128::ZERO,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.bson_eq(other)
    }
}

mod from_impls {
    use super::*;

    impl From<i32> for Value {
        fn from(v: i32) -> Value {
            Value::Int32(v)
        }
    }

    impl From<i64> for Value {
        fn from(v: i64) -> Value {
            Value::Int64(v)
        }
    }

    impl From<f64> for Value {
        fn from(v: f64) -> Value {
            Value::Double(v)
        }
    }

    impl From<Decimal128> for Value {
        fn from(v: Decimal128) -> Value {
            Value::Decimal128(v)
        }
    }

    impl From<String> for Value {
        fn from(v: String) -> Value {
            Value::String(v)
        }
    }

    impl From<&str> for Value {
        fn from(v: &str) -> Value {
            Value::String(v.into())
        }
    }

    impl From<Document> for Value {
        fn from(v: Document) -> Value {
            Value::Document(v)
        }
    }

    impl From<Array> for Value {
        fn from(v: Array) -> Value {
            Value::Array(v)
        }
    }

    impl From<Binary> for Value {
        fn from(v: Binary) -> Value {
            Value::Binary(v)
        }
    }

    impl From<ObjectId> for Value {
        fn from(v: ObjectId) -> Value {
            Value::ObjectId(v)
        }
    }

    impl From<bool> for Value {
        fn from(v: bool) -> Value {
            Value::Boolean(v)
        }
    }

    impl From<DateTime> for Value {
        fn from(v: DateTime) -> Value {
            Value::DateTime(v)
        }
    }

    impl From<Vec<Value>> for Value {
        fn from(v: Vec<Value>) -> Value {
            Value::Array(v.into())
        }
    }

    impl<T> From<Option<T>> for Value
    where
        Value: From<T>,
    {
        fn from(v: Option<T>) -> Value {
            match v {
                Some(v) => v.into(),
                None => Value::Null,
            }
        }
    }
}

/// Serializes `doc` into a freshly-allocated, pre-sized buffer (spec §6
/// "Exposed interfaces").
pub fn serialize_document(doc: &Document) -> Result<Vec<u8>, ParseError> {
    let buffer = crate::sink::GrowableBuffer::with_capacity(size::document_payload_size(doc)?);
    let mut writer = writer::Writer::new(buffer);
    writer.write_document(doc)?;
    Ok(writer.close().into_inner())
}

/// Serializes `doc` into a caller-supplied [`ByteSink`](crate::sink::ByteSink),
/// returning the sink back once finished.
pub fn serialize_document_to_sink<S: crate::sink::ByteSink>(
    doc: &Document,
    sink: S,
) -> Result<S, ParseError> {
    let mut writer = writer::Writer::new(sink);
    writer.write_document(doc)?;
    Ok(writer.close())
}

/// Decodes a complete document through the streaming [`reader::Reader`].
pub fn deserialize_document(bytes: &[u8]) -> Result<Document, ParseError> {
    let mut reader = reader::Reader::new(std::io::Cursor::new(bytes));
    reader.read_document(None)
}

/// Decodes only `fields` out of `bytes` (spec §4.3 field projection).
pub fn deserialize_document_with_fields(
    bytes: &[u8],
    fields: &std::collections::HashSet<String>,
) -> Result<Document, ParseError> {
    let mut reader = reader::Reader::new(std::io::Cursor::new(bytes));
    reader.read_document(Some(fields))
}

/// Decodes a complete document directly out of an already-mapped byte
/// slice, through the zero-copy [`span_reader`] instead of [`reader::Reader`].
pub fn deserialize_document_from_memory(bytes: &[u8]) -> Result<Document, ParseError> {
    span_reader::decode_document(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_facade_functions() {
        let mut doc = Document::new();
        doc.insert("name", "abc");
        doc.insert("n", 123i32);
        let bytes = serialize_document(&doc).unwrap();
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), bytes.len() as i32);
        assert_eq!(*bytes.last().unwrap(), 0);
        assert_eq!(deserialize_document(&bytes).unwrap(), doc);
        assert_eq!(deserialize_document_from_memory(&bytes).unwrap(), doc);
    }

    #[test]
    fn order_matches_bucket_table() {
        assert!(Value::Null.compare_to(&Value::MinKey) == Ordering::Less);
        assert!(Value::MinKey.compare_to(&Value::Int32(0)) == Ordering::Less);
        assert!(Value::Int32(0).compare_to(&Value::String("".into())) == Ordering::Less);
        assert!(Value::String("".into()).compare_to(&Value::Document(Document::new())) == Ordering::Less);
        assert!(Value::MaxKey.compare_to(&Value::JavaScript("".into())) == Ordering::Greater);
    }

    #[test]
    fn numeric_cross_kind_equal() {
        assert!(Value::Int32(5).bson_eq(&Value::Int64(5)));
        assert!(Value::Int32(5).bson_eq(&Value::Double(5.0)));
        assert!(!Value::Int32(5).bson_eq(&Value::Double(5.5)));
    }

    #[test]
    fn numeric_cross_kind_ordered() {
        assert_eq!(Value::Int32(1).compare_to(&Value::Double(2.0)), Ordering::Less);
        assert_eq!(Value::Int64(10).compare_to(&Value::Int32(3)), Ordering::Greater);
    }

    #[test]
    fn non_numeric_kinds_never_equal() {
        assert!(!Value::String("1".into()).bson_eq(&Value::Int32(1)));
    }
}
