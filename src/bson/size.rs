//! Size calculator (spec §4.2): computes the exact serialized byte length
//! of a value before any bytes are written, so `Writer` can pre-size
//! Document/Array length prefixes without a second buffering pass.
//!
//! Grounded on the teacher's `Value::get_serialized_value_len` /
//! `Document::get_serialized_value_len` (`bson.rs`), generalized to the
//! 19-kind value model and array-index key costing (`dec_len`, from the
//! teacher's now-removed `bson/utils.rs`).

use crate::bson::error::ParseError;
use crate::bson::{Array, Document, Value};

/// Digit count of `u` in base 10 (`0` counts as one digit). Used to cost
/// an array element's synthetic `"0"`, `"1"`, ... key without allocating.
pub(crate) fn dec_len(u: usize) -> usize {
    let mut n = 1;
    let mut v = u as u128;
    while v >= 10 {
        v /= 10;
        n += 1;
    }
    n
}

fn to_i32(size: usize) -> Result<i32, ParseError> {
    i32::try_from(size).map_err(|_| ParseError::OutOfRange(format!("serialized size {size} exceeds i32::MAX")))
}

/// Size of one value's payload, not counting its tag byte or key.
pub fn value_payload_size(value: &Value) -> Result<usize, ParseError> {
    Ok(match value {
        Value::MinKey | Value::Null | Value::MaxKey => 0,
        Value::Int32(_) => 4,
        Value::Int64(_) => 8,
        Value::Double(_) => 8,
        Value::Decimal128(_) => 16,
        Value::ObjectId(_) => 12,
        Value::Boolean(_) => 1,
        Value::DateTime(_) => 8,
        Value::Timestamp(_) => 8,
        Value::String(s) | Value::Symbol(s) => 4 + s.len() + 1,
        Value::JavaScript(s) => 4 + s.len() + 1,
        Value::RegularExpression(r) => r.serialized_len(),
        Value::Binary(b) => b.serialized_len(),
        Value::Document(d) => document_payload_size(d)?,
        Value::Array(a) => array_payload_size(a)?,
        Value::JavaScriptWithScope { code, scope } => {
            // int32 total-len + string(code) + document(scope)
            4 + (4 + code.len() + 1) + document_payload_size(scope)?
        }
    })
}

/// Size of a document's body, header `int32` length prefix included, NOT
/// including the parent element's own tag byte and key.
pub fn document_payload_size(doc: &Document) -> Result<usize, ParseError> {
    let mut size = 4 + 1; // length prefix + terminating NUL
    for (key, value) in doc.iter() {
        size += 1; // tag byte
        size += key.len() + 1; // cstring key
        size += value_payload_size(value)?;
    }
    Ok(size)
}

/// Size of an array's body; array elements are keyed by their decimal
/// index (`"0"`, `"1"`, ...), same wire shape as a document.
pub fn array_payload_size(arr: &Array) -> Result<usize, ParseError> {
    let mut size = 4 + 1;
    for (index, value) in arr.iter().enumerate() {
        size += 1;
        size += dec_len(index) + 1;
        size += value_payload_size(value)?;
    }
    Ok(size)
}

/// Full serialized size of a top-level document, as an `i32` (the BSON
/// wire length prefix is itself an `i32`).
pub fn document_size(doc: &Document) -> Result<i32, ParseError> {
    to_i32(document_payload_size(doc)?)
}

pub fn array_size(arr: &Array) -> Result<i32, ParseError> {
    to_i32(array_payload_size(arr)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Binary;

    #[test]
    fn dec_len_matches_digit_count() {
        assert_eq!(dec_len(0), 1);
        assert_eq!(dec_len(9), 1);
        assert_eq!(dec_len(10), 2);
        assert_eq!(dec_len(99), 2);
        assert_eq!(dec_len(100), 3);
    }

    #[test]
    fn empty_document_size() {
        let doc = Document::new();
        assert_eq!(document_size(&doc).unwrap(), 5);
    }

    #[test]
    fn document_with_fields() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        // tag(1) + "a\0"(2) + int32(4) = 7, plus header 5 = 12
        assert_eq!(document_payload_size(&doc).unwrap(), 12);
    }

    #[test]
    fn binary_size_matches_subtype_header() {
        let bin = Binary::generic(vec![1, 2, 3]);
        assert_eq!(value_payload_size(&Value::Binary(bin)).unwrap(), 4 + 1 + 3);
    }
}
