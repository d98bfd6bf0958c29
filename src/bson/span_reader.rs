//! Zero-copy span reader (spec §4.3): parses directly out of a borrowed
//! `&[u8]` instead of going through [`ByteSink`](crate::sink::ByteSink),
//! for callers holding an already-mapped page who don't want a `Cursor`
//! indirection. Grounded on `mongodb-bson-rust`'s `RawDocument`/`RawBson`
//! design (`other_examples/`), which takes the same "borrow the bytes,
//! validate lazily" approach; ours eagerly decodes into a [`Document`]
//! rather than returning lazy accessors, since spec.md's conversion layer
//! expects owned [`Value`]s.

use crate::bson::binary::BinarySubtype;
use crate::bson::error::ParseError;
use crate::bson::{Array, BsonType, Decimal128, Document, ObjectId, Regex, Timestamp, Value};
use crate::bson::date_time::DateTime;

struct Span<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Span<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Span { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        if self.pos + n > self.bytes.len() {
            return Err(ParseError::UnexpectedEnd);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_fixed<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn take_i32(&mut self) -> Result<i32, ParseError> {
        Ok(i32::from_le_bytes(self.take_fixed()?))
    }

    fn take_c_str(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(ParseError::UnexpectedEnd);
            }
            if self.bytes[self.pos] == 0 {
                let slice = &self.bytes[start..self.pos];
                self.pos += 1;
                return std::str::from_utf8(slice).map_err(|e| ParseError::malformed(e.to_string()));
            }
            self.pos += 1;
        }
    }

    fn take_string(&mut self) -> Result<String, ParseError> {
        let len = self.take_i32()?;
        let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative string length"))?;
        if len == 0 {
            return Err(ParseError::malformed("string length must include trailing NUL"));
        }
        let bytes = self.take(len)?;
        if bytes[len - 1] != 0 {
            return Err(ParseError::malformed("string missing trailing NUL"));
        }
        String::from_utf8(bytes[..len - 1].to_vec()).map_err(ParseError::from)
    }

    fn take_value(&mut self, kind: BsonType) -> Result<Value, ParseError> {
        Ok(match kind {
            BsonType::MinKey => Value::MinKey,
            BsonType::Null => Value::Null,
            BsonType::MaxKey => Value::MaxKey,
            BsonType::Int32 => Value::Int32(self.take_i32()?),
            BsonType::Int64 => Value::Int64(i64::from_le_bytes(self.take_fixed()?)),
            BsonType::Double => Value::Double(f64::from_le_bytes(self.take_fixed()?)),
            BsonType::Decimal128 => Value::Decimal128(
                Decimal128::from_bytes(self.take_fixed()?)
                    .ok_or_else(|| ParseError::malformed("invalid decimal128 payload"))?,
            ),
            BsonType::ObjectId => Value::ObjectId(ObjectId::from_bytes(self.take_fixed()?)),
            BsonType::Boolean => Value::Boolean(self.take_fixed::<1>()?[0] != 0),
            BsonType::DateTime => Value::DateTime(
                DateTime::from_unix_milliseconds(i64::from_le_bytes(self.take_fixed()?))
                    .ok_or(ParseError::OutOfRange("datetime millis out of range".into()))?,
            ),
            BsonType::Timestamp => Value::Timestamp(Timestamp::from_raw(u64::from_le_bytes(self.take_fixed()?))),
            BsonType::String => Value::String(self.take_string()?),
            BsonType::Symbol => Value::Symbol(self.take_string()?),
            BsonType::JavaScript => Value::JavaScript(self.take_string()?),
            BsonType::RegularExpression => {
                let pattern = self.take_c_str()?.to_string();
                let options = self.take_c_str()?.to_string();
                Value::RegularExpression(Regex::new(pattern, options))
            }
            BsonType::Binary => {
                let len = self.take_i32()?;
                let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative binary length"))?;
                let subtype = BinarySubtype::from_u8(self.take_fixed::<1>()?[0])?;
                let bytes = self.take(len)?.to_vec();
                Value::Binary(crate::bson::Binary::new(subtype, bytes))
            }
            BsonType::Document => Value::Document(self.take_document()?),
            BsonType::Array => Value::Array(self.take_array()?),
            BsonType::JavaScriptWithScope => {
                let _total_len = self.take_i32()?;
                let code = self.take_string()?;
                let scope = self.take_document()?;
                Value::JavaScriptWithScope { code, scope }
            }
        })
    }

    fn take_document(&mut self) -> Result<Document, ParseError> {
        let declared = self.take_i32()?;
        let declared = usize::try_from(declared).map_err(|_| ParseError::malformed("negative document size"))?;
        let start = self.pos;
        let mut doc = Document::new();
        loop {
            let tag = self.take_fixed::<1>()?[0];
            if tag == 0 {
                break;
            }
            let kind = BsonType::from_tag_byte(tag).ok_or(ParseError::UnsupportedKind(tag))?;
            let key = self.take_c_str()?.to_string();
            let value = self.take_value(kind)?;
            if doc.insert(key.clone(), value).is_some() {
                return Err(ParseError::DuplicateKey(key));
            }
        }
        let consumed = self.pos - start;
        if consumed != declared {
            return Err(ParseError::SizeMismatch { declared, consumed });
        }
        Ok(doc)
    }

    fn take_array(&mut self) -> Result<Array, ParseError> {
        let declared = self.take_i32()?;
        let declared = usize::try_from(declared).map_err(|_| ParseError::malformed("negative array size"))?;
        let start = self.pos;
        let mut arr = Array::new();
        let mut expected_index = 0usize;
        loop {
            let tag = self.take_fixed::<1>()?[0];
            if tag == 0 {
                break;
            }
            let kind = BsonType::from_tag_byte(tag).ok_or(ParseError::UnsupportedKind(tag))?;
            let key = self.take_c_str()?;
            if key != expected_index.to_string() {
                return Err(ParseError::BadIndexKey { expected: expected_index, actual: key.to_string() });
            }
            expected_index += 1;
            arr.push(self.take_value(kind)?);
        }
        let consumed = self.pos - start;
        if consumed != declared {
            return Err(ParseError::SizeMismatch { declared, consumed });
        }
        Ok(arr)
    }
}

/// Decodes a complete top-level document out of `bytes`.
pub fn decode_document(bytes: &[u8]) -> Result<Document, ParseError> {
    let mut span = Span::new(bytes);
    let doc = span.take_document()?;
    if span.pos != bytes.len() {
        return Err(ParseError::SizeMismatch { declared: span.pos, consumed: bytes.len() });
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::writer::Writer;
    use std::io::Cursor;

    #[test]
    fn decodes_what_writer_produces() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        doc.insert("nested", Document::new().with("x", "y"));
        let size = crate::bson::size::document_payload_size(&doc).unwrap();
        let mut buf = vec![0u8; size];
        Writer::new(Cursor::new(&mut buf[..])).write_document(&doc).unwrap();
        let decoded = decode_document(&buf).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        let size = crate::bson::size::document_payload_size(&doc).unwrap();
        let mut buf = vec![0u8; size + 3];
        Writer::new(Cursor::new(&mut buf[..size])).write_document(&doc).unwrap();
        assert!(decode_document(&buf).is_err());
    }
}
