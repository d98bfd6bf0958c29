//! Streaming reader (spec §4.3): the inverse of [`super::writer::Writer`].
//!
//! Grounded on the teacher's `BsonReader`/`LimitReader`/`parse_element`
//! (`bson/de.rs`), generalized to the 19-kind value model and to an
//! optional field-projection filter (`read_document`'s `wanted` param),
//! which the teacher's reader does not have (LiteDB always reads whole
//! documents).

use crate::bson::binary::BinarySubtype;
use crate::bson::error::ParseError;
use crate::bson::{Array, BsonType, Decimal128, Document, ObjectId, Regex, Timestamp, Value};
use crate::bson::date_time::DateTime;
use crate::sink::ByteSink;
use std::collections::HashSet;

pub struct Reader<S: ByteSink> {
    sink: S,
}

impl<S: ByteSink> Reader<S> {
    pub fn new(sink: S) -> Self {
        Reader { sink }
    }

    pub fn close(self) -> S {
        tracing::debug!(position = self.sink.position(), "reader closed");
        self.sink
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ParseError> {
        self.sink.read_bytes(buf).map_err(ParseError::from)
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_i32(&mut self) -> Result<i32, ParseError> {
        Ok(i32::from_le_bytes(self.read_fixed()?))
    }

    fn read_c_string(&mut self) -> Result<String, ParseError> {
        let mut buffer = Vec::new();
        loop {
            let byte = self.read_fixed::<1>()?[0];
            if byte == 0 {
                break;
            }
            buffer.push(byte);
        }
        String::from_utf8(buffer).map_err(ParseError::from)
    }

    fn read_string(&mut self) -> Result<String, ParseError> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative string length"))?;
        if len == 0 {
            return Err(ParseError::malformed("string length must include trailing NUL"));
        }
        let mut buffer = vec![0u8; len];
        self.read_exact(&mut buffer)?;
        if buffer.pop() != Some(0) {
            return Err(ParseError::malformed("string missing trailing NUL"));
        }
        String::from_utf8(buffer).map_err(ParseError::from)
    }

    /// Reads a single tagged value, given its already-consumed tag.
    fn read_value_tagged(&mut self, kind: BsonType) -> Result<Value, ParseError> {
        Ok(match kind {
            BsonType::MinKey => Value::MinKey,
            BsonType::Null => Value::Null,
            BsonType::MaxKey => Value::MaxKey,
            BsonType::Int32 => Value::Int32(self.read_i32()?),
            BsonType::Int64 => Value::Int64(i64::from_le_bytes(self.read_fixed()?)),
            BsonType::Double => Value::Double(f64::from_le_bytes(self.read_fixed()?)),
            BsonType::Decimal128 => Value::Decimal128(
                Decimal128::from_bytes(self.read_fixed()?)
                    .ok_or_else(|| ParseError::malformed("invalid decimal128 payload"))?,
            ),
            BsonType::ObjectId => Value::ObjectId(ObjectId::from_bytes(self.read_fixed()?)),
            BsonType::Boolean => Value::Boolean(self.read_fixed::<1>()?[0] != 0),
            BsonType::DateTime => Value::DateTime(
                DateTime::from_unix_milliseconds(i64::from_le_bytes(self.read_fixed()?))
                    .ok_or(ParseError::OutOfRange("datetime millis out of range".into()))?,
            ),
            BsonType::Timestamp => Value::Timestamp(Timestamp::from_raw(u64::from_le_bytes(self.read_fixed()?))),
            BsonType::String => Value::String(self.read_string()?),
            BsonType::Symbol => Value::Symbol(self.read_string()?),
            BsonType::JavaScript => Value::JavaScript(self.read_string()?),
            BsonType::RegularExpression => {
                let pattern = self.read_c_string()?;
                let options = self.read_c_string()?;
                Value::RegularExpression(Regex::new(pattern, options))
            }
            BsonType::Binary => {
                let len = self.read_i32()?;
                let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative binary length"))?;
                let subtype = BinarySubtype::from_u8(self.read_fixed::<1>()?[0])?;
                let mut buffer = vec![0u8; len];
                self.read_exact(&mut buffer)?;
                Value::Binary(crate::bson::Binary::new(subtype, buffer))
            }
            BsonType::Document => Value::Document(self.read_document(None)?),
            BsonType::Array => Value::Array(self.read_array()?),
            BsonType::JavaScriptWithScope => {
                let _total_len = self.read_i32()?;
                let code = self.read_string()?;
                let scope = self.read_document(None)?;
                Value::JavaScriptWithScope { code, scope }
            }
        })
    }

    /// Reads a full document. If `wanted` is given, only those top-level
    /// field names are materialized; the rest are skipped by their
    /// declared length without being parsed (spec §4.3 "field
    /// projection").
    pub fn read_document(&mut self, wanted: Option<&HashSet<String>>) -> Result<Document, ParseError> {
        let declared_size = self.read_i32()?;
        let declared_size =
            usize::try_from(declared_size).map_err(|_| ParseError::malformed("negative document size"))?;
        let start = self.sink.position();
        let mut doc = Document::new();
        loop {
            let tag = self.read_fixed::<1>()?[0];
            if tag == 0 {
                break;
            }
            let kind = BsonType::from_tag_byte(tag).ok_or(ParseError::UnsupportedKind(tag))?;
            let key = self.read_c_string()?;
            let keep = wanted.is_none_or(|w| w.contains(&key));
            if keep {
                let value = self.read_value_tagged(kind)?;
                if doc.insert(key.clone(), value).is_some() {
                    return Err(ParseError::DuplicateKey(key));
                }
            } else {
                self.skip_value(kind)?;
            }
        }
        let consumed = (self.sink.position() - start) as usize;
        if consumed != declared_size {
            return Err(ParseError::SizeMismatch { declared: declared_size, consumed });
        }
        Ok(doc)
    }

    pub fn read_array(&mut self) -> Result<Array, ParseError> {
        let declared_size = self.read_i32()?;
        let declared_size =
            usize::try_from(declared_size).map_err(|_| ParseError::malformed("negative array size"))?;
        let start = self.sink.position();
        let mut arr = Array::new();
        let mut expected_index = 0usize;
        loop {
            let tag = self.read_fixed::<1>()?[0];
            if tag == 0 {
                break;
            }
            let kind = BsonType::from_tag_byte(tag).ok_or(ParseError::UnsupportedKind(tag))?;
            let key = self.read_c_string()?;
            if key != expected_index.to_string() {
                return Err(ParseError::BadIndexKey { expected: expected_index, actual: key });
            }
            expected_index += 1;
            arr.push(self.read_value_tagged(kind)?);
        }
        let consumed = (self.sink.position() - start) as usize;
        if consumed != declared_size {
            return Err(ParseError::SizeMismatch { declared: declared_size, consumed });
        }
        Ok(arr)
    }

    /// Top-level-only lenient accessor: returns `Null` instead of erroring
    /// when the stream is exhausted before any value is read (spec §9
    /// Open Question 3 resolution, see DESIGN.md).
    pub fn read_value_or_null(&mut self) -> Result<Value, ParseError> {
        let tag = match self.read_fixed::<1>() {
            Ok([t]) => t,
            Err(ParseError::UnexpectedEnd) => return Ok(Value::Null),
            Err(e) => return Err(e),
        };
        let kind = BsonType::from_tag_byte(tag).ok_or(ParseError::UnsupportedKind(tag))?;
        self.read_value_tagged(kind)
    }

    fn skip_value(&mut self, kind: BsonType) -> Result<(), ParseError> {
        match kind {
            BsonType::MinKey | BsonType::Null | BsonType::MaxKey => Ok(()),
            BsonType::Int32 => self.skip(4),
            BsonType::Int64 | BsonType::Double | BsonType::Timestamp => self.skip(8),
            BsonType::Decimal128 => self.skip(16),
            BsonType::ObjectId => self.skip(12),
            BsonType::Boolean => self.skip(1),
            BsonType::DateTime => self.skip(8),
            BsonType::String | BsonType::Symbol | BsonType::JavaScript => {
                let len = self.read_i32()?;
                self.skip(usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?)
            }
            BsonType::RegularExpression => {
                self.read_c_string()?;
                self.read_c_string()?;
                Ok(())
            }
            BsonType::Binary => {
                let len = self.read_i32()?;
                self.skip(1)?;
                self.skip(usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?)
            }
            BsonType::Document | BsonType::Array => {
                let len = self.read_i32()?;
                let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?;
                // the 4-byte length already read counts itself; a declared
                // length shorter than that is corrupt input, not a valid
                // empty container.
                let body = len.checked_sub(4).ok_or_else(|| ParseError::malformed("container length shorter than its own length prefix"))?;
                self.skip(body)
            }
            BsonType::JavaScriptWithScope => {
                let len = self.read_i32()?;
                let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?;
                let body = len.checked_sub(4).ok_or_else(|| ParseError::malformed("container length shorter than its own length prefix"))?;
                self.skip(body)
            }
        }
    }

    fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::writer::Writer;
    use std::io::Cursor;

    fn write_then_read(doc: &Document) -> Document {
        let size = crate::bson::size::document_payload_size(doc).unwrap();
        let mut buf = vec![0u8; size];
        Writer::new(Cursor::new(&mut buf[..])).write_document(doc).unwrap();
        Reader::new(Cursor::new(&buf[..])).read_document(None).unwrap()
    }

    #[test]
    fn round_trips_scalars() {
        let mut doc = Document::new();
        doc.insert("i", 42i32);
        doc.insert("s", "hello");
        doc.insert("b", true);
        doc.insert("n", Value::Null);
        let read = write_then_read(&doc);
        assert_eq!(read, doc);
    }

    #[test]
    fn field_projection_skips_unwanted() {
        let mut doc = Document::new();
        doc.insert("keep", 1i32);
        doc.insert("skip", "a long string that should be skipped entirely".to_string());
        let size = crate::bson::size::document_payload_size(&doc).unwrap();
        let mut buf = vec![0u8; size];
        Writer::new(Cursor::new(&mut buf[..])).write_document(&doc).unwrap();

        let wanted: HashSet<String> = ["keep".to_string()].into_iter().collect();
        let read = Reader::new(Cursor::new(&buf[..])).read_document(Some(&wanted)).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read.get("keep").unwrap().as_i32(), Some(1));
    }

    #[test]
    fn skipped_nested_document_with_corrupt_length_is_malformed_not_panic() {
        // outer doc: field "keep" (int32), field "bad" (embedded document
        // whose declared length is 1 -- shorter than the 4-byte length
        // prefix that declares it). "bad" is projected out, so this only
        // exercises the skip path, not full decoding.
        let mut buf = Vec::new();
        buf.extend_from_slice(&0i32.to_le_bytes()); // placeholder total length
        buf.push(0x10); // int32 tag
        buf.extend_from_slice(b"keep\0");
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.push(0x03); // document tag
        buf.extend_from_slice(b"bad\0");
        buf.extend_from_slice(&1i32.to_le_bytes()); // corrupt: < 4
        buf.push(0);
        let total = buf.len() as i32;
        buf[0..4].copy_from_slice(&total.to_le_bytes());

        let wanted: HashSet<String> = ["keep".to_string()].into_iter().collect();
        let err = Reader::new(Cursor::new(&buf[..])).read_document(Some(&wanted));
        assert!(matches!(err, Err(ParseError::MalformedValue(_))));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let mut buf = Vec::new();
        // hand-build: int32 len, tag int32 'a'\0 value, tag int32 'a'\0 value, 0
        buf.extend_from_slice(&0i32.to_le_bytes());
        for _ in 0..2 {
            buf.push(0x10);
            buf.extend_from_slice(b"a\0");
            buf.extend_from_slice(&1i32.to_le_bytes());
        }
        buf.push(0);
        let total = buf.len() as i32;
        buf[0..4].copy_from_slice(&total.to_le_bytes());
        let err = Reader::new(Cursor::new(&buf[..])).read_document(None);
        assert!(matches!(err, Err(ParseError::DuplicateKey(_))));
    }
}
