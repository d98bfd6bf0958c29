//! Single-field scanner (spec §4.3): finds one top-level field by name
//! inside an encoded document without materializing the rest of it.
//!
//! Shares its skip-by-length-table logic with [`super::reader::Reader`]
//! but works directly over `&[u8]`, the same zero-copy posture as
//! [`super::span_reader`]. A malformed field *name* (bad UTF-8 in a key)
//! is treated as "this field isn't the one we're looking for" and the
//! scan continues; an unknown type *tag* is a hard error, since at that
//! point we can no longer know how many bytes to skip (spec §4.3 "Error
//! model", scanner row).

use crate::bson::binary::BinarySubtype;
use crate::bson::error::ParseError;
use crate::bson::{BsonType, Decimal128, ObjectId, Regex, Timestamp, Value};
use crate::bson::date_time::DateTime;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
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

    /// Reads a cstring key. Returns `Ok(None)` if the bytes are not valid
    /// UTF-8 (malformed *name*, not a hard error here), else the name.
    fn take_key(&mut self) -> Result<Option<&'a str>, ParseError> {
        let start = self.pos;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(ParseError::UnexpectedEnd);
            }
            if self.bytes[self.pos] == 0 {
                let slice = &self.bytes[start..self.pos];
                self.pos += 1;
                return Ok(std::str::from_utf8(slice).ok());
            }
            self.pos += 1;
        }
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
            BsonType::String | BsonType::Symbol | BsonType::JavaScript => {
                let len = self.take_i32()?;
                let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative string length"))?;
                let bytes = self.take(len)?;
                let s = String::from_utf8(bytes[..len.saturating_sub(1)].to_vec()).map_err(ParseError::from)?;
                match kind {
                    BsonType::Symbol => Value::Symbol(s),
                    BsonType::JavaScript => Value::JavaScript(s),
                    _ => Value::String(s),
                }
            }
            BsonType::RegularExpression => {
                let pattern = self.take_key()?.ok_or_else(|| ParseError::malformed("bad regex pattern utf-8"))?.to_string();
                let options = self.take_key()?.ok_or_else(|| ParseError::malformed("bad regex options utf-8"))?.to_string();
                Value::RegularExpression(Regex::new(pattern, options))
            }
            BsonType::Binary => {
                let len = self.take_i32()?;
                let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative binary length"))?;
                let subtype = BinarySubtype::from_u8(self.take_fixed::<1>()?[0])?;
                let bytes = self.take(len)?.to_vec();
                Value::Binary(crate::bson::Binary::new(subtype, bytes))
            }
            BsonType::Document | BsonType::Array => {
                // materialize via the shared span decoder; we already
                // consumed nothing of its body yet.
                let start = self.pos;
                self.skip_container()?;
                let slice = &self.bytes[start..self.pos];
                if kind == BsonType::Array {
                    Value::Array(crate::bson::span_reader::decode_document(slice)?.into_iter().map(|(_, v)| v).collect())
                } else {
                    Value::Document(crate::bson::span_reader::decode_document(slice)?)
                }
            }
            BsonType::JavaScriptWithScope => {
                let total_len = self.take_i32()?;
                let total_len = usize::try_from(total_len).map_err(|_| ParseError::malformed("negative length"))?;
                let start_of_len_field = self.pos - 4;
                self.pos = start_of_len_field + total_len;
                return Err(ParseError::malformed("javascript-with-scope is not supported by scan_field"));
            }
        })
    }

    fn skip_container(&mut self) -> Result<(), ParseError> {
        let len = self.take_i32()?;
        let len = usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?;
        // len includes the 4 bytes we've already consumed.
        self.pos = self.pos - 4 + len;
        if self.pos > self.bytes.len() {
            return Err(ParseError::UnexpectedEnd);
        }
        Ok(())
    }

    fn skip_value(&mut self, kind: BsonType) -> Result<(), ParseError> {
        match kind {
            BsonType::MinKey | BsonType::Null | BsonType::MaxKey => Ok(()),
            BsonType::Int32 => self.take(4).map(drop),
            BsonType::Int64 | BsonType::Double | BsonType::Timestamp | BsonType::DateTime => {
                self.take(8).map(drop)
            }
            BsonType::Decimal128 => self.take(16).map(drop),
            BsonType::ObjectId => self.take(12).map(drop),
            BsonType::Boolean => self.take(1).map(drop),
            BsonType::String | BsonType::Symbol | BsonType::JavaScript => {
                let len = self.take_i32()?;
                self.take(usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?)
                    .map(drop)
            }
            BsonType::RegularExpression => {
                self.take_key()?;
                self.take_key()?;
                Ok(())
            }
            BsonType::Binary => {
                let len = self.take_i32()?;
                self.take(1)?;
                self.take(usize::try_from(len).map_err(|_| ParseError::malformed("negative length"))?)
                    .map(drop)
            }
            BsonType::Document | BsonType::Array | BsonType::JavaScriptWithScope => self.skip_container(),
        }
    }
}

/// Looks up `name` among `bytes`'s top-level fields, decoding only that
/// field's value. Returns `Ok(None)` if the document has no such field.
pub fn scan_field(bytes: &[u8], name: &str) -> Result<Option<Value>, ParseError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let declared = cursor.take_i32()?;
    let declared = usize::try_from(declared).map_err(|_| ParseError::malformed("negative document size"))?;
    if declared > bytes.len() {
        return Err(ParseError::UnexpectedEnd);
    }
    loop {
        let tag = cursor.take_fixed::<1>()?[0];
        if tag == 0 {
            return Ok(None);
        }
        let kind = BsonType::from_tag_byte(tag).ok_or(ParseError::UnsupportedKind(tag))?;
        let key = cursor.take_key()?;
        if key == Some(name) {
            return Ok(Some(cursor.take_value(kind)?));
        }
        cursor.skip_value(kind)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::writer::Writer;
    use crate::bson::Document;
    use std::io::Cursor as IoCursor;

    #[test]
    fn finds_field_without_decoding_siblings() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        doc.insert("b", "value");
        let size = crate::bson::size::document_payload_size(&doc).unwrap();
        let mut buf = vec![0u8; size];
        Writer::new(IoCursor::new(&mut buf[..])).write_document(&doc).unwrap();

        let value = scan_field(&buf, "b").unwrap().unwrap();
        assert_eq!(value.as_str(), Some("value"));
    }

    #[test]
    fn missing_field_is_none_not_error() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        let size = crate::bson::size::document_payload_size(&doc).unwrap();
        let mut buf = vec![0u8; size];
        Writer::new(IoCursor::new(&mut buf[..])).write_document(&doc).unwrap();

        assert!(scan_field(&buf, "missing").unwrap().is_none());
    }
}
