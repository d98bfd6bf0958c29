//! Streaming writer (spec §4.3): serializes a [`Document`]/[`Array`]/
//! [`Value`] into anything implementing [`ByteSink`].
//!
//! Grounded on the teacher's `BsonWriter` trait and `Value::write_value`
//! (`bson.rs`), generalized from a write-only trait over one `Cursor`
//! impl to the bidirectional `ByteSink` so the same sink type backs both
//! writer and reader.

use crate::bson::error::ParseError;
use crate::bson::size::document_payload_size;
use crate::bson::{Array, Document, Value};
use crate::sink::ByteSink;

/// Writes BSON values into a `ByteSink`. Consumes the sink on [`close`],
/// the ownership-based replacement for the teacher's dispose-flag pattern
/// (spec §4.3 "Lifecycle"; see DESIGN.md for the redesign rationale).
pub struct Writer<S: ByteSink> {
    sink: S,
}

impl<S: ByteSink> Writer<S> {
    pub fn new(sink: S) -> Self {
        Writer { sink }
    }

    pub fn position(&self) -> u64 {
        self.sink.position()
    }

    /// Releases the underlying sink back to the caller.
    pub fn close(self) -> S {
        tracing::debug!(position = self.sink.position(), "writer closed");
        self.sink
    }

    pub fn write_document(&mut self, doc: &Document) -> Result<(), ParseError> {
        let size = document_payload_size(doc)?;
        self.sink.write_bytes(&i32::try_from(size).map_err(|_| {
            ParseError::OutOfRange(format!("document size {size} exceeds i32::MAX"))
        })?.to_le_bytes())?;
        for (key, value) in doc.iter() {
            self.write_element(key, value)?;
        }
        self.sink.write_bytes(&[0])?;
        Ok(())
    }

    pub fn write_array(&mut self, arr: &Array) -> Result<(), ParseError> {
        let size = crate::bson::size::array_payload_size(arr)?;
        self.sink.write_bytes(&i32::try_from(size).map_err(|_| {
            ParseError::OutOfRange(format!("array size {size} exceeds i32::MAX"))
        })?.to_le_bytes())?;
        for (index, value) in arr.iter().enumerate() {
            self.write_element(&index.to_string(), value)?;
        }
        self.sink.write_bytes(&[0])?;
        Ok(())
    }

    fn write_element(&mut self, key: &str, value: &Value) -> Result<(), ParseError> {
        self.sink.write_bytes(&[value.kind().as_tag_byte()])?;
        self.write_c_string(key)?;
        self.write_value(value)
    }

    fn write_c_string(&mut self, s: &str) -> Result<(), ParseError> {
        if s.as_bytes().contains(&0) {
            return Err(ParseError::NulInCString);
        }
        self.sink.write_bytes(s.as_bytes())?;
        self.sink.write_bytes(&[0])?;
        Ok(())
    }

    fn write_string(&mut self, s: &str) -> Result<(), ParseError> {
        let len = i32::try_from(s.len() + 1)
            .map_err(|_| ParseError::OutOfRange(format!("string of length {} too long", s.len())))?;
        self.sink.write_bytes(&len.to_le_bytes())?;
        self.sink.write_bytes(s.as_bytes())?;
        self.sink.write_bytes(&[0])?;
        Ok(())
    }

    pub fn write_value(&mut self, value: &Value) -> Result<(), ParseError> {
        match value {
            Value::MinKey | Value::Null | Value::MaxKey => Ok(()),
            Value::Int32(v) => Ok(self.sink.write_bytes(&v.to_le_bytes())?),
            Value::Int64(v) => Ok(self.sink.write_bytes(&v.to_le_bytes())?),
            Value::Double(v) => Ok(self.sink.write_bytes(&v.to_le_bytes())?),
            Value::Decimal128(v) => Ok(self.sink.write_bytes(&v.bytes())?),
            Value::ObjectId(v) => Ok(self.sink.write_bytes(v.as_bytes())?),
            Value::Boolean(v) => Ok(self.sink.write_bytes(&[u8::from(*v)])?),
            Value::DateTime(v) => Ok(self.sink.write_bytes(&v.as_unix_milliseconds().to_le_bytes())?),
            Value::Timestamp(v) => Ok(self.sink.write_bytes(&v.as_raw().to_le_bytes())?),
            Value::String(s) | Value::Symbol(s) => self.write_string(s),
            Value::JavaScript(s) => self.write_string(s),
            Value::RegularExpression(r) => {
                self.write_c_string(r.pattern())?;
                self.write_c_string(r.options())
            }
            Value::Binary(b) => {
                let len = i32::try_from(b.bytes().len())
                    .map_err(|_| ParseError::OutOfRange("binary payload too long".into()))?;
                self.sink.write_bytes(&len.to_le_bytes())?;
                self.sink.write_bytes(&[b.subtype().as_u8()])?;
                Ok(self.sink.write_bytes(b.bytes())?)
            }
            Value::Document(d) => self.write_document(d),
            Value::Array(a) => self.write_array(a),
            Value::JavaScriptWithScope { code, scope } => {
                let scope_size = document_payload_size(scope)?;
                let total = 4 + (4 + code.len() + 1) + scope_size;
                let total = i32::try_from(total)
                    .map_err(|_| ParseError::OutOfRange("javascript-with-scope too large".into()))?;
                self.sink.write_bytes(&total.to_le_bytes())?;
                self.write_string(code)?;
                self.write_document(scope)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Binary;
    use std::io::Cursor;

    fn roundtrip(doc: &Document) -> Vec<u8> {
        let size = document_payload_size(doc).unwrap();
        let mut buf = vec![0u8; size];
        let mut writer = Writer::new(Cursor::new(&mut buf[..]));
        writer.write_document(doc).unwrap();
        buf
    }

    #[test]
    fn writes_empty_document() {
        let doc = Document::new();
        let buf = roundtrip(&doc);
        assert_eq!(buf, vec![5, 0, 0, 0, 0]);
    }

    #[test]
    fn writes_scalar_fields() {
        let mut doc = Document::new();
        doc.insert("a", 1i32);
        doc.insert("b", true);
        let buf = roundtrip(&doc);
        assert_eq!(buf.len(), document_payload_size(&doc).unwrap());
        assert_eq!(buf[0..4], (buf.len() as i32).to_le_bytes());
        assert_eq!(*buf.last().unwrap(), 0);
    }

    #[test]
    fn rejects_nul_in_key() {
        let mut doc = Document::new();
        doc.insert("ok", 1i32);
        let size = document_payload_size(&doc).unwrap() + 10;
        let mut buf = vec![0u8; size];
        let mut writer = Writer::new(Cursor::new(&mut buf[..]));
        let err = writer.write_element("a\0b", &Value::Binary(Binary::generic(vec![])));
        assert!(matches!(err, Err(ParseError::NulInCString)));
    }
}
