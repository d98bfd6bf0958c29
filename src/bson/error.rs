//! Wire-codec error model (spec §4.3 "Error model", §7 taxonomy 1-11).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of stream")]
    UnexpectedEnd,

    #[error("declared size {declared} does not match consumed size {consumed}")]
    SizeMismatch { declared: usize, consumed: usize },

    #[error("unsupported bson kind tag: 0x{0:02x}")]
    UnsupportedKind(u8),

    #[error("invalid utf-8 in string/cstring payload: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("malformed value: {0}")]
    MalformedValue(String),

    #[error("bad binary subtype: 0x{0:02x}")]
    BadBinarySubtype(u8),

    #[error("cstring contains an interior NUL byte")]
    NulInCString,

    #[error("duplicate key in document: {0}")]
    DuplicateKey(String),

    #[error("bad array index key: expected {expected}, found {actual:?}")]
    BadIndexKey { expected: usize, actual: String },

    #[error("value out of range: {0}")]
    OutOfRange(String),
}

impl ParseError {
    pub fn malformed(context: impl Into<String>) -> Self {
        ParseError::MalformedValue(context.into())
    }
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::WriteZero => {
                ParseError::UnexpectedEnd
            }
            _ => ParseError::MalformedValue(err.to_string()),
        }
    }
}
