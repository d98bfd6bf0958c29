use crate::bson::error::ParseError;
use std::fmt::Debug;

/// Binary subtype tag (spec §3 Binary row).
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy, Ord, PartialOrd)]
pub enum BinarySubtype {
    Generic,
    Function,
    UuidLegacy,
    Uuid,
    User(u8),
}

impl BinarySubtype {
    pub fn as_u8(self) -> u8 {
        match self {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::UuidLegacy => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::User(n) => n,
        }
    }

    pub fn from_u8(b: u8) -> Result<Self, ParseError> {
        match b {
            0x00 => Ok(BinarySubtype::Generic),
            0x01 => Ok(BinarySubtype::Function),
            0x03 => Ok(BinarySubtype::UuidLegacy),
            0x04 => Ok(BinarySubtype::Uuid),
            0x80..=0xFF => Ok(BinarySubtype::User(b)),
            other => Err(ParseError::BadBinarySubtype(other)),
        }
    }

    pub fn is_uuid(self) -> bool {
        matches!(self, BinarySubtype::Uuid | BinarySubtype::UuidLegacy)
    }
}

/// Length-prefixed, subtyped byte string (spec §3 Binary row).
#[derive(Eq, PartialEq, Hash, Debug, Clone, Ord, PartialOrd)]
pub struct Binary {
    subtype: BinarySubtype,
    bytes: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: BinarySubtype, bytes: Vec<u8>) -> Self {
        Self { subtype, bytes }
    }

    pub fn generic(bytes: Vec<u8>) -> Self {
        Self::new(BinarySubtype::Generic, bytes)
    }

    /// Builds a 16-byte Uuid-subtype binary.
    ///
    /// Returns `None` if `bytes` is not exactly 16 bytes long (spec §3
    /// "Binary subtype Uuid/UuidLegacy requires exactly 16 bytes").
    pub fn uuid(bytes: [u8; 16]) -> Self {
        Self::new(BinarySubtype::Uuid, bytes.to_vec())
    }

    pub fn subtype(&self) -> BinarySubtype {
        self.subtype
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Returns the size of serialized value, not including tag or key.
    pub fn serialized_len(&self) -> usize {
        4 + 1 + self.bytes.len()
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Binary::generic(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmp_test() {
        assert!(Binary::generic(vec![]) < Binary::generic(vec![1, 2, 3]));
        assert!(Binary::generic(vec![0]) < Binary::generic(vec![1, 2, 3]));
    }

    #[test]
    fn subtype_round_trips() {
        for b in [0x00, 0x01, 0x03, 0x04, 0x80, 0xFF] {
            assert_eq!(BinarySubtype::from_u8(b).unwrap().as_u8(), b);
        }
        assert!(BinarySubtype::from_u8(0x05).is_err());
    }
}
