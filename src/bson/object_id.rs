use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 12-byte opaque identifier, byte-ordered compare (spec §3 / GLOSSARY).
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectId {
    bytes: [u8; 12],
}

static COUNTER: AtomicU32 = AtomicU32::new(0);

impl ObjectId {
    pub const EMPTY: ObjectId = ObjectId { bytes: [0; 12] };

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.bytes
    }

    /// 4-byte unix seconds + 5 random bytes + 3-byte counter, the classic
    /// Mongo-style layout; collision-resistant enough for local ids without
    /// needing a machine/process discriminator (out of scope here, there is
    /// no multi-process coordination in this crate).
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let random: [u8; 5] = rand::random();
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&random);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..]);
        ObjectId { bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == [0; 12]
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::EMPTY
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectId").field(&hex::encode(self.bytes)).finish()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_byte_order() {
        let a = ObjectId::from_bytes([0; 12]);
        let mut b_bytes = [0; 12];
        b_bytes[11] = 1;
        let b = ObjectId::from_bytes(b_bytes);
        assert!(a < b);
    }

    #[test]
    fn empty_is_empty() {
        assert!(ObjectId::EMPTY.is_empty());
        assert!(!ObjectId::new().is_empty());
    }
}
