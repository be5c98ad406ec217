//! Versioned key encoding.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of entity ID in bytes.
pub const ENTITY_ID_SIZE: usize = 16;

/// Size of version timestamp in bytes.
pub const VERSION_TS_SIZE: usize = 8;

/// Total key size.
pub const KEY_SIZE: usize = ENTITY_ID_SIZE + VERSION_TS_SIZE;

/// A versioned key combining entity ID and version timestamp.
///
/// Key format: `[entity_id (16 bytes)][version_ts (8 bytes, big-endian)]`
///
/// Big-endian encoding keeps lexicographic order equal to numeric order,
/// so range scans return versions oldest first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionedKey {
    /// Entity identifier.
    pub entity_id: [u8; ENTITY_ID_SIZE],

    /// Version timestamp in microseconds since Unix epoch.
    pub version_ts: u64,
}

impl VersionedKey {
    /// Create a new versioned key.
    pub fn new(entity_id: [u8; ENTITY_ID_SIZE], version_ts: u64) -> Self {
        Self {
            entity_id,
            version_ts,
        }
    }

    /// Create a key with the current timestamp.
    pub fn now(entity_id: [u8; ENTITY_ID_SIZE]) -> Self {
        Self::new(entity_id, current_timestamp())
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> [u8; KEY_SIZE] {
        let mut buf = [0u8; KEY_SIZE];
        buf[..ENTITY_ID_SIZE].copy_from_slice(&self.entity_id);
        buf[ENTITY_ID_SIZE..].copy_from_slice(&self.version_ts.to_be_bytes());
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_SIZE {
            return None;
        }

        let entity_id: [u8; ENTITY_ID_SIZE] = bytes[..ENTITY_ID_SIZE].try_into().ok()?;
        let ts_bytes: [u8; VERSION_TS_SIZE] = bytes[ENTITY_ID_SIZE..].try_into().ok()?;

        Some(Self {
            entity_id,
            version_ts: u64::from_be_bytes(ts_bytes),
        })
    }

    /// Create the minimum key for an entity (version 0).
    pub fn min_for_entity(entity_id: [u8; ENTITY_ID_SIZE]) -> Self {
        Self::new(entity_id, 0)
    }

    /// Create the maximum key for an entity (max version).
    pub fn max_for_entity(entity_id: [u8; ENTITY_ID_SIZE]) -> Self {
        Self::new(entity_id, u64::MAX)
    }
}

impl fmt::Debug for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedKey")
            .field("entity_id", &hex::encode(self.entity_id))
            .field("version_ts", &self.version_ts)
            .finish()
    }
}

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Current timestamp in microseconds since Unix epoch.
///
/// Strictly increasing within the process, even when the wall clock stalls
/// or steps backwards.
pub fn current_timestamp() -> u64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default();

    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let entity_id = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let key = VersionedKey::new(entity_id, 1234567890123456u64);

        let decoded = VersionedKey::decode(&key.encode()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_lexicographic_ordering() {
        let entity_id = [0u8; 16];

        let enc1 = VersionedKey::new(entity_id, 100).encode();
        let enc2 = VersionedKey::new(entity_id, 200).encode();
        let enc3 = VersionedKey::new(entity_id, 300).encode();

        assert!(enc1 < enc2);
        assert!(enc2 < enc3);
    }

    #[test]
    fn test_decode_invalid_length() {
        assert!(VersionedKey::decode(&[0u8; 10]).is_none());
        assert!(VersionedKey::decode(&[0u8; 30]).is_none());
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut prev = current_timestamp();
        for _ in 0..1000 {
            let next = current_timestamp();
            assert!(next > prev);
            prev = next;
        }
    }
}
