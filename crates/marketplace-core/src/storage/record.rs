//! Record type for stored values.

use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// A stored record with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Encoded entity fields.
    pub data: Vec<u8>,

    /// Write timestamp in microseconds since Unix epoch.
    pub created_at: u64,

    /// Whether this record is a tombstone.
    pub deleted: bool,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            created_at: super::key::current_timestamp(),
            deleted: false,
        }
    }

    /// Create a tombstone record.
    pub fn tombstone() -> Self {
        Self {
            data: Vec::new(),
            created_at: super::key::current_timestamp(),
            deleted: true,
        }
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
