//! Record identifiers.

use std::fmt;
use std::str::FromStr;

use marketplace_core::{EntityId, StorageEngine, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A 16-byte record id, written as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(EntityId);

impl Id {
    /// Wrap raw id bytes.
    pub const fn from_bytes(bytes: EntityId) -> Self {
        Self(bytes)
    }

    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(StorageEngine::generate_id())
    }

    /// Raw id bytes.
    pub fn as_bytes(&self) -> &EntityId {
        &self.0
    }

    /// Hex form of the id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<EntityId> for Id {
    fn from(bytes: EntityId) -> Self {
        Self(bytes)
    }
}

impl From<Id> for Value {
    fn from(id: Id) -> Self {
        Value::Uuid(id.0)
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| Error::InvalidId(s.to_string()))?;
        let bytes: EntityId = bytes
            .try_into()
            .map_err(|_| Error::InvalidId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_hex())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
