use std::{
    fmt,
    str::FromStr,
    sync::{
        LazyLock,
        atomic::{AtomicU32, Ordering},
    },
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid identifier format: {0:?}")]
    InvalidFormat(String),
}

/// 12-byte store identifier. Its text form is always 24 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(rand::random);
static COUNTER: LazyLock<AtomicU32> = LazyLock::new(|| AtomicU32::new(rand::random::<u32>()));

impl ObjectId {
    /// Mints a fresh id: 4-byte timestamp, 5-byte per-process value, 3-byte counter.
    ///
    /// Only persistence implementations call this; request handlers never mint
    /// store ids themselves.
    pub fn new() -> Self {
        let secs = chrono::Utc::now().timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let canonical = raw.len() == 24
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !canonical {
            return Err(IdError::InvalidFormat(raw.to_string()));
        }

        let mut bytes = [0u8; 12];
        hex::decode_to_slice(raw, &mut bytes)
            .map_err(|_| IdError::InvalidFormat(raw.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ObjectId::parse(&raw).map_err(de::Error::custom)
    }
}

/// Order identifier. Random 128-bit so clients can mint one offline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Accepts any canonical UUID text form: hyphenated, simple, braced or urn.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| IdError::InvalidFormat(raw.to_string()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for OrderId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for OrderId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_round_trips_through_text() {
        for _ in 0..64 {
            let id = ObjectId::new();
            let text = id.to_string();
            assert_eq!(text.len(), 24);
            assert_eq!(ObjectId::parse(&text), Ok(id));
        }
    }

    #[test]
    fn object_id_rejects_non_canonical_text() {
        let zz = "zz".repeat(12);
        for raw in ["abc", "", zz.as_str(), "507F1F77BCF86CD799439011", " 507f1f77bcf86cd799439011"] {
            assert!(ObjectId::parse(raw).is_err(), "{raw:?} should be rejected");
        }
        assert!(ObjectId::parse("507f1f77bcf86cd799439011").is_ok());
    }

    #[test]
    fn minted_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn object_id_serializes_as_string() {
        let id = ObjectId::parse("507f1f77bcf86cd799439011").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"507f1f77bcf86cd799439011\"");
        assert!(serde_json::from_str::<ObjectId>("\"nope\"").is_err());
    }

    #[test]
    fn order_id_parse_is_tolerant_of_uuid_forms() {
        let id = OrderId::new_random();
        let uuid = id.as_uuid();
        assert_eq!(OrderId::parse(&id.to_string()), Ok(id));
        assert_eq!(OrderId::parse(&uuid.simple().to_string()), Ok(id));
        assert_eq!(OrderId::parse(&uuid.braced().to_string()), Ok(id));
        assert!(OrderId::parse("000000000000000000000000").is_err());
    }
}
