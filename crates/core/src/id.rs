//! Document identifiers.
//!
//! Storage-native ids are 12-byte BSON ObjectIds; application code carries them
//! as their 24-character lowercase hex form.

use core::str::FromStr;

use bson::Bson;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::MapperError;

/// Identifier of a stored document (native form).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(ObjectId);

impl DocumentId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// Parse the string form.
    ///
    /// Returns `None` for an empty or malformed string; never panics.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        ObjectId::parse_str(s).ok().map(Self)
    }

    pub fn from_object_id(oid: ObjectId) -> Self {
        Self(oid)
    }

    pub fn as_object_id(&self) -> &ObjectId {
        &self.0
    }

    /// The portable string form used by entities.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl core::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl From<ObjectId> for DocumentId {
    fn from(value: ObjectId) -> Self {
        Self(value)
    }
}

impl From<DocumentId> for ObjectId {
    fn from(value: DocumentId) -> Self {
        value.0
    }
}

impl From<DocumentId> for Bson {
    fn from(value: DocumentId) -> Self {
        Bson::ObjectId(value.0)
    }
}

impl FromStr for DocumentId {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| MapperError::invalid_id(format!("DocumentId: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_string_is_not_an_id() {
        assert_eq!(DocumentId::parse(""), None);
        assert!(matches!(
            "".parse::<DocumentId>(),
            Err(MapperError::InvalidId(_))
        ));
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert_eq!(DocumentId::parse("not-an-id"), None);
        assert_eq!(DocumentId::parse("507f1f77bcf86cd79943901"), None);
        assert_eq!(DocumentId::parse("507f1f77bcf86cd79943901z"), None);
    }

    #[test]
    fn generated_ids_are_distinct() {
        let first = DocumentId::new();
        let second = DocumentId::new();
        assert_ne!(first, second);
        assert_eq!(DocumentId::parse(&first.to_hex()), Some(first));
    }

    #[test]
    fn known_literal_round_trips() {
        let id = DocumentId::parse("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
        assert_eq!(Bson::from(id), Bson::ObjectId(*id.as_object_id()));
    }

    proptest! {
        #[test]
        fn hex_form_is_lossless(bytes in any::<[u8; 12]>()) {
            let id = DocumentId::from_object_id(ObjectId::from_bytes(bytes));
            let parsed = DocumentId::parse(&id.to_hex()).unwrap();
            prop_assert_eq!(parsed, id);
            prop_assert_eq!(parsed.as_object_id().bytes(), bytes);
        }
    }
}
