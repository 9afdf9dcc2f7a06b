//! Per-field conversion strategies.
//!
//! A strategy converts one field between the value the entity serialises to
//! and the value stored in the document. Both directions must be idempotent:
//! the hydrator applies them uniformly, whatever representation a value is
//! currently in.

use bson::Bson;
use bson::oid::ObjectId;
use chrono::{DateTime, SecondsFormat, Utc};

/// Bidirectional conversion for one document field.
pub trait Strategy: Send + Sync + core::fmt::Debug {
    /// Entity value -> stored value (write path).
    fn extract(&self, value: Bson) -> Bson;

    /// Stored value -> entity value (read path).
    fn hydrate(&self, value: Bson) -> Bson;
}

/// Identifier strategy: hex string in entities, native ObjectId in storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectIdStrategy;

impl ObjectIdStrategy {
    /// String form -> native id.
    ///
    /// A valid hex id becomes `Bson::ObjectId`. An empty string becomes
    /// `Bson::Null`, the failure marker that makes inserts omit the field.
    /// Other strings and non-string values pass through unchanged.
    pub fn to_storage(&self, value: Bson) -> Bson {
        match value {
            Bson::String(s) if s.is_empty() => Bson::Null,
            Bson::String(s) => match ObjectId::parse_str(&s) {
                Ok(oid) => Bson::ObjectId(oid),
                Err(_) => Bson::String(s),
            },
            other => other,
        }
    }

    /// Native id -> string form; anything else passes through.
    pub fn to_application(&self, value: Bson) -> Bson {
        match value {
            Bson::ObjectId(oid) => Bson::String(oid.to_hex()),
            other => other,
        }
    }
}

impl Strategy for ObjectIdStrategy {
    fn extract(&self, value: Bson) -> Bson {
        self.to_storage(value)
    }

    fn hydrate(&self, value: Bson) -> Bson {
        self.to_application(value)
    }
}

/// Timestamp strategy: RFC 3339 strings in entities, native datetimes in storage.
///
/// Storage precision is milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateTimeStrategy;

impl Strategy for DateTimeStrategy {
    fn extract(&self, value: Bson) -> Bson {
        match value {
            Bson::String(s) => match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => Bson::DateTime(bson::DateTime::from_chrono(dt.with_timezone(&Utc))),
                Err(_) => Bson::String(s),
            },
            other => other,
        }
    }

    fn hydrate(&self, value: Bson) -> Bson {
        match value {
            Bson::DateTime(dt) => {
                Bson::String(dt.to_chrono().to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            other => other,
        }
    }
}
