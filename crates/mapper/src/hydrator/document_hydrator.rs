use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::{Bson, Document};
use serde::Serialize;
use serde::de::DeserializeOwned;

use mongomap_core::{ID_FIELD, MapperResult};

use super::{Hydrator, strip_empty_id};
use super::strategy::{ObjectIdStrategy, Strategy};

/// Serde-backed hydrator with per-field strategies.
///
/// Hydration starts from the prototype's serialised values and overlays every
/// document field on top, so missing fields keep the prototype value and
/// fields the prototype skips (`skip_serializing_if`) are still filled in.
/// Fields the entity does not declare are dropped by serde during
/// deserialisation.
pub struct DocumentHydrator<E> {
    strategies: HashMap<String, Arc<dyn Strategy>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> DocumentHydrator<E> {
    /// Hydrator with the identifier strategy registered on `_id`.
    pub fn new() -> Self {
        Self::without_strategies().with_strategy(ID_FIELD, ObjectIdStrategy)
    }

    /// Hydrator that copies every value verbatim.
    pub fn without_strategies() -> Self {
        Self {
            strategies: HashMap::new(),
            _entity: PhantomData,
        }
    }

    pub fn with_strategy(mut self, field: impl Into<String>, strategy: impl Strategy + 'static) -> Self {
        self.add_strategy(field, strategy);
        self
    }

    pub fn add_strategy(&mut self, field: impl Into<String>, strategy: impl Strategy + 'static) {
        self.strategies.insert(field.into(), Arc::new(strategy));
    }

    pub fn remove_strategy(&mut self, field: &str) -> bool {
        self.strategies.remove(field).is_some()
    }

    pub fn has_strategy(&self, field: &str) -> bool {
        self.strategies.contains_key(field)
    }
}

impl<E> Default for DocumentHydrator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for DocumentHydrator<E> {
    fn clone(&self) -> Self {
        Self {
            strategies: self.strategies.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> core::fmt::Debug for DocumentHydrator<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut fields: Vec<_> = self.strategies.keys().collect();
        fields.sort();
        f.debug_struct("DocumentHydrator")
            .field("strategies", &fields)
            .finish()
    }
}

impl<E> Hydrator<E> for DocumentHydrator<E>
where
    E: Serialize + DeserializeOwned,
{
    fn extract(&self, entity: &E) -> MapperResult<Document> {
        let mut document = bson::to_document(entity)?;

        for (field, strategy) in &self.strategies {
            if let Some(value) = document.get_mut(field) {
                let raw = std::mem::replace(value, Bson::Null);
                *value = strategy.extract(raw);
            }
        }

        strip_empty_id(&mut document);
        Ok(document)
    }

    fn hydrate(&self, document: Document, prototype: &E) -> MapperResult<E> {
        let mut fields = bson::to_document(prototype)?;

        for (key, value) in document {
            let value = match self.strategies.get(&key) {
                Some(strategy) => strategy.hydrate(value),
                None => value,
            };
            fields.insert(key, value);
        }

        Ok(bson::from_document(fields)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;
    use chrono::{DateTime, TimeZone, Utc};
    use mongomap_core::MapperError;
    use proptest::prelude::*;
    use serde::Deserialize;

    use crate::hydrator::DateTimeStrategy;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct User {
        #[serde(rename = "_id")]
        id: String,
        name: String,
        age: i32,
        tags: Vec<String>,
        active: bool,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Profile {
        #[serde(rename = "_id")]
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Event {
        #[serde(rename = "_id")]
        id: String,
        at: DateTime<Utc>,
    }

    fn prototype() -> User {
        User {
            age: 18,
            ..User::default()
        }
    }

    #[test]
    fn extract_converts_id_to_native() {
        let hydrator = DocumentHydrator::<User>::new();
        let user = User {
            id: "507f1f77bcf86cd799439011".to_string(),
            name: "Ada".to_string(),
            ..prototype()
        };

        let doc = hydrator.extract(&user).unwrap();
        assert_eq!(
            doc.get("_id"),
            Some(&Bson::ObjectId(ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap()))
        );
        assert_eq!(doc.get_str("name").unwrap(), "Ada");
    }

    #[test]
    fn extract_omits_empty_id() {
        let hydrator = DocumentHydrator::<User>::new();
        let user = User {
            name: "Ada".to_string(),
            ..prototype()
        };

        let doc = hydrator.extract(&user).unwrap();
        assert!(!doc.contains_key("_id"));
        assert_eq!(doc.get_str("name").unwrap(), "Ada");
    }

    #[test]
    fn hydrate_ignores_unknown_and_keeps_defaults_for_missing() {
        let hydrator = DocumentHydrator::<User>::new();
        let oid = ObjectId::new();
        let proto = prototype();

        let user = hydrator
            .hydrate(doc! { "_id": oid, "name": "Grace", "nickname": "Amazing" }, &proto)
            .unwrap();

        assert_eq!(user.id, oid.to_hex());
        assert_eq!(user.name, "Grace");
        assert_eq!(user.age, 18);
        assert!(user.tags.is_empty());
        assert_eq!(proto, prototype());
    }

    #[test]
    fn fields_skipped_by_the_prototype_are_still_hydrated() {
        let hydrator = DocumentHydrator::<Profile>::new();
        let oid = ObjectId::new();

        let profile = hydrator
            .hydrate(
                doc! { "_id": oid, "name": "Ada", "nickname": "Countess", "extra": 1 },
                &Profile::default(),
            )
            .unwrap();

        assert_eq!(profile.id, oid.to_hex());
        assert_eq!(profile.nickname.as_deref(), Some("Countess"));

        let stored = Profile {
            id: oid.to_hex(),
            name: "Ada".to_string(),
            nickname: Some("Countess".to_string()),
        };
        let doc = hydrator.extract(&stored).unwrap();
        assert_eq!(hydrator.hydrate(doc, &Profile::default()).unwrap(), stored);
    }

    #[test]
    fn wrong_value_type_is_a_hydration_error() {
        let hydrator = DocumentHydrator::<User>::new();
        let err = hydrator
            .hydrate(doc! { "age": "old" }, &prototype())
            .unwrap_err();
        assert!(matches!(err, MapperError::Hydration(_)));
    }

    #[test]
    fn strategies_can_be_swapped() {
        let mut hydrator = DocumentHydrator::<User>::new();
        assert!(hydrator.has_strategy("_id"));
        assert!(hydrator.remove_strategy("_id"));
        assert!(!hydrator.has_strategy("_id"));

        let user = User {
            id: "507f1f77bcf86cd799439011".to_string(),
            ..prototype()
        };
        let doc = hydrator.extract(&user).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn datetime_fields_are_stored_natively() {
        let hydrator = DocumentHydrator::<Event>::new().with_strategy("at", DateTimeStrategy);
        let event = Event {
            id: ObjectId::new().to_hex(),
            at: Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap(),
        };

        let doc = hydrator.extract(&event).unwrap();
        assert!(matches!(doc.get("at"), Some(Bson::DateTime(_))));

        let proto = Event {
            id: String::new(),
            at: DateTime::<Utc>::UNIX_EPOCH,
        };
        assert_eq!(hydrator.hydrate(doc, &proto).unwrap(), event);
    }

    proptest! {
        #[test]
        fn extract_then_hydrate_restores_the_entity(
            bytes in any::<[u8; 12]>(),
            name in ".*",
            age in any::<i32>(),
            tags in proptest::collection::vec("[a-z]{1,8}", 0..4),
            active in any::<bool>(),
        ) {
            let hydrator = DocumentHydrator::<User>::new();
            let user = User {
                id: ObjectId::from_bytes(bytes).to_hex(),
                name,
                age,
                tags,
                active,
            };

            let doc = hydrator.extract(&user).unwrap();
            let back = hydrator.hydrate(doc, &User::default()).unwrap();
            prop_assert_eq!(back, user);
        }
    }
}
