//! End-to-end tests: configuration -> adapter -> mapper -> backend.
//!
//! Verifies:
//! - Inserted entities get backend-assigned ids and read back intact
//! - The document sent on insert never carries an empty id
//! - Mappers sharing one client see each other's writes
//! - Expired deadlines stop calls before the store is changed

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use bson::oid::ObjectId;
    use bson::{Bson, Document, doc};
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    use mongomap_core::{Entity, MapperError, MapperResult, Query};

    use crate::client::{
        Adapter, CallContext, CollectionHandle, DatabaseClient, DeleteOptions, DocumentCursor,
        InMemoryClient, WriteOptions, WriteResult,
    };
    use crate::config::MongoConfig;
    use crate::hydrator::{DateTimeStrategy, DocumentHydrator};
    use crate::mapper::{CollectionMapper, FindOptions, Found, RemoveOptions, UpdateOptions};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Person {
        #[serde(rename = "_id")]
        id: String,
        name: String,
    }

    impl Entity for Person {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Visit {
        #[serde(rename = "_id")]
        id: String,
        person: String,
        at: DateTime<Utc>,
    }

    impl Default for Visit {
        fn default() -> Self {
            Self {
                id: String::new(),
                person: String::new(),
                at: DateTime::<Utc>::UNIX_EPOCH,
            }
        }
    }

    impl Entity for Visit {
        fn id(&self) -> &str {
            &self.id
        }
    }

    /// Client whose collection handles record every inserted document.
    #[derive(Default)]
    struct RecordingClient {
        inner: InMemoryClient,
        sent: Arc<Mutex<Vec<Document>>>,
    }

    struct RecordingCollection {
        inner: Arc<dyn CollectionHandle>,
        sent: Arc<Mutex<Vec<Document>>>,
    }

    impl DatabaseClient for RecordingClient {
        fn collection(
            &self,
            database: &str,
            collection: &str,
        ) -> MapperResult<Arc<dyn CollectionHandle>> {
            Ok(Arc::new(RecordingCollection {
                inner: self.inner.collection(database, collection)?,
                sent: self.sent.clone(),
            }))
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }
    }

    impl CollectionHandle for RecordingCollection {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn find(
            &self,
            filter: &Document,
            projection: Option<&Document>,
            context: &CallContext,
        ) -> MapperResult<Option<Box<dyn DocumentCursor>>> {
            self.inner.find(filter, projection, context)
        }

        fn find_one(
            &self,
            filter: &Document,
            projection: Option<&Document>,
            context: &CallContext,
        ) -> MapperResult<Option<Document>> {
            self.inner.find_one(filter, projection, context)
        }

        fn insert(&self, document: &Document, options: &WriteOptions) -> MapperResult<WriteResult> {
            self.sent.lock().unwrap().push(document.clone());
            self.inner.insert(document, options)
        }

        fn update(
            &self,
            filter: &Document,
            document: &Document,
            options: &WriteOptions,
        ) -> MapperResult<WriteResult> {
            self.inner.update(filter, document, options)
        }

        fn remove(&self, filter: &Document, options: &DeleteOptions) -> MapperResult<WriteResult> {
            self.inner.remove(filter, options)
        }
    }

    fn memory_client() -> Arc<dyn DatabaseClient> {
        mongomap_observability::init_for_tests();
        let config = MongoConfig::new("crm").with_driver("memory");
        Adapter::from_config(&config).unwrap()
    }

    fn people(client: Arc<dyn DatabaseClient>) -> CollectionMapper<Person> {
        CollectionMapper::new(client, "crm", "people").with_entity_prototype(Person::default())
    }

    #[test]
    fn insert_then_find_by_generated_id() {
        mongomap_observability::init_for_tests();
        let client = Arc::new(RecordingClient::default());
        let mapper = people(client.clone());

        let ada = Person {
            id: String::new(),
            name: "Ada".to_string(),
        };
        let returned = mapper.insert(&ada, &WriteOptions::default()).unwrap();

        let sent = client.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![doc! { "name": "Ada" }]);

        let generated = returned.get_object_id("_id").unwrap();
        assert_eq!(returned.get_str("name").unwrap(), "Ada");

        let found = mapper
            .find_one(&Query::new(doc! { "_id": generated }), &CallContext::none())
            .unwrap()
            .unwrap();
        assert_eq!(
            found,
            Person {
                id: generated.to_hex(),
                name: "Ada".to_string(),
            }
        );

        assert!(mapper.mongo_id("").is_none());
        assert_eq!(
            mapper.mongo_id("507f1f77bcf86cd799439011").map(Bson::from),
            Some(Bson::ObjectId(
                ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap()
            ))
        );
    }

    #[test]
    fn full_lifecycle_through_the_adapter() {
        let mapper = people(memory_client());
        let none = CallContext::none();

        for name in ["Grace", "Alan", "Barbara"] {
            let person = Person {
                id: String::new(),
                name: name.to_string(),
            };
            mapper.insert(&person, &WriteOptions::default()).unwrap();
        }

        let mut everyone: Vec<Person> = mapper
            .find_all(&Query::all().sort(doc! { "name": 1 }), &none)
            .unwrap()
            .unwrap()
            .collect::<MapperResult<_>>()
            .unwrap();
        let names: Vec<&str> = everyone.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Alan", "Barbara", "Grace"]);

        let mut alan = everyone.remove(0);
        alan.name = "Alan Turing".to_string();
        let result = mapper.update(&alan, UpdateOptions::new()).unwrap();
        assert!(result.affected());

        let reloaded = mapper
            .find(&Query::new(doc! { "name": "Alan Turing" }), FindOptions::one())
            .unwrap();
        assert!(matches!(&reloaded, Found::One(p) if p.id == alan.id));

        let removed = mapper.delete(&alan, RemoveOptions::default()).unwrap();
        assert_eq!(removed.deleted_count, 1);
        assert!(
            mapper
                .find_one(&Query::new(doc! { "name": "Alan Turing" }), &none)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn mappers_sharing_a_client_share_data() {
        let client = memory_client();
        let writer = people(client.clone());
        let reader = people(client);

        let sent = writer
            .insert(
                &Person {
                    id: String::new(),
                    name: "Edsger".to_string(),
                },
                &WriteOptions::default(),
            )
            .unwrap();

        let found = reader
            .find_one(&Query::new(doc! { "name": "Edsger" }), &CallContext::none())
            .unwrap()
            .unwrap();
        assert_eq!(found.id, sent.get_object_id("_id").unwrap().to_hex());
    }

    #[test]
    fn custom_hydrator_stores_native_dates() {
        let client = memory_client();
        let mapper: CollectionMapper<Visit> = CollectionMapper::new(client.clone(), "crm", "visits")
            .with_entity_prototype(Visit::default())
            .with_hydrator(DocumentHydrator::<Visit>::new().with_strategy("at", DateTimeStrategy));

        let visit = Visit {
            id: String::new(),
            person: "Ada".to_string(),
            at: Utc.with_ymd_and_hms(2024, 5, 17, 9, 15, 0).unwrap(),
        };
        let sent = mapper.insert(&visit, &WriteOptions::default()).unwrap();
        assert!(matches!(sent.get("at"), Some(Bson::DateTime(_))));

        let raw = client
            .collection("crm", "visits")
            .unwrap()
            .find_one(&doc! {}, None, &CallContext::none())
            .unwrap()
            .unwrap();
        assert!(matches!(raw.get("at"), Some(Bson::DateTime(_))));

        let found = mapper
            .find_one(&Query::all(), &CallContext::none())
            .unwrap()
            .unwrap();
        assert_eq!(found.at, visit.at);
        assert_eq!(found.person, "Ada");
    }

    #[test]
    fn expired_deadline_leaves_the_store_untouched() {
        let client = Arc::new(RecordingClient::default());
        let mapper = people(client.clone());

        let expired = CallContext::none().with_deadline(Instant::now() - Duration::from_millis(1));
        let err = mapper
            .insert(
                &Person {
                    id: String::new(),
                    name: "Late".to_string(),
                },
                &WriteOptions::default().with_context(expired.clone()),
            )
            .unwrap_err();

        assert_eq!(err, MapperError::DeadlineExceeded);
        // The handle saw the call; the store rejected it before writing.
        assert_eq!(client.sent.lock().unwrap().len(), 1);
        assert_eq!(client.inner.count("crm", "people"), 0);
        assert!(matches!(
            mapper.find_all(&Query::all(), &expired),
            Err(MapperError::DeadlineExceeded)
        ));
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let config = MongoConfig::new("crm").with_driver("couchdb");
        assert!(matches!(
            Adapter::from_config(&config),
            Err(MapperError::Configuration(_))
        ));
    }
}
