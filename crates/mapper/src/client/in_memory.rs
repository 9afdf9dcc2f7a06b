use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bson::oid::ObjectId;
use bson::{Bson, Document};
use tracing::{debug, instrument};

use mongomap_core::{ID_FIELD, MapperError, MapperResult};

use super::context::CallContext;
use super::r#trait::{
    CollectionHandle, DatabaseClient, DeleteOptions, DocumentCursor, WriteOptions, WriteResult,
};
use crate::config::MongoConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Namespace {
    database: String,
    collection: String,
}

type Collections = RwLock<HashMap<Namespace, Vec<Document>>>;

/// In-memory document store.
///
/// Intended for tests/dev. Supports top-level equality filters, inclusive or
/// exclusive projections, multi-key sorts, and full-document replacement.
/// Handles resolved from the same client share data.
#[derive(Debug, Default)]
pub struct InMemoryClient {
    collections: Arc<Collections>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration the way a network client would, then start empty.
    pub fn connect(config: &MongoConfig) -> MapperResult<Self> {
        config.validate()?;
        debug!(database = %config.database, "in-memory client ready");
        Ok(Self::new())
    }

    /// Number of stored documents in a collection (for tests and diagnostics).
    pub fn count(&self, database: &str, collection: &str) -> usize {
        let key = Namespace {
            database: database.to_string(),
            collection: collection.to_string(),
        };
        self.collections
            .read()
            .map(|c| c.get(&key).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

impl DatabaseClient for InMemoryClient {
    fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> MapperResult<Arc<dyn CollectionHandle>> {
        Ok(Arc::new(InMemoryCollection {
            collections: self.collections.clone(),
            namespace: Namespace {
                database: database.to_string(),
                collection: collection.to_string(),
            },
        }))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Handle to one in-memory collection.
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    collections: Arc<Collections>,
    namespace: Namespace,
}

fn poisoned() -> MapperError {
    MapperError::backend("lock poisoned")
}

impl InMemoryCollection {
    fn read<T>(&self, f: impl FnOnce(&[Document]) -> T) -> MapperResult<T> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let docs = collections
            .get(&self.namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok(f(docs))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Vec<Document>) -> MapperResult<T>) -> MapperResult<T> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let docs = collections.entry(self.namespace.clone()).or_default();
        f(docs)
    }
}

impl CollectionHandle for InMemoryCollection {
    fn name(&self) -> &str {
        &self.namespace.collection
    }

    #[instrument(skip_all, fields(collection = %self.namespace.collection), err)]
    fn find(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Box<dyn DocumentCursor>>> {
        context.check()?;
        let pending: Vec<Document> = self.read(|docs| {
            docs.iter()
                .filter(|d| matches_filter(d, filter))
                .cloned()
                .collect()
        })?;
        debug!(matched = pending.len(), "cursor opened");

        Ok(Some(Box::new(InMemoryCursor {
            pending,
            projection: projection.cloned(),
            sort: None,
            iter: None,
        })))
    }

    #[instrument(skip_all, fields(collection = %self.namespace.collection), err)]
    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Document>> {
        context.check()?;
        self.read(|docs| {
            docs.iter()
                .find(|d| matches_filter(d, filter))
                .map(|d| apply_projection(d, projection))
        })
    }

    #[instrument(skip_all, fields(collection = %self.namespace.collection), err)]
    fn insert(&self, document: &Document, options: &WriteOptions) -> MapperResult<WriteResult> {
        options.context.check()?;
        self.write(|docs| {
            let stored = with_id(document.clone(), None);
            let id = stored.get(ID_FIELD).cloned().unwrap_or(Bson::Null);

            ensure_unique_id(docs, &id)?;
            docs.push(stored);
            Ok(WriteResult::inserted(id))
        })
    }

    #[instrument(skip_all, fields(collection = %self.namespace.collection, upsert = options.upsert), err)]
    fn update(
        &self,
        filter: &Document,
        document: &Document,
        options: &WriteOptions,
    ) -> MapperResult<WriteResult> {
        options.context.check()?;
        self.write(|docs| {
            let position = docs.iter().position(|d| matches_filter(d, filter));
            let Some(position) = position else {
                if !options.upsert {
                    return Ok(WriteResult::updated(0, 0, None));
                }
                let seeded_id = filter.get(ID_FIELD).filter(|v| !is_operator_doc(v)).cloned();
                if let (Some(new_id), Some(seed)) = (document.get(ID_FIELD), seeded_id.as_ref()) {
                    if !values_equal(new_id, seed) {
                        return Err(MapperError::backend(format!(
                            "{ID_FIELD} in the replacement ({new_id}) differs from the filter ({seed})"
                        )));
                    }
                }
                let stored = with_id(document.clone(), seeded_id);
                let id = stored.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
                ensure_unique_id(docs, &id)?;
                docs.push(stored);
                return Ok(WriteResult::updated(0, 0, Some(id)));
            };

            let existing = &mut docs[position];
            let current_id = existing.get(ID_FIELD).cloned();
            if let (Some(new_id), Some(old_id)) = (document.get(ID_FIELD), current_id.as_ref()) {
                if !values_equal(new_id, old_id) {
                    return Err(MapperError::backend(format!(
                        "{ID_FIELD} is immutable (stored {old_id}, replacement {new_id})"
                    )));
                }
            }

            let replacement = with_id(document.clone(), current_id);
            let modified = u64::from(*existing != replacement);
            *existing = replacement;
            Ok(WriteResult::updated(1, modified, None))
        })
    }

    #[instrument(skip_all, fields(collection = %self.namespace.collection, just_one = options.just_one), err)]
    fn remove(&self, filter: &Document, options: &DeleteOptions) -> MapperResult<WriteResult> {
        options.context.check()?;
        self.write(|docs| {
            let before = docs.len();
            if options.just_one {
                if let Some(pos) = docs.iter().position(|d| matches_filter(d, filter)) {
                    docs.remove(pos);
                }
            } else {
                docs.retain(|d| !matches_filter(d, filter));
            }
            Ok(WriteResult::deleted((before - docs.len()) as u64))
        })
    }
}

/// Lazy cursor over a snapshot taken when the query ran.
struct InMemoryCursor {
    pending: Vec<Document>,
    projection: Option<Document>,
    sort: Option<Document>,
    iter: Option<std::vec::IntoIter<Document>>,
}

impl Iterator for InMemoryCursor {
    type Item = MapperResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let iter = self.iter.get_or_insert_with(|| {
            let mut docs = std::mem::take(&mut self.pending);
            if let Some(spec) = &self.sort {
                docs.sort_by(|a, b| compare_by_spec(a, b, spec));
            }
            docs.into_iter()
        });

        // Projection is applied after sorting so excluded fields can still be sort keys.
        iter.next()
            .map(|doc| Ok(apply_projection(&doc, self.projection.as_ref())))
    }
}

impl DocumentCursor for InMemoryCursor {
    fn sort(&mut self, spec: &Document) -> MapperResult<()> {
        if self.iter.is_some() {
            return Err(MapperError::backend("cannot sort a cursor after iteration has started"));
        }
        self.sort = Some(spec.clone());
        Ok(())
    }
}

/// Put `_id` first, taking it from the document, then `seed`, then a fresh ObjectId.
fn with_id(mut document: Document, seed: Option<Bson>) -> Document {
    let id = document
        .remove(ID_FIELD)
        .filter(|v| !matches!(v, Bson::Null))
        .or(seed)
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut stored = Document::new();
    stored.insert(ID_FIELD, id);
    for (key, value) in document {
        stored.insert(key, value);
    }
    stored
}

fn ensure_unique_id(docs: &[Document], id: &Bson) -> MapperResult<()> {
    let taken = docs
        .iter()
        .any(|d| d.get(ID_FIELD).is_some_and(|existing| values_equal(existing, id)));
    if taken {
        return Err(MapperError::backend(format!("duplicate key: {ID_FIELD} {id}")));
    }
    Ok(())
}

fn is_operator_doc(value: &Bson) -> bool {
    matches!(value, Bson::Document(d) if d.keys().any(|k| k.starts_with('$')))
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        // `{field: null}` also matches documents that lack the field.
        let actual = document.get(key).unwrap_or(&Bson::Null);
        values_equal(actual, expected)
    })
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        other => as_number(other).is_none_or(|n| n != 0.0),
    }
}

fn apply_projection(document: &Document, projection: Option<&Document>) -> Document {
    let Some(projection) = projection.filter(|p| !p.is_empty()) else {
        return document.clone();
    };

    let include_id = projection.get(ID_FIELD).is_none_or(truthy);
    let inclusive = projection
        .iter()
        .any(|(k, v)| k != ID_FIELD && truthy(v));

    document
        .iter()
        .filter(|(key, _)| {
            if key.as_str() == ID_FIELD {
                include_id
            } else if inclusive {
                projection.get(key.as_str()).is_some_and(truthy)
            } else {
                projection.get(key.as_str()).is_none_or(truthy)
            }
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn compare_by_spec(a: &Document, b: &Document, spec: &Document) -> Ordering {
    for (key, direction) in spec {
        let ord = compare_values(
            a.get(key).unwrap_or(&Bson::Null),
            b.get(key).unwrap_or(&Bson::Null),
        );
        let descending = as_number(direction).is_some_and(|d| d < 0.0);
        let ord = if descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Cross-type ordering in the spirit of the BSON comparison order.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 1,
        Bson::String(_) | Bson::Symbol(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Boolean(_) => 7,
        Bson::DateTime(_) => 8,
        Bson::Timestamp(_) => 9,
        _ => 10,
    }
}

fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => (x.time, x.increment).cmp(&(y.time, y.increment)),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}
