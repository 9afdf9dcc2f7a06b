use std::sync::Arc;

use bson::{Bson, Document};

use mongomap_core::MapperResult;

use super::context::CallContext;

/// Options for insert and update calls.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Insert the document when an update matches nothing.
    pub upsert: bool,
    pub context: CallContext,
}

impl WriteOptions {
    pub fn upsert() -> Self {
        Self {
            upsert: true,
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// Options for remove calls.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Remove at most one matching document.
    pub just_one: bool,
    pub context: CallContext,
}

/// Raw outcome of a backend write, passed through to the caller untranslated.
///
/// `acknowledged == false` or a zero `matched_count` is how a backend reports
/// a write it did not apply; the mapper does not turn these into errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    pub acknowledged: bool,
    pub inserted_id: Option<Bson>,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_id: Option<Bson>,
}

impl WriteResult {
    pub fn inserted(id: Bson) -> Self {
        Self {
            acknowledged: true,
            inserted_id: Some(id),
            ..Self::default()
        }
    }

    pub fn updated(matched: u64, modified: u64, upserted_id: Option<Bson>) -> Self {
        Self {
            acknowledged: true,
            matched_count: matched,
            modified_count: modified,
            upserted_id,
            ..Self::default()
        }
    }

    pub fn deleted(count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count: count,
            ..Self::default()
        }
    }

    /// Whether the write touched (or created) at least one document.
    pub fn affected(&self) -> bool {
        self.inserted_id.is_some()
            || self.upserted_id.is_some()
            || self.matched_count > 0
            || self.deleted_count > 0
    }
}

/// Forward-only cursor over raw documents.
///
/// Cursors are lazy: nothing is fetched before the first advance, which is
/// also the last point at which [`DocumentCursor::sort`] may be called.
pub trait DocumentCursor: Iterator<Item = MapperResult<Document>> + Send {
    /// Order the remaining results. Fails once iteration has started.
    fn sort(&mut self, spec: &Document) -> MapperResult<()>;
}

/// Resolved reference to one collection in one database.
///
/// A read that matches nothing is `Ok(None)` (single) or an empty cursor
/// (multi); implementations may return `Ok(None)` from `find` when the
/// backend produced no cursor at all.
pub trait CollectionHandle: Send + Sync {
    /// Collection name (for tracing and diagnostics).
    fn name(&self) -> &str;

    fn find(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Box<dyn DocumentCursor>>>;

    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Document>>;

    /// Insert one document. When the document has no `_id` the backend
    /// assigns one and reports it in `WriteResult::inserted_id`.
    fn insert(&self, document: &Document, options: &WriteOptions) -> MapperResult<WriteResult>;

    /// Replace the first document matching `filter` with `document`.
    fn update(
        &self,
        filter: &Document,
        document: &Document,
        options: &WriteOptions,
    ) -> MapperResult<WriteResult>;

    fn remove(&self, filter: &Document, options: &DeleteOptions) -> MapperResult<WriteResult>;
}

/// Connection lifecycle + collection resolution.
pub trait DatabaseClient: Send + Sync {
    /// Resolve a handle to `collection` inside `database`.
    fn collection(&self, database: &str, collection: &str)
    -> MapperResult<Arc<dyn CollectionHandle>>;

    fn is_connected(&self) -> bool;
}

impl<S> CollectionHandle for Arc<S>
where
    S: CollectionHandle + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn find(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Box<dyn DocumentCursor>>> {
        (**self).find(filter, projection, context)
    }

    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Document>> {
        (**self).find_one(filter, projection, context)
    }

    fn insert(&self, document: &Document, options: &WriteOptions) -> MapperResult<WriteResult> {
        (**self).insert(document, options)
    }

    fn update(
        &self,
        filter: &Document,
        document: &Document,
        options: &WriteOptions,
    ) -> MapperResult<WriteResult> {
        (**self).update(filter, document, options)
    }

    fn remove(&self, filter: &Document, options: &DeleteOptions) -> MapperResult<WriteResult> {
        (**self).remove(filter, options)
    }
}

impl<S> DatabaseClient for Arc<S>
where
    S: DatabaseClient + ?Sized,
{
    fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> MapperResult<Arc<dyn CollectionHandle>> {
        (**self).collection(database, collection)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
