//! Collection mapper: CRUD over one collection, in entity terms.
//!
//! A mapper owns an entity prototype, a hydrator and a lazily resolved
//! collection handle. Reads hydrate documents into clones of the prototype;
//! writes extract the entity into a document first.
//!
//! ## Lifecycle
//!
//! Every operation first checks that the mapper is initialised (a prototype is
//! set). The collection handle is resolved on first use and cached until
//! [`CollectionMapper::reset_collection`].
//!
//! ## Thread Safety
//!
//! The cached handle lives in a `OnceCell`, so a mapper is `Send` but not
//! `Sync`. Create one mapper per worker; they share the client.

use std::cell::OnceCell;
use std::sync::Arc;

use bson::{Bson, Document};
use tracing::{debug, instrument};

use mongomap_core::{DocumentId, Entity, ID_FIELD, MapperError, MapperResult, Query};

use crate::client::{
    CallContext, CollectionHandle, DatabaseClient, DeleteOptions, WriteOptions, WriteResult,
};
use crate::hydrator::{DocumentHydrator, Hydrator, ObjectIdStrategy, strip_empty_id};
use crate::result_set::ResultSet;

/// Options for [`CollectionMapper::find`].
pub struct FindOptions<E> {
    /// Multi-document read (`true`) or single-document read (`false`).
    pub find_all: bool,
    /// Overrides the mapper's prototype for this call.
    pub prototype: Option<E>,
    /// Overrides the mapper's hydrator for this call.
    pub hydrator: Option<Arc<dyn Hydrator<E>>>,
    pub context: CallContext,
}

impl<E> FindOptions<E> {
    pub fn all() -> Self {
        Self {
            find_all: true,
            prototype: None,
            hydrator: None,
            context: CallContext::none(),
        }
    }

    pub fn one() -> Self {
        Self {
            find_all: false,
            ..Self::all()
        }
    }

    pub fn with_prototype(mut self, prototype: E) -> Self {
        self.prototype = Some(prototype);
        self
    }

    pub fn with_hydrator(mut self, hydrator: Arc<dyn Hydrator<E>>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

impl<E> Default for FindOptions<E> {
    fn default() -> Self {
        Self::all()
    }
}

/// Outcome of [`CollectionMapper::find`].
pub enum Found<E> {
    Many(ResultSet<E>),
    One(E),
    NotFound,
}

impl<E> Found<E> {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Found::NotFound)
    }

    pub fn into_one(self) -> Option<E> {
        match self {
            Found::One(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn into_many(self) -> Option<ResultSet<E>> {
        match self {
            Found::Many(results) => Some(results),
            _ => None,
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Debug for Found<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Found::Many(results) => f.debug_tuple("Many").field(results).finish(),
            Found::One(entity) => f.debug_tuple("One").field(entity).finish(),
            Found::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Options for [`CollectionMapper::update`].
pub struct UpdateOptions<E> {
    /// Explicit filter; derived from the entity id when unset.
    pub filter: Option<Document>,
    /// Write to another collection of the same database.
    pub collection: Option<String>,
    pub hydrator: Option<Arc<dyn Hydrator<E>>>,
    pub write: WriteOptions,
}

impl<E> UpdateOptions<E> {
    pub fn new() -> Self {
        Self {
            filter: None,
            collection: None,
            hydrator: None,
            write: WriteOptions::default(),
        }
    }

    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_hydrator(mut self, hydrator: Arc<dyn Hydrator<E>>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    pub fn upsert(mut self) -> Self {
        self.write.upsert = true;
        self
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.write.context = context;
        self
    }
}

impl<E> Default for UpdateOptions<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for [`CollectionMapper::remove`].
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    /// Explicit filter; derived from the entity id when unset.
    pub filter: Option<Document>,
    pub just_one: bool,
    pub context: CallContext,
}

impl RemoveOptions {
    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn just_one(mut self) -> Self {
        self.just_one = true;
        self
    }

    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }
}

/// `{_id: <native id>}` for the entity's current identifier.
fn id_filter<E: Entity>(entity: &E) -> MapperResult<Document> {
    if !entity.has_id() {
        return Err(MapperError::MissingIdentifier);
    }
    let id = ObjectIdStrategy.to_storage(Bson::String(entity.id().to_string()));
    let mut filter = Document::new();
    filter.insert(ID_FIELD, id);
    Ok(filter)
}

/// Data mapper for entities of type `E` stored in one collection.
pub struct CollectionMapper<E: Entity> {
    client: Arc<dyn DatabaseClient>,
    database: String,
    collection: String,
    handle: OnceCell<Arc<dyn CollectionHandle>>,
    hydrator: Arc<dyn Hydrator<E>>,
    prototype: Option<E>,
}

impl<E: Entity> CollectionMapper<E> {
    /// Mapper with the default [`DocumentHydrator`] and no prototype yet.
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            client,
            database: database.into(),
            collection: collection.into(),
            handle: OnceCell::new(),
            hydrator: Arc::new(DocumentHydrator::<E>::new()),
            prototype: None,
        }
    }

    pub fn with_entity_prototype(mut self, prototype: E) -> Self {
        self.prototype = Some(prototype);
        self
    }

    pub fn with_hydrator(mut self, hydrator: impl Hydrator<E> + 'static) -> Self {
        self.hydrator = Arc::new(hydrator);
        self
    }

    pub fn set_entity_prototype(&mut self, prototype: E) {
        self.prototype = Some(prototype);
    }

    pub fn entity_prototype(&self) -> Option<&E> {
        self.prototype.as_ref()
    }

    pub fn set_hydrator(&mut self, hydrator: Arc<dyn Hydrator<E>>) {
        self.hydrator = hydrator;
    }

    pub fn hydrator(&self) -> &Arc<dyn Hydrator<E>> {
        &self.hydrator
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Check the mapper is usable and return its prototype.
    pub fn initialise(&self) -> MapperResult<&E> {
        self.prototype.as_ref().ok_or_else(|| {
            MapperError::configuration(format!(
                "no entity prototype set for collection {:?}",
                self.collection
            ))
        })
    }

    /// The cached collection handle, resolved on first use.
    pub fn collection_handle(&self) -> MapperResult<Arc<dyn CollectionHandle>> {
        if let Some(handle) = self.handle.get() {
            return Ok(Arc::clone(handle));
        }

        debug!(database = %self.database, collection = %self.collection, "resolving collection");
        let handle = self.client.collection(&self.database, &self.collection)?;
        Ok(Arc::clone(self.handle.get_or_init(|| handle)))
    }

    /// Drop the cached handle; the next operation resolves it again.
    pub fn reset_collection(&mut self) {
        self.handle.take();
    }

    /// Run `query` and hydrate the result.
    ///
    /// Multi-document reads return `Found::Many` (possibly empty) or
    /// `Found::NotFound` when the backend produced no cursor. A sort is attached
    /// before the cursor is wrapped. Single-document reads with a sort return
    /// the first document in that order.
    #[instrument(skip_all, fields(collection = %self.collection, find_all = options.find_all), err)]
    pub fn find(&self, query: &Query, options: FindOptions<E>) -> MapperResult<Found<E>> {
        let prototype = self.initialise()?;
        let prototype = options.prototype.unwrap_or_else(|| prototype.clone());
        let hydrator = options
            .hydrator
            .unwrap_or_else(|| Arc::clone(&self.hydrator));
        let handle = self.collection_handle()?;
        let projection = query.projection.as_ref();

        if options.find_all {
            let Some(mut cursor) = handle.find(&query.filter, projection, &options.context)? else {
                return Ok(Found::NotFound);
            };
            if let Some(sort) = &query.sort {
                cursor.sort(sort)?;
            }
            return Ok(Found::Many(ResultSet::new(cursor, hydrator, prototype)));
        }

        let document = match &query.sort {
            None => handle.find_one(&query.filter, projection, &options.context)?,
            Some(sort) => match handle.find(&query.filter, projection, &options.context)? {
                Some(mut cursor) => {
                    cursor.sort(sort)?;
                    cursor.next().transpose()?
                }
                None => None,
            },
        };

        match document {
            Some(document) => Ok(Found::One(hydrator.hydrate(document, &prototype)?)),
            None => Ok(Found::NotFound),
        }
    }

    /// Alias of [`CollectionMapper::find`].
    pub fn select(&self, query: &Query, options: FindOptions<E>) -> MapperResult<Found<E>> {
        self.find(query, options)
    }

    /// Every match of `query`; `None` when the backend produced no cursor.
    pub fn find_all(&self, query: &Query, context: &CallContext) -> MapperResult<Option<ResultSet<E>>> {
        let options = FindOptions::all().with_context(context.clone());
        Ok(self.find(query, options)?.into_many())
    }

    /// First match of `query`; `None` when nothing matches.
    pub fn find_one(&self, query: &Query, context: &CallContext) -> MapperResult<Option<E>> {
        let options = FindOptions::one().with_context(context.clone());
        Ok(self.find(query, options)?.into_one())
    }

    /// Alias of [`CollectionMapper::find_one`].
    pub fn select_one(&self, query: &Query, context: &CallContext) -> MapperResult<Option<E>> {
        self.find_one(query, context)
    }

    /// Store `entity` as a new document.
    ///
    /// Returns the document that was sent, with the backend-assigned `_id`
    /// (first) when the entity had none.
    #[instrument(skip_all, fields(collection = %self.collection), err)]
    pub fn insert(&self, entity: &E, options: &WriteOptions) -> MapperResult<Document> {
        self.initialise()?;
        let handle = self.collection_handle()?;

        let mut document = self.hydrator.extract(entity)?;
        strip_empty_id(&mut document);

        let result = handle.insert(&document, options)?;

        match result.inserted_id {
            Some(id) if !document.contains_key(ID_FIELD) => {
                let mut stored = Document::new();
                stored.insert(ID_FIELD, id);
                for (key, value) in document {
                    stored.insert(key, value);
                }
                Ok(stored)
            }
            _ => Ok(document),
        }
    }

    /// Replace the stored document of `entity` with its current state.
    ///
    /// Without an explicit filter the entity must have an identifier.
    #[instrument(skip_all, fields(collection = %self.collection, upsert = options.write.upsert), err)]
    pub fn update(&self, entity: &E, options: UpdateOptions<E>) -> MapperResult<WriteResult> {
        self.initialise()?;
        let filter = match options.filter {
            Some(filter) => filter,
            None => id_filter(entity)?,
        };
        let hydrator = options
            .hydrator
            .unwrap_or_else(|| Arc::clone(&self.hydrator));

        let mut document = hydrator.extract(entity)?;
        strip_empty_id(&mut document);

        let handle = match &options.collection {
            Some(name) => self.client.collection(&self.database, name)?,
            None => self.collection_handle()?,
        };
        handle.update(&filter, &document, &options.write)
    }

    /// Remove the stored document(s) of `entity`.
    ///
    /// Without an explicit filter the entity must have an identifier.
    #[instrument(skip_all, fields(collection = %self.collection, just_one = options.just_one), err)]
    pub fn remove(&self, entity: &E, options: RemoveOptions) -> MapperResult<WriteResult> {
        self.initialise()?;
        let filter = match options.filter {
            Some(filter) => filter,
            None => id_filter(entity)?,
        };
        let handle = self.collection_handle()?;
        handle.remove(
            &filter,
            &DeleteOptions {
                just_one: options.just_one,
                context: options.context,
            },
        )
    }

    /// Alias of [`CollectionMapper::remove`].
    pub fn delete(&self, entity: &E, options: RemoveOptions) -> MapperResult<WriteResult> {
        self.remove(entity, options)
    }

    /// Native id for `id`; `None` when empty or malformed.
    pub fn mongo_id(&self, id: &str) -> Option<DocumentId> {
        DocumentId::parse(id)
    }
}

impl<E: Entity> core::fmt::Debug for CollectionMapper<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CollectionMapper")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("initialised", &self.prototype.is_some())
            .field("resolved", &self.handle.get().is_some())
            .finish()
    }
}
