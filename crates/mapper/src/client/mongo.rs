//! MongoDB-backed database client (synchronous driver API).
//!
//! Compiled with the `mongodb` cargo feature.
//!
//! ## Error Mapping
//!
//! | Driver error kind | MapperError |
//! |---|---|
//! | `ServerSelection`, `Io`, `DnsResolve`, `Authentication` | `Connection` |
//! | anything else (write errors, command errors, bad cursor use) | `Backend` |
//!
//! ## Deadlines
//!
//! The call context is checked before every request. Reads forward the
//! remaining time as `maxTimeMS`; writes forward it as the write-concern
//! timeout.
//!
//! ## Thread Safety
//!
//! The driver client is a pooled, thread-safe handle; `MongoClient` and every
//! `MongoCollection` resolved from it are `Send + Sync`.

use std::sync::Arc;
use std::time::Duration;

use bson::{Document, doc};
use mongodb::error::{Error as DriverError, ErrorKind};
use mongodb::options::{
    ClientOptions, Credential, DeleteOptions as DriverDeleteOptions, FindOneOptions, FindOptions,
    InsertOneOptions, ReplaceOptions, ServerAddress, WriteConcern,
};
use mongodb::sync::{Client, Collection, Cursor};
use tracing::{debug, info, instrument};

use mongomap_core::{MapperError, MapperResult};

use super::context::CallContext;
use super::r#trait::{
    CollectionHandle, DatabaseClient, DeleteOptions, DocumentCursor, WriteOptions, WriteResult,
};
use crate::config::MongoConfig;

const APP_NAME: &str = "mongomap";
const MIN_SERVER_TIME: Duration = Duration::from_millis(1);

fn map_driver_error(operation: &str, e: DriverError) -> MapperError {
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Authentication { .. } => MapperError::connection(format!("{operation}: {e}")),
        _ => MapperError::backend(format!("{operation}: {e}")),
    }
}

/// Server-side time limit for reads. Clamped to 1ms: `maxTimeMS: 0` means no limit.
fn max_time(context: &CallContext) -> Option<Duration> {
    context
        .remaining()
        .map(|remaining| remaining.max(MIN_SERVER_TIME))
}

fn write_concern(context: &CallContext) -> Option<WriteConcern> {
    context.remaining().map(|remaining| {
        let mut concern = WriteConcern::default();
        concern.w_timeout = Some(remaining.max(MIN_SERVER_TIME));
        concern
    })
}

/// Client connected to a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
}

impl MongoClient {
    /// Validate `config`, build the driver client and ping the server.
    ///
    /// An unreachable server or rejected credentials surface here as
    /// `MapperError::Connection`, not on the first query.
    #[instrument(skip(config), fields(host = %config.hostname, port = config.port), err)]
    pub fn connect(config: &MongoConfig) -> MapperResult<Self> {
        config.validate()?;

        let mut options = ClientOptions::default();
        options.hosts = vec![ServerAddress::Tcp {
            host: config.hostname.clone(),
            port: Some(config.port),
        }];
        options.app_name = Some(APP_NAME.to_string());

        if config.auth.require_authentication {
            let mut credential = Credential::default();
            credential.username = Some(config.auth.username.clone());
            credential.password = Some(config.auth.password.clone());
            options.credential = Some(credential);
        }

        if let Some(timeout) = config.timeout() {
            options.connect_timeout = Some(timeout);
            options.server_selection_timeout = Some(timeout);
        }

        let client = Client::with_options(options).map_err(|e| map_driver_error("connect", e))?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .map_err(|e| map_driver_error("ping", e))?;

        info!(uri = %config.connection_string(), "connected to MongoDB");
        Ok(Self { client })
    }

    /// Wrap an already configured driver client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl DatabaseClient for MongoClient {
    fn collection(
        &self,
        database: &str,
        collection: &str,
    ) -> MapperResult<Arc<dyn CollectionHandle>> {
        debug!(database, collection, "resolving collection handle");
        Ok(Arc::new(MongoCollection {
            name: collection.to_string(),
            inner: self.client.database(database).collection::<Document>(collection),
        }))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Handle to one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    name: String,
    inner: Collection<Document>,
}

impl CollectionHandle for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(collection = %self.name), err)]
    fn find(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Box<dyn DocumentCursor>>> {
        context.check()?;

        let mut options = FindOptions::default();
        options.projection = projection.cloned();

        Ok(Some(Box::new(MongoCursor {
            collection: self.inner.clone(),
            filter: filter.clone(),
            options: Some(options),
            context: context.clone(),
            cursor: None,
            exhausted: false,
        })))
    }

    #[instrument(skip_all, fields(collection = %self.name), err)]
    fn find_one(
        &self,
        filter: &Document,
        projection: Option<&Document>,
        context: &CallContext,
    ) -> MapperResult<Option<Document>> {
        context.check()?;

        let mut options = FindOneOptions::default();
        options.projection = projection.cloned();
        options.max_time = max_time(context);

        self.inner
            .find_one(filter.clone(), options)
            .map_err(|e| map_driver_error("find_one", e))
    }

    #[instrument(skip_all, fields(collection = %self.name), err)]
    fn insert(&self, document: &Document, options: &WriteOptions) -> MapperResult<WriteResult> {
        options.context.check()?;

        let mut driver_options = InsertOneOptions::default();
        driver_options.write_concern = write_concern(&options.context);

        let result = self
            .inner
            .insert_one(document, driver_options)
            .map_err(|e| map_driver_error("insert", e))?;
        Ok(WriteResult::inserted(result.inserted_id))
    }

    #[instrument(skip_all, fields(collection = %self.name, upsert = options.upsert), err)]
    fn update(
        &self,
        filter: &Document,
        document: &Document,
        options: &WriteOptions,
    ) -> MapperResult<WriteResult> {
        options.context.check()?;

        let mut driver_options = ReplaceOptions::default();
        driver_options.upsert = Some(options.upsert);
        driver_options.write_concern = write_concern(&options.context);

        let result = self
            .inner
            .replace_one(filter.clone(), document, driver_options)
            .map_err(|e| map_driver_error("update", e))?;
        Ok(WriteResult::updated(
            result.matched_count,
            result.modified_count,
            result.upserted_id,
        ))
    }

    #[instrument(skip_all, fields(collection = %self.name, just_one = options.just_one), err)]
    fn remove(&self, filter: &Document, options: &DeleteOptions) -> MapperResult<WriteResult> {
        options.context.check()?;

        let mut driver_options = DriverDeleteOptions::default();
        driver_options.write_concern = write_concern(&options.context);

        let result = if options.just_one {
            self.inner.delete_one(filter.clone(), driver_options)
        } else {
            self.inner.delete_many(filter.clone(), driver_options)
        }
        .map_err(|e| map_driver_error("remove", e))?;
        Ok(WriteResult::deleted(result.deleted_count))
    }
}

/// Cursor that issues the query on first advance, so a sort can still be attached.
struct MongoCursor {
    collection: Collection<Document>,
    filter: Document,
    options: Option<FindOptions>,
    context: CallContext,
    cursor: Option<Cursor<Document>>,
    exhausted: bool,
}

impl MongoCursor {
    fn open(&mut self) -> MapperResult<()> {
        self.context.check()?;
        let mut options = self.options.take().unwrap_or_default();
        options.max_time = max_time(&self.context);

        let cursor = self
            .collection
            .find(std::mem::take(&mut self.filter), options)
            .map_err(|e| map_driver_error("find", e))?;
        self.cursor = Some(cursor);
        Ok(())
    }
}

impl Iterator for MongoCursor {
    type Item = MapperResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if self.cursor.is_none() {
            if let Err(e) = self.open() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }

        let next = self.cursor.as_mut()?.next();
        match next {
            Some(Ok(doc)) => Some(Ok(doc)),
            Some(Err(e)) => {
                self.exhausted = true;
                Some(Err(map_driver_error("cursor", e)))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl DocumentCursor for MongoCursor {
    fn sort(&mut self, spec: &Document) -> MapperResult<()> {
        match self.options.as_mut() {
            Some(options) if self.cursor.is_none() => {
                options.sort = Some(spec.clone());
                Ok(())
            }
            _ => Err(MapperError::backend(
                "cannot sort a cursor after iteration has started",
            )),
        }
    }
}
