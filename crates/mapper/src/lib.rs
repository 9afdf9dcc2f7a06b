//! `mongomap`: data mapper over document stores.
//!
//! - `client`: backend-neutral client traits, call context, in-memory and
//!   MongoDB backends, driver selection.
//! - `hydrator`: entity <-> document conversion and per-field strategies.
//! - `result_set`: lazy hydrating iteration over a backend cursor.
//! - `mapper`: CRUD for one collection in entity terms.
//! - `config`: connection settings.

pub mod client;
pub mod config;
pub mod hydrator;
pub mod mapper;
pub mod result_set;

#[cfg(test)]
mod integration_tests;

pub use client::{Adapter, CallContext, CancelToken, DatabaseClient, Driver, WriteOptions, WriteResult};
pub use config::{AuthConfig, MongoConfig};
pub use hydrator::{DateTimeStrategy, DocumentHydrator, Hydrator, ObjectIdStrategy, Strategy};
pub use mapper::{CollectionMapper, FindOptions, Found, RemoveOptions, UpdateOptions};
pub use mongomap_core::{
    Bson, Document, DocumentId, Entity, ID_FIELD, MapperError, MapperResult, Query, doc,
};
pub use result_set::ResultSet;
