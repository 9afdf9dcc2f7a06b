//! `mongomap-core`: primitives shared by the mapper and its backends.
//!
//! This crate has no storage or I/O concerns: entities, identifiers, queries
//! and the error model.

pub mod entity;
pub mod error;
pub mod id;
pub mod query;

pub use bson::{Bson, Document, doc};
pub use entity::{Entity, ID_FIELD};
pub use error::{MapperError, MapperResult};
pub use id::DocumentId;
pub use query::Query;
