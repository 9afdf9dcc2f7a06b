//! Database client boundary.
//!
//! The mapper consumes a backend only through these traits: a
//! [`DatabaseClient`] resolves [`CollectionHandle`]s, which run queries and
//! writes and hand back lazy [`DocumentCursor`]s. Retry and timeout policy
//! belong to the client; every call carries a [`CallContext`].

pub mod adapter;
pub mod context;
pub mod in_memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod r#trait;

pub use adapter::{Adapter, Driver};
pub use context::{CallContext, CancelToken};
pub use in_memory::{InMemoryClient, InMemoryCollection};
#[cfg(feature = "mongodb")]
pub use mongo::{MongoClient, MongoCollection};
pub use r#trait::{
    CollectionHandle, DatabaseClient, DeleteOptions, DocumentCursor, WriteOptions, WriteResult,
};
