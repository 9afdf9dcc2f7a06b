//! Entity <-> document conversion.

mod document_hydrator;
mod strategy;

use std::sync::Arc;

use bson::{Bson, Document};

use mongomap_core::{ID_FIELD, MapperResult};

pub use document_hydrator::DocumentHydrator;
pub use strategy::{DateTimeStrategy, ObjectIdStrategy, Strategy};

/// Converts entities to storage documents and back.
///
/// `hydrate` builds a fresh entity from `prototype` and never mutates it, so
/// one prototype serves every row of a result set.
pub trait Hydrator<E>: Send + Sync {
    /// Entity -> storage document. An empty identifier is omitted.
    fn extract(&self, entity: &E) -> MapperResult<Document>;

    /// Storage document -> entity seeded from `prototype`.
    fn hydrate(&self, document: Document, prototype: &E) -> MapperResult<E>;
}

impl<E, H> Hydrator<E> for Arc<H>
where
    H: Hydrator<E> + ?Sized,
{
    fn extract(&self, entity: &E) -> MapperResult<Document> {
        (**self).extract(entity)
    }

    fn hydrate(&self, document: Document, prototype: &E) -> MapperResult<E> {
        (**self).hydrate(document, prototype)
    }
}

/// Drop an `_id` that carries no value so the backend assigns one.
pub(crate) fn strip_empty_id(document: &mut Document) {
    let empty = match document.get(ID_FIELD) {
        Some(Bson::Null) => true,
        Some(Bson::String(s)) => s.is_empty(),
        _ => false,
    };
    if empty {
        document.remove(ID_FIELD);
    }
}
