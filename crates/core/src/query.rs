//! Query description shared by single- and multi-document reads.

use bson::Document;

/// Filter + optional projection + optional sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

impl Query {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            projection: None,
            sort: None,
        }
    }

    /// Match every document in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn project(mut self, projection: Document) -> Self {
        self.projection = (!projection.is_empty()).then_some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = (!sort.is_empty()).then_some(sort);
        self
    }
}

impl From<Document> for Query {
    fn from(filter: Document) -> Self {
        Self::new(filter)
    }
}
