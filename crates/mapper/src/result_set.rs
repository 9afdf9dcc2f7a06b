use std::sync::Arc;

use mongomap_core::MapperResult;

use crate::client::DocumentCursor;
use crate::hydrator::Hydrator;

/// Lazy sequence of entities hydrated from a backend cursor.
///
/// Forward-only and not restartable; run the query again to re-read.
pub struct ResultSet<E> {
    cursor: Box<dyn DocumentCursor>,
    hydrator: Arc<dyn Hydrator<E>>,
    prototype: E,
}

impl<E> ResultSet<E> {
    pub fn new(cursor: Box<dyn DocumentCursor>, hydrator: Arc<dyn Hydrator<E>>, prototype: E) -> Self {
        Self {
            cursor,
            hydrator,
            prototype,
        }
    }

    pub fn prototype(&self) -> &E {
        &self.prototype
    }
}

impl<E> Iterator for ResultSet<E> {
    type Item = MapperResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = match self.cursor.next()? {
            Ok(document) => document,
            Err(e) => return Some(Err(e)),
        };
        Some(self.hydrator.hydrate(document, &self.prototype))
    }
}

impl<E> core::fmt::Debug for ResultSet<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResultSet").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Document, doc};
    use mongomap_core::MapperError;
    use serde::{Deserialize, Serialize};

    use crate::hydrator::DocumentHydrator;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Tag {
        #[serde(rename = "_id")]
        id: String,
        label: String,
        weight: i32,
    }

    struct VecCursor(std::vec::IntoIter<MapperResult<Document>>);

    impl Iterator for VecCursor {
        type Item = MapperResult<Document>;

        fn next(&mut self) -> Option<Self::Item> {
            self.0.next()
        }
    }

    impl DocumentCursor for VecCursor {
        fn sort(&mut self, _spec: &Document) -> MapperResult<()> {
            Ok(())
        }
    }

    fn result_set(rows: Vec<MapperResult<Document>>, prototype: Tag) -> ResultSet<Tag> {
        ResultSet::new(
            Box::new(VecCursor(rows.into_iter())),
            Arc::new(DocumentHydrator::<Tag>::new()),
            prototype,
        )
    }

    #[test]
    fn each_row_starts_from_the_prototype() {
        let prototype = Tag {
            weight: 1,
            ..Tag::default()
        };
        let rows = vec![
            Ok(doc! { "label": "red", "weight": 5 }),
            Ok(doc! { "label": "blue" }),
        ];

        let tags: Vec<Tag> = result_set(rows, prototype.clone())
            .collect::<MapperResult<_>>()
            .unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].weight, 5);
        assert_eq!(tags[1].label, "blue");
        assert_eq!(tags[1].weight, 1);
    }

    #[test]
    fn cursor_errors_are_yielded_as_items() {
        let rows = vec![
            Ok(doc! { "label": "red" }),
            Err(MapperError::backend("cursor killed")),
        ];

        let mut set = result_set(rows, Tag::default());
        assert!(set.next().unwrap().is_ok());
        assert!(matches!(set.next(), Some(Err(MapperError::Backend(_)))));
        assert!(set.next().is_none());
    }

    #[test]
    fn empty_cursor_yields_nothing() {
        let mut set = result_set(Vec::new(), Tag::default());
        assert!(set.next().is_none());
    }
}
