use crate::collection::Document;
use std::fmt::{Debug, Formatter};

/// The documents a find returned, in ascending id order.
///
/// A cursor is a snapshot taken under the collection read lock; later
/// writes do not show through it.
pub struct DocumentCursor {
    documents: std::vec::IntoIter<Document>,
    size: usize,
}

impl DocumentCursor {
    pub(crate) fn new(documents: Vec<Document>) -> Self {
        let size = documents.len();
        DocumentCursor {
            documents: documents.into_iter(),
            size,
        }
    }

    /// Number of documents the find matched.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn first(mut self) -> Option<Document> {
        self.documents.next()
    }
}

impl Debug for DocumentCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCursor")
            .field("size", &self.size)
            .field("remaining", &self.documents.len())
            .finish()
    }
}

impl Iterator for DocumentCursor {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        self.documents.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.documents.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_cursor() {
        let cursor = DocumentCursor::new(vec![doc! { a: 1 }, doc! { a: 2 }]);
        assert_eq!(cursor.size(), 2);
        let values: Vec<_> = cursor.map(|d| d.get("a").unwrap()).collect();
        assert_eq!(values, vec![1.into(), 2.into()]);

        assert!(DocumentCursor::new(vec![]).first().is_none());
    }

    #[test]
    fn test_debug_shows_progress() {
        let mut cursor = DocumentCursor::new(vec![doc! { a: 1 }, doc! { a: 2 }]);
        cursor.next();
        assert_eq!(format!("{:?}", cursor), "DocumentCursor { size: 2, remaining: 1 }");
    }
}
