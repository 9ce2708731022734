use crate::errors::ShelveResult;
use bson::{Bson, Document};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// The store operations a shelve translates its mapping calls into.
///
/// Every method is a single request against the store. Implementations must
/// make each write atomic on the store side; the shelve never combines a read
/// and a write to emulate one.
pub trait DocumentCollectionProvider: Send + Sync {
    /// Returns the first document matching `filter`, or `None`.
    fn find_one(&self, filter: Document) -> ShelveResult<Option<Document>>;

    /// Applies the update operators in `update` to the first document
    /// matching `filter`, inserting a new document if none matches.
    fn update_one_upsert(&self, filter: Document, update: Document) -> ShelveResult<()>;

    /// Replaces the first document matching `filter` with `replacement`,
    /// keeping its identity field, or inserts `replacement` if none matches.
    fn replace_one_upsert(&self, filter: Document, replacement: Document) -> ShelveResult<()>;

    /// Deletes at most one matching document and returns the deleted count.
    fn delete_one(&self, filter: Document) -> ShelveResult<u64>;

    /// Deletes every matching document and returns the deleted count.
    fn delete_many(&self, filter: Document) -> ShelveResult<u64>;

    /// Counts all documents in the collection.
    fn count(&self) -> ShelveResult<u64>;

    /// Opens a cursor over every document matching `filter`.
    fn find(&self, filter: Document) -> ShelveResult<DocumentCursor>;

    /// Inserts `document` unchanged and returns its identity value.
    fn insert_one(&self, document: Document) -> ShelveResult<Bson>;

    /// Inserts `documents` unchanged and returns their identity values in
    /// input order.
    fn insert_many(&self, documents: Vec<Document>) -> ShelveResult<Vec<Bson>>;

    fn database_name(&self) -> String;

    fn name(&self) -> String;
}

/// A handle to a document collection owned by some store client.
///
/// `ShelfCollection` is a cheap, cloneable reference to a
/// [`DocumentCollectionProvider`]. All clones share the same provider; the
/// handle never opens or closes the underlying connection.
///
/// # Examples
///
/// ```rust
/// use mongo_shelve::collection::ShelfCollection;
/// use mongo_shelve::memory::InMemoryCollection;
///
/// let collection = ShelfCollection::new(InMemoryCollection::new("db", "people"));
/// assert_eq!(collection.name(), "people");
/// assert_eq!(collection.count().unwrap(), 0);
/// ```
#[derive(Clone)]
pub struct ShelfCollection {
    inner: Arc<dyn DocumentCollectionProvider>,
}

impl ShelfCollection {
    /// Creates a new `ShelfCollection` from a provider implementation.
    pub fn new<T: DocumentCollectionProvider + 'static>(inner: T) -> Self {
        ShelfCollection {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for ShelfCollection {
    type Target = Arc<dyn DocumentCollectionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for ShelfCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShelfCollection")
            .field("database", &self.inner.database_name())
            .field("name", &self.inner.name())
            .finish()
    }
}

/// A lazy, store-native cursor over raw documents.
///
/// Documents are yielded exactly as the store returns them, identity field
/// included. A cursor is single-pass; issue a new `find` to start over.
pub struct DocumentCursor {
    underlying: Box<dyn Iterator<Item = ShelveResult<Document>> + Send>,
}

impl DocumentCursor {
    pub fn new(iter: Box<dyn Iterator<Item = ShelveResult<Document>> + Send>) -> Self {
        DocumentCursor { underlying: iter }
    }

    /// Collects the remaining documents, stopping at the first error.
    pub fn try_collect(self) -> ShelveResult<Vec<Document>> {
        self.collect()
    }
}

impl Iterator for DocumentCursor {
    type Item = ShelveResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.underlying.next()
    }
}
