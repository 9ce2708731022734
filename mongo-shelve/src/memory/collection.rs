use super::filter::{lookup, matches, values_equal};
use super::update::{apply_update, upsert_seed};
use super::MemoryStoreError;
use crate::collection::{DocumentCollectionProvider, DocumentCursor};
use crate::errors::ShelveResult;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::sync::Arc;

const ID_FIELD: &str = "_id";

/// An in-memory document collection.
///
/// # Characteristics
/// - **Thread-Safe**: one `RwLock` guards the documents, so every operation,
///   including upserts, is atomic
/// - **Shared**: clones refer to the same documents
/// - **Unique fields**: `_id` is always unique; more fields can be
///   constrained with [`InMemoryCollection::create_unique_index`]
/// - **Insertion order**: cursors yield documents in insertion order
///
/// Cursors are taken from a snapshot of the matching documents at the time
/// `find` runs.
///
/// # Examples
///
/// ```rust
/// use bson::doc;
/// use mongo_shelve::collection::DocumentCollectionProvider;
/// use mongo_shelve::memory::InMemoryCollection;
///
/// let collection = InMemoryCollection::new("testing", "people");
/// collection.create_unique_index("name").unwrap();
/// collection.insert_one(doc! { "name": "Ann", "age": 23 }).unwrap();
///
/// assert!(collection.insert_one(doc! { "name": "Ann" }).is_err());
/// assert_eq!(collection.count().unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryCollection {
    inner: Arc<InMemoryCollectionInner>,
}

impl InMemoryCollection {
    pub fn new(database_name: &str, name: &str) -> InMemoryCollection {
        InMemoryCollection {
            inner: Arc::new(InMemoryCollectionInner {
                database_name: database_name.to_string(),
                name: name.to_string(),
                state: RwLock::new(CollectionState::default()),
            }),
        }
    }

    /// Requires every document to hold a distinct value for `field`.
    ///
    /// A missing field counts as `null`, as it does for a MongoDB unique
    /// index. Fails if existing documents already collide.
    pub fn create_unique_index(&self, field: &str) -> ShelveResult<()> {
        let mut state = self.inner.state.write();
        if state.unique_fields.iter().any(|f| f == field) {
            return Ok(());
        }
        for (index, document) in state.documents.iter().enumerate() {
            let value = unique_value(document, field);
            let duplicate = state.documents[index + 1..]
                .iter()
                .any(|other| values_equal(&unique_value(other, field), &value));
            if duplicate {
                return Err(MemoryStoreError::ExistingDuplicates {
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        log::debug!("Created unique constraint on {} for {}", field, self.inner.namespace());
        state.unique_fields.push(field.to_string());
        Ok(())
    }

    /// Returns the fields constrained to be unique, `_id` excluded.
    pub fn unique_fields(&self) -> Vec<String> {
        self.inner.state.read().unique_fields.clone()
    }
}

struct InMemoryCollectionInner {
    database_name: String,
    name: String,
    state: RwLock<CollectionState>,
}

#[derive(Default)]
struct CollectionState {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl InMemoryCollectionInner {
    fn namespace(&self) -> String {
        format!("{}.{}", self.database_name, self.name)
    }

    /// Checks `candidate` against every other document's unique fields.
    /// `skip` is the position of the document being replaced, if any.
    fn check_unique(
        &self,
        state: &CollectionState,
        candidate: &Document,
        skip: Option<usize>,
    ) -> ShelveResult<()> {
        let fields = std::iter::once(ID_FIELD).chain(state.unique_fields.iter().map(String::as_str));
        for field in fields {
            let value = unique_value(candidate, field);
            let clash = state
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != skip)
                .any(|(_, other)| values_equal(&unique_value(other, field), &value));
            if clash {
                return Err(MemoryStoreError::DuplicateKey {
                    namespace: self.namespace(),
                    field: field.to_string(),
                    value: value.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn position(&self, state: &CollectionState, filter: &Document) -> ShelveResult<Option<usize>> {
        for (position, document) in state.documents.iter().enumerate() {
            if matches(document, filter)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    fn insert(&self, state: &mut CollectionState, document: Document) -> ShelveResult<Bson> {
        let document = with_identity(document, None);
        self.check_unique(state, &document, None)?;
        let id = document.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
        state.documents.push(document);
        Ok(id)
    }
}

fn unique_value(document: &Document, field: &str) -> Bson {
    lookup(document, field).cloned().unwrap_or(Bson::Null)
}

/// Puts an identity field first: the document's own, else `existing`, else a
/// freshly generated one.
fn with_identity(document: Document, existing: Option<&Bson>) -> Document {
    let id = document
        .get(ID_FIELD)
        .cloned()
        .or_else(|| existing.cloned())
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut shaped = Document::new();
    shaped.insert(ID_FIELD, id);
    for (field, value) in document {
        if field != ID_FIELD {
            shaped.insert(field, value);
        }
    }
    shaped
}

impl DocumentCollectionProvider for InMemoryCollection {
    fn find_one(&self, filter: Document) -> ShelveResult<Option<Document>> {
        let state = self.inner.state.read();
        let position = self.inner.position(&state, &filter)?;
        Ok(position.map(|p| state.documents[p].clone()))
    }

    fn update_one_upsert(&self, filter: Document, update: Document) -> ShelveResult<()> {
        let mut state = self.inner.state.write();
        match self.inner.position(&state, &filter)? {
            Some(position) => {
                let mut updated = state.documents[position].clone();
                apply_update(&mut updated, &update)?;
                self.inner.check_unique(&state, &updated, Some(position))?;
                state.documents[position] = updated;
            }
            None => {
                let seed = upsert_seed(&filter, &update)?;
                self.inner.insert(&mut state, seed)?;
            }
        }
        Ok(())
    }

    fn replace_one_upsert(&self, filter: Document, replacement: Document) -> ShelveResult<()> {
        let mut state = self.inner.state.write();
        match self.inner.position(&state, &filter)? {
            Some(position) => {
                let existing = state.documents[position].get(ID_FIELD).cloned();
                let replaced = with_identity(replacement, existing.as_ref());
                self.inner.check_unique(&state, &replaced, Some(position))?;
                state.documents[position] = replaced;
            }
            None => {
                self.inner.insert(&mut state, replacement)?;
            }
        }
        Ok(())
    }

    fn delete_one(&self, filter: Document) -> ShelveResult<u64> {
        let mut state = self.inner.state.write();
        match self.inner.position(&state, &filter)? {
            Some(position) => {
                state.documents.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_many(&self, filter: Document) -> ShelveResult<u64> {
        let mut state = self.inner.state.write();
        // evaluate everything first so a filter error deletes nothing
        let mut verdicts = Vec::with_capacity(state.documents.len());
        for document in state.documents.iter() {
            verdicts.push(matches(document, &filter)?);
        }
        let deleted = verdicts.iter().filter(|matched| **matched).count() as u64;
        let mut verdicts = verdicts.into_iter();
        state
            .documents
            .retain(|_| !verdicts.next().unwrap_or(false));
        Ok(deleted)
    }

    fn count(&self) -> ShelveResult<u64> {
        Ok(self.inner.state.read().documents.len() as u64)
    }

    fn find(&self, filter: Document) -> ShelveResult<DocumentCursor> {
        let state = self.inner.state.read();
        let mut snapshot: Vec<ShelveResult<Document>> = Vec::new();
        for document in state.documents.iter() {
            if matches(document, &filter)? {
                snapshot.push(Ok(document.clone()));
            }
        }
        Ok(DocumentCursor::new(Box::new(snapshot.into_iter())))
    }

    fn insert_one(&self, document: Document) -> ShelveResult<Bson> {
        let mut state = self.inner.state.write();
        self.inner.insert(&mut state, document)
    }

    fn insert_many(&self, documents: Vec<Document>) -> ShelveResult<Vec<Bson>> {
        // ordered insert: documents before the first failure stay inserted
        let mut state = self.inner.state.write();
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.inner.insert(&mut state, document)?);
        }
        Ok(ids)
    }

    fn database_name(&self) -> String {
        self.inner.database_name.clone()
    }

    fn name(&self) -> String {
        self.inner.name.clone()
    }
}
