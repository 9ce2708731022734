use crate::collection::{DocumentCursor, ShelfCollection};
use crate::errors::{ErrorKind, ShelveError, ShelveResult};
use bson::{doc, Bson, Document};
use std::fmt::{Debug, Display, Formatter};

/// Name of the store-generated identity field hidden from every record.
pub const ID_FIELD: &str = "_id";

/// A stored document without its key field and identity field.
pub type Record = Document;

/// A persistent map over a document collection.
///
/// `MongoShelve` treats every document of a collection as one entry, keyed by
/// the value of a designated field. Looking up a key returns all the other
/// fields of the matching document; the key field itself and `_id` are never
/// part of a returned [`Record`].
///
/// The key field should carry a unique index in the collection. The shelve
/// relies on the store for uniqueness and never checks it itself.
///
/// The shelve holds no state besides the collection handle and the key-field
/// name, so clones are cheap and may be shared across threads. Every
/// operation is one request to the store; writes use the store's atomic
/// primitives directly.
///
/// # Examples
///
/// ```rust
/// use bson::doc;
/// use mongo_shelve::collection::ShelfCollection;
/// use mongo_shelve::memory::InMemoryCollection;
/// use mongo_shelve::MongoShelve;
///
/// # fn main() -> mongo_shelve::errors::ShelveResult<()> {
/// let collection = ShelfCollection::new(InMemoryCollection::new("hashes", "files"));
/// let shelve = MongoShelve::new(collection, "filename")?;
///
/// shelve.set("myFic.txt", &doc! { "size": 14461 })?;
/// assert_eq!(shelve.get("myFic.txt")?, doc! { "size": 14461 });
///
/// shelve.delete("myFic.txt")?;
/// assert!(!shelve.contains("myFic.txt")?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MongoShelve {
    collection: ShelfCollection,
    key_field: String,
}

impl MongoShelve {
    /// Creates a shelve over `collection`, looking entries up by `key_field`.
    ///
    /// The key field must name a top-level field: it cannot be empty, be
    /// `_id`, start with `$` or contain `.`.
    pub fn new(collection: ShelfCollection, key_field: &str) -> ShelveResult<MongoShelve> {
        validate_key_field(key_field)?;
        Ok(MongoShelve {
            collection,
            key_field: key_field.to_string(),
        })
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Returns the underlying collection handle, for store-native calls this
    /// shelve does not wrap.
    pub fn collection(&self) -> &ShelfCollection {
        &self.collection
    }

    /// Returns the record stored under `key`.
    ///
    /// Fails with [`ErrorKind::NotFound`] if no document has this key.
    pub fn get<K: Into<Bson>>(&self, key: K) -> ShelveResult<Record> {
        let key = key.into();
        log::debug!("Looking up key {} in {}", key, self);

        match self.collection.find_one(self.key_filter(&key))? {
            Some(document) => Ok(self.strip(&document)),
            None => Err(ShelveError::new(
                &format!(
                    "Key '{}' not found in collection '{}'",
                    display_key(&key),
                    self.namespace()
                ),
                ErrorKind::NotFound,
            )),
        }
    }

    /// Stores `record` under `key`, replacing any record already there.
    ///
    /// The store performs this as a single upsert, so after it returns the
    /// document holds exactly the fields of `record` plus the key field. A key
    /// field or `_id` inside `record` is not written.
    pub fn set<K: Into<Bson>>(&self, key: K, record: &Record) -> ShelveResult<()> {
        let key = key.into();
        log::debug!("Replacing record for key {} in {}", key, self);

        let mut replacement = self.payload(record);
        replacement.insert(self.key_field.clone(), key.clone());
        self.collection
            .replace_one_upsert(self.key_filter(&key), replacement)
    }

    /// Sets the fields of `fields` on the document stored under `key`,
    /// creating it if needed.
    ///
    /// Unlike [`MongoShelve::set`], fields already stored but absent from
    /// `fields` are kept.
    pub fn merge<K: Into<Bson>>(&self, key: K, fields: &Record) -> ShelveResult<()> {
        let key = key.into();
        log::debug!("Merging fields into key {} in {}", key, self);

        let mut set = self.payload(fields);
        set.insert(self.key_field.clone(), key.clone());
        self.collection
            .update_one_upsert(self.key_filter(&key), doc! { "$set": set })
    }

    /// Removes the document stored under `key`.
    ///
    /// Fails with [`ErrorKind::NotFound`] if nothing was deleted, and with
    /// [`ErrorKind::InvariantViolation`] if the store reports more than one
    /// deleted document.
    pub fn delete<K: Into<Bson>>(&self, key: K) -> ShelveResult<()> {
        let key = key.into();
        log::debug!("Deleting key {} from {}", key, self);

        let deleted = self.collection.delete_one(self.key_filter(&key))?;
        match deleted {
            1 => Ok(()),
            0 => Err(ShelveError::new(
                &format!(
                    "No document with key '{}' could be deleted from collection '{}'",
                    display_key(&key),
                    self.namespace()
                ),
                ErrorKind::NotFound,
            )),
            n => {
                log::error!(
                    "Deleting key {} removed {} documents from {}; the key field is not unique",
                    key,
                    n,
                    self
                );
                Err(ShelveError::new(
                    &format!(
                        "Deleting key '{}' removed {} documents from collection '{}', expected 1",
                        display_key(&key),
                        n,
                        self.namespace()
                    ),
                    ErrorKind::InvariantViolation,
                ))
            }
        }
    }

    /// Returns `true` if a document is stored under `key`.
    ///
    /// Only an absent key yields `false`; every other failure is returned.
    pub fn contains<K: Into<Bson>>(&self, key: K) -> ShelveResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns the number of documents in the collection.
    pub fn len(&self) -> ShelveResult<u64> {
        self.collection.count()
    }

    pub fn is_empty(&self) -> ShelveResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterates over the keys of all documents.
    ///
    /// Each call starts a new scan of the whole collection, in the store's
    /// natural order.
    pub fn keys(&self) -> ShelveResult<Keys> {
        log::debug!("Scanning all keys of {}", self);
        Ok(Keys {
            cursor: self.collection.find(Document::new())?,
            shelve: self.clone(),
        })
    }

    /// Iterates over `(key, record)` pairs of all documents.
    pub fn items(&self) -> ShelveResult<Items> {
        log::debug!("Scanning all entries of {}", self);
        Ok(Items {
            cursor: self.collection.find(Document::new())?,
            shelve: self.clone(),
        })
    }

    /// Iterates over the records of all documents, without their keys.
    pub fn values(&self) -> ShelveResult<Values> {
        Ok(Values {
            items: self.items()?,
        })
    }

    /// Deletes every document in the collection and returns how many were
    /// removed.
    pub fn clear(&self) -> ShelveResult<u64> {
        log::debug!("Clearing {}", self);
        self.collection.delete_many(Document::new())
    }

    /// Deletes every document matching a store-native `filter` and returns
    /// the number removed.
    pub fn delete_many(&self, filter: Document) -> ShelveResult<u64> {
        log::debug!("Deleting documents matching {} from {}", filter, self);
        self.collection.delete_many(filter)
    }

    /// Inserts a raw document as-is and returns its identity value.
    ///
    /// Nothing is added or stripped. Without a key field the document will
    /// not be reachable through [`MongoShelve::get`].
    pub fn insert_one(&self, document: Document) -> ShelveResult<Bson> {
        self.collection.insert_one(document)
    }

    /// Inserts raw documents as-is and returns their identity values.
    pub fn insert_many(&self, documents: Vec<Document>) -> ShelveResult<Vec<Bson>> {
        self.collection.insert_many(documents)
    }

    /// Runs a store-native `filter` and returns the raw cursor.
    ///
    /// Documents come back unmodified, `_id` and key field included.
    pub fn find(&self, filter: Document) -> ShelveResult<DocumentCursor> {
        self.collection.find(filter)
    }

    fn key_filter(&self, key: &Bson) -> Document {
        let mut filter = Document::new();
        filter.insert(self.key_field.clone(), key.clone());
        filter
    }

    fn namespace(&self) -> String {
        format!(
            "{}.{}",
            self.collection.database_name(),
            self.collection.name()
        )
    }

    /// Copies every field except the key field and `_id`.
    fn strip(&self, document: &Document) -> Record {
        document
            .iter()
            .filter(|(field, _)| !self.is_reserved(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    fn payload(&self, record: &Record) -> Document {
        if record.contains_key(ID_FIELD) {
            log::debug!("Dropping {} from record written to {}", ID_FIELD, self);
        }
        self.strip(record)
    }

    fn is_reserved(&self, field: &str) -> bool {
        field == ID_FIELD || field == self.key_field
    }

    fn split(&self, document: Document) -> ShelveResult<(Bson, Record)> {
        let key = self.key_of(&document)?;
        Ok((key, self.strip(&document)))
    }

    fn key_of(&self, document: &Document) -> ShelveResult<Bson> {
        match document.get(&self.key_field) {
            Some(key) => Ok(key.clone()),
            None => {
                let id = document.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
                log::warn!(
                    "Document {} in {} has no {} field",
                    id,
                    self,
                    self.key_field
                );
                Err(ShelveError::new(
                    &format!(
                        "Document {} in collection '{}' has no '{}' field",
                        id,
                        self.namespace(),
                        self.key_field
                    ),
                    ErrorKind::MissingKeyField,
                ))
            }
        }
    }
}

impl Display for MongoShelve {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} ({})>", self.namespace(), self.key_field)
    }
}

impl Debug for MongoShelve {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoShelve")
            .field("collection", &self.collection)
            .field("key_field", &self.key_field)
            .finish()
    }
}

pub(crate) fn validate_key_field(key_field: &str) -> ShelveResult<()> {
    let problem = if key_field.is_empty() {
        Some("must not be empty")
    } else if key_field == ID_FIELD {
        Some("must not be the identity field")
    } else if key_field.starts_with('$') {
        Some("must not start with '$'")
    } else if key_field.contains('.') {
        Some("must name a top-level field")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(ShelveError::new(
            &format!("Invalid key field '{}': {}", key_field, problem),
            ErrorKind::InvalidFieldName,
        )),
        None => Ok(()),
    }
}

/// Renders a key for error messages; strings appear without quotes.
fn display_key(key: &Bson) -> String {
    match key {
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Iterator over `(key, record)` pairs, returned by [`MongoShelve::items`].
pub struct Items {
    cursor: DocumentCursor,
    shelve: MongoShelve,
}

impl Iterator for Items {
    type Item = ShelveResult<(Bson, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = self.cursor.next()?;
        Some(document.and_then(|document| self.shelve.split(document)))
    }
}

/// Iterator over keys, returned by [`MongoShelve::keys`].
pub struct Keys {
    cursor: DocumentCursor,
    shelve: MongoShelve,
}

impl Iterator for Keys {
    type Item = ShelveResult<Bson>;

    fn next(&mut self) -> Option<Self::Item> {
        let document = self.cursor.next()?;
        Some(document.and_then(|document| self.shelve.key_of(&document)))
    }
}

/// Iterator over records, returned by [`MongoShelve::values`].
pub struct Values {
    items: Items,
}

impl Iterator for Values {
    type Item = ShelveResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(|item| item.map(|(_, record)| record))
    }
}
