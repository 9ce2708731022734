//! MongoDB backend.
//!
//! [`MongoCollection`] adapts a `mongodb::sync::Collection<Document>` to
//! [`DocumentCollectionProvider`]. Every call is one request to the server;
//! server errors come back as [`ErrorKind::StoreError`], or as
//! [`ErrorKind::UniqueConstraintViolation`] for duplicate-key errors, with the
//! driver error attached as the cause.
//!
//! [`ShelveConfig`] opens a client from a connection string and builds a
//! [`MongoShelve`](crate::MongoShelve) over one of its collections.

mod config;

pub use config::*;

use crate::collection::{DocumentCollectionProvider, DocumentCursor};
use crate::errors::{ErrorKind, ShelveError, ShelveResult};
use bson::{Bson, Document};
use mongodb::error::{
    Error as DriverError, ErrorKind as DriverErrorKind, InsertManyError, WriteFailure,
};
use mongodb::sync::{Client, Collection};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// A MongoDB collection usable as a shelve backend.
///
/// Clones share the driver's connection pool.
#[derive(Clone, Debug)]
pub struct MongoCollection {
    collection: Collection<Document>,
}

impl MongoCollection {
    pub fn new(collection: Collection<Document>) -> MongoCollection {
        MongoCollection { collection }
    }

    /// Opens `database.collection` on an existing client.
    pub fn from_client(client: &Client, database: &str, collection: &str) -> MongoCollection {
        MongoCollection::new(client.database(database).collection::<Document>(collection))
    }

    /// The driver collection, for options this backend does not expose.
    pub fn inner(&self) -> &Collection<Document> {
        &self.collection
    }
}

impl DocumentCollectionProvider for MongoCollection {
    fn find_one(&self, filter: Document) -> ShelveResult<Option<Document>> {
        self.collection
            .find_one(filter)
            .run()
            .map_err(|e| store_error("find_one", e))
    }

    fn update_one_upsert(&self, filter: Document, update: Document) -> ShelveResult<()> {
        self.collection
            .update_one(filter, update)
            .upsert(true)
            .run()
            .map(|_| ())
            .map_err(|e| store_error("update_one", e))
    }

    fn replace_one_upsert(&self, filter: Document, replacement: Document) -> ShelveResult<()> {
        self.collection
            .replace_one(filter, replacement)
            .upsert(true)
            .run()
            .map(|_| ())
            .map_err(|e| store_error("replace_one", e))
    }

    fn delete_one(&self, filter: Document) -> ShelveResult<u64> {
        self.collection
            .delete_one(filter)
            .run()
            .map(|result| result.deleted_count)
            .map_err(|e| store_error("delete_one", e))
    }

    fn delete_many(&self, filter: Document) -> ShelveResult<u64> {
        self.collection
            .delete_many(filter)
            .run()
            .map(|result| result.deleted_count)
            .map_err(|e| store_error("delete_many", e))
    }

    fn count(&self) -> ShelveResult<u64> {
        self.collection
            .count_documents(Document::new())
            .run()
            .map_err(|e| store_error("count_documents", e))
    }

    fn find(&self, filter: Document) -> ShelveResult<DocumentCursor> {
        let cursor = self
            .collection
            .find(filter)
            .run()
            .map_err(|e| store_error("find", e))?;
        Ok(DocumentCursor::new(Box::new(
            cursor.map(|document| document.map_err(|e| store_error("cursor", e))),
        )))
    }

    fn insert_one(&self, document: Document) -> ShelveResult<Bson> {
        self.collection
            .insert_one(document)
            .run()
            .map(|result| result.inserted_id)
            .map_err(|e| store_error("insert_one", e))
    }

    fn insert_many(&self, documents: Vec<Document>) -> ShelveResult<Vec<Bson>> {
        let result = self
            .collection
            .insert_many(documents)
            .run()
            .map_err(|e| store_error("insert_many", e))?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    fn database_name(&self) -> String {
        self.collection.namespace().db
    }

    fn name(&self) -> String {
        self.collection.name().to_string()
    }
}

fn store_error(operation: &str, err: DriverError) -> ShelveError {
    let kind = if is_duplicate_key(&err) {
        ErrorKind::UniqueConstraintViolation
    } else {
        ErrorKind::StoreError
    };
    log::debug!("MongoDB {} failed: {}", operation, err);
    ShelveError::new_with_cause(&format!("MongoDB {} failed: {}", operation, err), kind, err)
}

fn is_duplicate_key(err: &DriverError) -> bool {
    match err.kind.as_ref() {
        DriverErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        DriverErrorKind::InsertMany(InsertManyError {
            write_errors: Some(write_errors),
            ..
        }) => write_errors
            .iter()
            .any(|write_error| write_error.code == DUPLICATE_KEY_CODE),
        DriverErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
