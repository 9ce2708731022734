//! # mongo-shelve
//!
//! A persistent map over a document-store collection.
//!
//! [`MongoShelve`] lets a collection whose documents carry a unique lookup
//! field be used like a key-value map: `get`, `set`, `delete`, `contains`,
//! `len` and lazy iteration over keys, records or both. Returned records never
//! contain the key field or the store's `_id`; the key field is attached again
//! on every write.
//!
//! ## Quick Start
//!
//! ```rust
//! use bson::doc;
//! use mongo_shelve::collection::ShelfCollection;
//! use mongo_shelve::memory::InMemoryCollection;
//! use mongo_shelve::MongoShelve;
//!
//! # fn main() -> mongo_shelve::errors::ShelveResult<()> {
//! let people = InMemoryCollection::new("testing", "people");
//! people.create_unique_index("name")?;
//!
//! let shelve = MongoShelve::new(ShelfCollection::new(people), "name")?;
//! shelve.set("Ann", &doc! { "age": 23, "height": 158 })?;
//! shelve.set("John", &doc! { "age": 21, "height": 172 })?;
//!
//! assert_eq!(shelve.len()?, 2);
//! assert_eq!(shelve.get("Ann")?, doc! { "age": 23, "height": 158 });
//!
//! for key in shelve.keys()? {
//!     println!("{}", key?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! With the `mongodb` feature, [`mongo::ShelveConfig`] opens a shelve over a
//! collection on a MongoDB server.
//!
//! ## Module Organization
//!
//! - [`shelve`] - The map view and its iterators
//! - [`collection`] - The store operations a shelve needs, as a trait
//! - [`memory`] - In-process collection for development and tests
//! - [`mongo`] - MongoDB backend and connection config (feature `mongodb`)
//! - [`errors`] - Error types and result definitions

pub mod collection;
pub mod errors;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod shelve;

pub use collection::{DocumentCollectionProvider, DocumentCursor, ShelfCollection};
pub use errors::{ErrorKind, ShelveError, ShelveResult};
pub use shelve::{Items, Keys, MongoShelve, Record, Values};
