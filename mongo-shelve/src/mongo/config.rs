use super::MongoCollection;
use crate::collection::ShelfCollection;
use crate::errors::{ErrorKind, ShelveError, ShelveResult};
use crate::shelve::{validate_key_field, MongoShelve};
use mongodb::options::ClientOptions;
use mongodb::sync::Client;
use std::time::Duration;

pub const URI_ENV: &str = "MONGO_SHELVE_URI";
pub const DATABASE_ENV: &str = "MONGO_SHELVE_DATABASE";
pub const COLLECTION_ENV: &str = "MONGO_SHELVE_COLLECTION";
pub const KEY_FIELD_ENV: &str = "MONGO_SHELVE_KEY_FIELD";

/// Connection settings for a [`MongoShelve`] backed by a MongoDB server.
///
/// Setters can be chained. The first invalid value is kept and returned by
/// [`ShelveConfig::open`], so a chain never has to be checked step by step.
///
/// # Examples
///
/// ```rust,no_run
/// use mongo_shelve::mongo::ShelveConfig;
/// use std::time::Duration;
///
/// # fn main() -> mongo_shelve::errors::ShelveResult<()> {
/// let shelve = ShelveConfig::new()
///     .uri("mongodb://127.0.0.1:27017")
///     .database("hashes")
///     .collection("files")
///     .key_field("filename")
///     .server_selection_timeout(Duration::from_secs(5))
///     .open()?;
///
/// println!("{} holds {} entries", shelve, shelve.len()?);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ShelveConfig {
    error: Option<ShelveError>,
    uri: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    key_field: Option<String>,
    app_name: Option<String>,
    server_selection_timeout: Option<Duration>,
}

impl ShelveConfig {
    pub fn new() -> Self {
        ShelveConfig::default()
    }

    /// Reads `MONGO_SHELVE_URI`, `MONGO_SHELVE_DATABASE`,
    /// `MONGO_SHELVE_COLLECTION` and `MONGO_SHELVE_KEY_FIELD`.
    ///
    /// Unset variables leave the setting empty; setters called afterwards
    /// override what the environment provided.
    pub fn from_env() -> Self {
        let mut config = ShelveConfig::new();
        if let Ok(uri) = std::env::var(URI_ENV) {
            config = config.uri(&uri);
        }
        if let Ok(database) = std::env::var(DATABASE_ENV) {
            config = config.database(&database);
        }
        if let Ok(collection) = std::env::var(COLLECTION_ENV) {
            config = config.collection(&collection);
        }
        if let Ok(key_field) = std::env::var(KEY_FIELD_ENV) {
            config = config.key_field(&key_field);
        }
        config
    }

    pub fn uri(mut self, uri: &str) -> Self {
        if uri.trim().is_empty() {
            self.capture(invalid("Connection string must not be empty"));
        } else {
            self.uri = Some(uri.to_string());
        }
        self
    }

    pub fn database(mut self, database: &str) -> Self {
        if database.is_empty() {
            self.capture(invalid("Database name must not be empty"));
        } else {
            self.database = Some(database.to_string());
        }
        self
    }

    pub fn collection(mut self, collection: &str) -> Self {
        if collection.is_empty() {
            self.capture(invalid("Collection name must not be empty"));
        } else {
            self.collection = Some(collection.to_string());
        }
        self
    }

    /// Sets the key field; rejected with [`ErrorKind::InvalidFieldName`] under
    /// the same rules as [`MongoShelve::new`].
    pub fn key_field(mut self, key_field: &str) -> Self {
        match validate_key_field(key_field) {
            Ok(()) => self.key_field = Some(key_field.to_string()),
            Err(err) => self.capture(err),
        }
        self
    }

    /// Name reported to the server in its connection logs.
    pub fn app_name(mut self, app_name: &str) -> Self {
        self.app_name = Some(app_name.to_string());
        self
    }

    /// How long a request waits for a suitable server before failing.
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            self.capture(invalid("Server selection timeout must be positive"));
        } else {
            self.server_selection_timeout = Some(timeout);
        }
        self
    }

    /// Connects a client and returns a shelve over the configured collection.
    ///
    /// The driver connects lazily, so an unreachable server shows up on the
    /// first operation, not here.
    pub fn open(self) -> ShelveResult<MongoShelve> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let uri = required(self.uri, "connection string")?;
        let database = required(self.database, "database")?;
        let collection = required(self.collection, "collection")?;
        let key_field = required(self.key_field, "key field")?;

        let mut options = ClientOptions::parse(&uri).run().map_err(|e| {
            ShelveError::new_with_cause(
                &format!("Invalid connection string: {}", e),
                ErrorKind::InvalidConfiguration,
                e,
            )
        })?;
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }
        if self.server_selection_timeout.is_some() {
            options.server_selection_timeout = self.server_selection_timeout;
        }

        let client = Client::with_options(options).map_err(|e| {
            ShelveError::new_with_cause(
                &format!("Failed to create MongoDB client: {}", e),
                ErrorKind::StoreError,
                e,
            )
        })?;

        log::debug!("Opening shelve over {}.{} keyed by {}", database, collection, key_field);
        let backend = MongoCollection::from_client(&client, &database, &collection);
        MongoShelve::new(ShelfCollection::new(backend), &key_field)
    }

    fn capture(&mut self, err: ShelveError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn invalid(message: &str) -> ShelveError {
    ShelveError::new(message, ErrorKind::InvalidConfiguration)
}

fn required(value: Option<String>, what: &str) -> ShelveResult<String> {
    value.ok_or_else(|| invalid(&format!("No {} configured", what)))
}
