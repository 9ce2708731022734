use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for shelve operations.
///
/// Each kind names a category of failure so callers can branch on it without
/// parsing messages. Only [`ErrorKind::NotFound`] is ever recovered from
/// inside the crate (by `MongoShelve::contains`).
///
/// # Examples
///
/// ```rust
/// use mongo_shelve::errors::{ErrorKind, ShelveError, ShelveResult};
///
/// fn lookup() -> ShelveResult<()> {
///     Err(ShelveError::new("Key 'Ann' not found", ErrorKind::NotFound))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::NotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// No document is stored under the requested key
    NotFound,
    /// A single-key operation affected more than one document, so the key
    /// field is not actually unique in the collection
    InvariantViolation,
    /// A document met during iteration has no value for the key field
    MissingKeyField,
    /// The key field name cannot be used for lookups
    InvalidFieldName,
    /// The store rejected a write because of a duplicate unique value
    UniqueConstraintViolation,
    /// A filter or update document could not be evaluated
    FilterError,
    /// Connection settings are missing or malformed
    InvalidConfiguration,
    /// Any other failure reported by the underlying store client
    StoreError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::InvariantViolation => write!(f, "Invariant violation"),
            ErrorKind::MissingKeyField => write!(f, "Missing key field"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::InvalidConfiguration => write!(f, "Invalid configuration"),
            ErrorKind::StoreError => write!(f, "Store error"),
        }
    }
}

/// Error type for every fallible shelve operation.
///
/// A `ShelveError` carries a message, an [`ErrorKind`], an optional cause and
/// a backtrace captured at construction. Store client errors are kept as the
/// cause so their diagnostics reach the caller untouched through
/// [`Error::source`].
///
/// The backtrace is captured unresolved and only symbolized when the error is
/// debug-printed, since `NotFound` errors are created on ordinary lookups.
#[derive(Clone)]
pub struct ShelveError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Arc<dyn Error + Send + Sync + 'static>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl ShelveError {
    /// Creates a new `ShelveError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        ShelveError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `ShelveError` wrapping the error that caused it.
    ///
    /// The cause is reachable through [`Error::source`] and printed by the
    /// `Debug` implementation.
    pub fn new_with_cause<E>(message: &str, error_kind: ErrorKind, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        ShelveError {
            message: message.to_string(),
            error_kind,
            cause: Some(Arc::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Returns `true` if this error reports an absent key.
    pub fn is_not_found(&self) -> bool {
        self.error_kind == ErrorKind::NotFound
    }
}

impl Display for ShelveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for ShelveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, backtrace)
            }
        }
    }
}

impl Error for ShelveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref() as &(dyn Error + 'static)),
            None => None,
        }
    }
}

/// A result type alias for shelve operations.
pub type ShelveResult<T> = Result<T, ShelveError>;

impl From<regex::Error> for ShelveError {
    fn from(err: regex::Error) -> Self {
        ShelveError::new_with_cause(
            &format!("Invalid regular expression in filter: {}", err),
            ErrorKind::FilterError,
            err,
        )
    }
}
