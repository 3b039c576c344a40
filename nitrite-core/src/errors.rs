use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Classifies every failure the engine can surface.
///
/// The first four variants are the base kinds callers usually match on.
/// The lifecycle variants (`CollectionClosed`, `CollectionDropped`, `StoreClosed`)
/// are all invalid operations, but are kept apart so a caller can tell a
/// recoverable state (reopen) from a terminal one (dropped).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Missing, duplicate or malformed document id.
    InvalidId,
    /// Index already exists or is building, or a unique constraint was violated.
    IndexingError,
    /// Backend read/write failure.
    IOError,
    /// Operation not allowed in the current state, or bad argument.
    InvalidOperation,

    // lifecycle
    CollectionClosed,
    CollectionDropped,
    StoreClosed,

    EventError,
    ValidationError,
    InternalError,
}

impl ErrorKind {
    /// Returns `true` for every kind that means "this operation cannot run right now".
    pub fn is_invalid_operation(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidOperation
                | ErrorKind::CollectionClosed
                | ErrorKind::CollectionDropped
                | ErrorKind::StoreClosed
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::CollectionClosed => write!(f, "Collection closed"),
            ErrorKind::CollectionDropped => write!(f, "Collection dropped"),
            ErrorKind::StoreClosed => write!(f, "Store closed"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The single error type of the crate.
///
/// A backtrace is captured unresolved at construction and symbolized lazily
/// the first time the error is debug-printed.
#[derive(Clone)]
pub struct NitriteError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<NitriteError>>,
    backtrace: Atomic<Backtrace>,
}

impl NitriteError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        NitriteError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: NitriteError) -> Self {
        NitriteError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&NitriteError> {
        self.cause.as_deref()
    }

    /// Walks the cause chain and returns the innermost error.
    pub fn root_cause(&self) -> &NitriteError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for NitriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for NitriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "[{}] {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "[{}] {}\n{:?}", self.error_kind, self.message, *backtrace)
            }
        }
    }
}

impl Error for NitriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

pub type NitriteResult<T> = Result<T, NitriteError>;

impl From<std::io::Error> for NitriteError {
    fn from(err: std::io::Error) -> Self {
        NitriteError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<String> for NitriteError {
    fn from(msg: String) -> Self {
        NitriteError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for NitriteError {
    fn from(msg: &str) -> Self {
        NitriteError::new(msg, ErrorKind::InternalError)
    }
}
