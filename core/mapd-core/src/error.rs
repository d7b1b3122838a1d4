//! Error types for the mapd client.
//!
//! All public APIs return `MapdResult<T>`: no panics in library code.
//! Every error here is a deterministic function of its inputs; nothing is
//! retried inside the crate.

use thiserror::Error;

/// Category of a server-reported fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    /// The referenced object (table, shared-memory key, dashboard) does not exist
    NotFound,
    /// A dataframe handle was released twice or was never allocated
    AlreadyReleased,
    /// SQL or API usage error reported by the server
    Programming,
    /// Anything else
    Internal,
}

impl ServerErrorKind {
    /// Classify a server message. The message itself is kept verbatim by the caller.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("not bookkept") || lower.contains("inserted twice") {
            ServerErrorKind::AlreadyReleased
        } else if lower.contains("shm")
            || lower.contains("shared memory key")
            || lower.contains("does not exist")
            || lower.contains("not found")
        {
            ServerErrorKind::NotFound
        } else if lower.starts_with("exception:")
            || lower.contains("syntax error")
            || lower.contains("sql error")
        {
            ServerErrorKind::Programming
        } else {
            ServerErrorKind::Internal
        }
    }
}

impl std::fmt::Display for ServerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerErrorKind::NotFound => "not found",
            ServerErrorKind::AlreadyReleased => "already released",
            ServerErrorKind::Programming => "programming",
            ServerErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Unified error type for all client operations.
#[derive(Debug, Error)]
pub enum MapdError {
    /// Column type has no catalog entry
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Supplied data does not match the target schema
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Value cannot be coerced into its column type (range, scale, parse)
    #[error("value error: {0}")]
    Value(String),

    /// Shared-memory handle does not resolve to a live segment
    #[error("invalid shared memory handle: {0}")]
    InvalidHandle(String),

    /// Malformed or out-of-order columnar stream
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// Fault reported by the server, message preserved verbatim
    #[error("server error ({kind}): {message}")]
    Server {
        kind: ServerErrorKind,
        message: String,
    },

    /// Transport-level failure (connection refused, broken pipe, ...)
    #[error("operational error: {0}")]
    Operational(String),

    /// Incorrect use of the client API
    #[error("interface error: {0}")]
    Interface(String),

    /// Feature not available in this build or on this platform
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Apache Arrow error (RecordBatch construction, IPC writing)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON / base64 (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for all client operations.
pub type MapdResult<T> = Result<T, MapdError>;

impl MapdError {
    /// Build a server error, classifying it from the message text.
    pub fn server(message: impl Into<String>) -> Self {
        let message = message.into();
        MapdError::Server {
            kind: ServerErrorKind::classify(&message),
            message,
        }
    }

    /// Server category, if this is a server-reported fault.
    pub fn server_kind(&self) -> Option<ServerErrorKind> {
        match self {
            MapdError::Server { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MapdError {
    fn from(err: serde_json::Error) -> Self {
        MapdError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for MapdError {
    fn from(err: base64::DecodeError) -> Self {
        MapdError::Serialization(err.to_string())
    }
}
