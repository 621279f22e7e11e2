use std::time::Duration;
use std::{fmt, io};

use crate::error::mongo::describe_mongodb_error;

/// Crate-wide `Result` type using [`BinExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, BinExportError>;

/// Top-level error type for binexport operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum BinExportError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Configuration errors. Always fatal, raised before planning.
    Config(ConfigError),

    /// Remote query errors surfaced by the retry layer.
    Query(QueryError),

    /// Per-bin export errors.
    Export(ExportError),

    /// I/O errors.
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// Not currently connected to MongoDB.
    NotConnected,

    /// Ping command failed.
    PingFailed(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Requested range starts after it ends.
    InvalidRange { start: String, end: String },

    /// Output directory cannot be created or written.
    OutputDirectory(String),

    /// Free-form configuration error.
    Generic(String),
}

/// Errors raised while running a remote operation under the retry policy.
#[derive(Debug)]
pub enum QueryError {
    /// A single attempt exceeded its hard deadline.
    Timeout { operation: String, limit: Duration },

    /// The isolated worker running an attempt panicked or was cancelled.
    TaskFailed(String),

    /// Every attempt failed.
    Exhausted {
        operation: String,
        attempts: u32,
        last_error: Box<BinExportError>,
    },
}

/// Errors that fail a single bin during export.
#[derive(Debug)]
pub enum ExportError {
    /// Records could not be fetched.
    FetchFailed(String),

    /// Records could not be serialized to the raw file.
    SerializeFailed(String),

    /// Gzip compression failed.
    CompressFailed(String),

    /// Compression produced an empty file.
    EmptyOutput(String),

    /// Manifest row could not be appended.
    ManifestFailed(String),
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for BinExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinExportError::Connection(e) => write!(f, "Connection error: {e}"),
            BinExportError::Config(e) => write!(f, "Configuration error: {e}"),
            BinExportError::Query(e) => write!(f, "Query error: {e}"),
            BinExportError::Export(e) => write!(f, "Export error: {e}"),
            BinExportError::Io(e) => write!(f, "I/O error: {e}"),
            BinExportError::MongoDb(e) => {
                write!(f, "MongoDB error: {}", describe_mongodb_error(e))
            }
            BinExportError::Json(e) => write!(f, "JSON error: {e}"),
            BinExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::NotConnected => write!(f, "Not connected to MongoDB"),
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::InvalidRange { start, end } => {
                write!(f, "Start time {start} is after end time {end}")
            }
            ConfigError::OutputDirectory(msg) => write!(f, "Output directory unusable: {msg}"),
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Timeout { operation, limit } => {
                write!(f, "{operation} timed out after {} ms", limit.as_millis())
            }
            QueryError::TaskFailed(msg) => write!(f, "Query worker failed: {msg}"),
            QueryError::Exhausted {
                operation,
                attempts,
                last_error,
            } => write!(
                f,
                "{operation} failed after {attempts} attempt(s): {last_error}"
            ),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::FetchFailed(msg) => write!(f, "Fetch failed: {msg}"),
            ExportError::SerializeFailed(msg) => write!(f, "Serialization failed: {msg}"),
            ExportError::CompressFailed(msg) => write!(f, "Compression failed: {msg}"),
            ExportError::EmptyOutput(path) => {
                write!(f, "Compressed output is empty: {path}")
            }
            ExportError::ManifestFailed(msg) => write!(f, "Manifest update failed: {msg}"),
        }
    }
}

impl std::error::Error for BinExportError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for QueryError {}
impl std::error::Error for ExportError {}

/* ========================= Conversions to BinExportError ========================= */

impl From<io::Error> for BinExportError {
    fn from(err: io::Error) -> Self {
        BinExportError::Io(err)
    }
}

impl From<mongodb::error::Error> for BinExportError {
    fn from(err: mongodb::error::Error) -> Self {
        BinExportError::MongoDb(err)
    }
}

impl From<serde_json::Error> for BinExportError {
    fn from(err: serde_json::Error) -> Self {
        BinExportError::Json(err)
    }
}

impl From<ConnectionError> for BinExportError {
    fn from(err: ConnectionError) -> Self {
        BinExportError::Connection(err)
    }
}

impl From<ConfigError> for BinExportError {
    fn from(err: ConfigError) -> Self {
        BinExportError::Config(err)
    }
}

impl From<QueryError> for BinExportError {
    fn from(err: QueryError) -> Self {
        BinExportError::Query(err)
    }
}

impl From<ExportError> for BinExportError {
    fn from(err: ExportError) -> Self {
        BinExportError::Export(err)
    }
}

impl From<String> for BinExportError {
    fn from(msg: String) -> Self {
        BinExportError::Generic(msg)
    }
}

impl From<&str> for BinExportError {
    fn from(msg: &str) -> Self {
        BinExportError::Generic(msg.to_owned())
    }
}
