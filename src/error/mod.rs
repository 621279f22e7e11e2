//! Error handling module for binexport.
//!
//! This module provides the error taxonomy used across the exporter:
//! - Configuration errors, fatal and reported before any remote call
//! - Query errors raised by the retry layer (timeouts, exhaustion)
//! - Export errors for a single bin (fetch, serialize, compress, manifest)
//! - Structured descriptions of MongoDB driver errors for diagnostics
//!
//! # Example
//!
//! ```rust,no_run
//! use binexport::error::{BinExportError, ConfigError, Result};
//!
//! fn check_ceiling(max_records: u64) -> Result<()> {
//!     if max_records == 0 {
//!         return Err(ConfigError::InvalidValue {
//!             field: "max_records_per_bin".to_string(),
//!             value: max_records.to_string(),
//!         }
//!         .into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod kinds;
pub mod mongo;

// Re-export commonly used types
pub use kinds::{
    BinExportError, ConfigError, ConnectionError, ExportError, QueryError, Result,
};
pub use mongo::{ErrorInfo, describe_mongodb_error};
