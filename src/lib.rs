//! binexport library
//!
//! Exports a time-indexed MongoDB collection as a sequence of size-bounded,
//! gzip-compressed JSON Lines files plus a CSV manifest. The requested range
//! is bisected until every bin holds at most a configured number of records,
//! adjacent small bins are merged back together, and each bin is fetched,
//! written and compressed on its own.
//!
//! # Modules
//!
//! - `backend`: Count/fetch abstraction and the MongoDB implementation
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: MongoDB connection management
//! - `error`: Error types and handling
//! - `executor`: Retry, counting, export and the run pipeline
//! - `formatter`: Plan tables and run statistics
//! - `planner`: Time ranges, bisection planner and consolidation
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use binexport::backend::MongoBackend;
//! use binexport::config::{Config, ExportSettings};
//! use binexport::connection::ConnectionManager;
//! use binexport::executor::ExportPipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.export.database = Some("telemetry".to_string());
//!     config.export.collection = Some("events".to_string());
//!     config.export.start = Some("2024-01-01T00:00:00Z".to_string());
//!     config.export.end = Some("2024-01-08T00:00:00Z".to_string());
//!     let settings = ExportSettings::resolve(&config)?;
//!
//!     let mut manager = ConnectionManager::new(config.connection.clone());
//!     manager.connect().await?;
//!     let collection = manager.get_collection(&settings.database, &settings.collection)?;
//!     let backend = MongoBackend::new(
//!         collection,
//!         settings.time_field.clone(),
//!         settings.filter.clone(),
//!         settings.retry.timeout,
//!     );
//!
//!     let report = ExportPipeline::new(Arc::new(backend), settings).run().await?;
//!     println!("{} bins exported", report.consolidated_bins.len());
//!
//!     manager.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod planner;
pub mod utils;

// Re-export commonly used types
pub use backend::{MongoBackend, QueryBackend};
pub use config::{Config, ExportSettings};
pub use connection::ConnectionManager;
pub use error::{BinExportError, Result};
pub use executor::{ExportPipeline, RunReport};
pub use planner::{BinPlanner, ConsolidatedBin, TimeRange, consolidate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
