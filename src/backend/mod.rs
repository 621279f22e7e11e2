//! Query backend abstraction
//!
//! The exporter only ever asks two questions of the store: how many records
//! fall in a window, and what those records are. [`QueryBackend`] captures
//! exactly that so the planner and export stages can run against MongoDB or
//! against a synthetic backend in tests.

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::Result;
use crate::planner::TimeRange;

pub mod mongo;

pub use mongo::{MongoBackend, OperationTag};

/// A time-indexed dataset that can be counted and fetched by window.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Number of records in `[range.start, range.end)` matching the filter.
    async fn count(&self, range: &TimeRange) -> Result<u64>;

    /// All records in `[range.start, range.end)` matching the filter, in time order.
    async fn fetch(&self, range: &TimeRange) -> Result<Vec<Document>>;

    /// Table name used in output file names and manifest rows.
    fn table_name(&self) -> &str;
}
