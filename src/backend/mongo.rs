//! MongoDB implementation of [`QueryBackend`].
//!
//! Every command is tagged with a unique `comment` so that a slow count or
//! fetch can be found in `$currentOp` and the server log, and carries a
//! `maxTimeMS` equal to the per-query timeout so the server gives up before
//! the client-side deadline fires.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{Bson, DateTime as BsonDateTime, Document, doc};
use tracing::debug;
use uuid::Uuid;

use crate::error::mongo::extract_error_info;
use crate::error::{BinExportError, QueryError, Result};
use crate::planner::TimeRange;

use super::QueryBackend;

/// Identifier attached to a single server command.
///
/// Format: `binexport-<client_id>-<uuid>`
#[derive(Debug, Clone)]
pub struct OperationTag {
    comment: String,
}

impl OperationTag {
    /// Create a tag with a globally unique comment.
    pub fn new(client_id: &str) -> Self {
        Self {
            comment: format!("binexport-{}-{}", client_id, Uuid::new_v4()),
        }
    }

    /// Comment string passed to the command options.
    pub fn comment(&self) -> &str {
        &self.comment
    }
}

/// Counts and fetches windows of a MongoDB collection.
pub struct MongoBackend {
    collection: Collection<Document>,
    table: String,
    time_field: String,
    filter: Option<Document>,
    query_timeout: Duration,
    client_id: String,
}

impl MongoBackend {
    /// Create a backend over `collection`.
    ///
    /// # Arguments
    /// * `collection` - Collection holding the dataset
    /// * `time_field` - Date field the windows are applied to
    /// * `filter` - Additional filter combined with the time predicate
    /// * `query_timeout` - Server-side `maxTimeMS` for every command
    pub fn new(
        collection: Collection<Document>,
        time_field: impl Into<String>,
        filter: Option<Document>,
        query_timeout: Duration,
    ) -> Self {
        let client_id = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "local".to_string());

        Self {
            table: collection.name().to_string(),
            collection,
            time_field: time_field.into(),
            filter: filter.filter(|f| !f.is_empty()),
            query_timeout,
            client_id,
        }
    }

    /// Filter selecting `[range.start, range.end)` plus the user filter.
    pub fn window_filter(&self, range: &TimeRange) -> Document {
        build_window_filter(&self.time_field, self.filter.as_ref(), range)
    }

    fn map_error(&self, operation: &str, err: mongodb::error::Error) -> BinExportError {
        if extract_error_info(&err).is_time_limit() {
            QueryError::Timeout {
                operation: operation.to_string(),
                limit: self.query_timeout,
            }
            .into()
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl QueryBackend for MongoBackend {
    async fn count(&self, range: &TimeRange) -> Result<u64> {
        let tag = OperationTag::new(&self.client_id);
        debug!("count {} on {} ({})", range, self.table, tag.comment());

        self.collection
            .count_documents(self.window_filter(range))
            .max_time(self.query_timeout)
            .comment(Bson::String(tag.comment().to_string()))
            .await
            .map_err(|e| self.map_error("count", e))
    }

    async fn fetch(&self, range: &TimeRange) -> Result<Vec<Document>> {
        let tag = OperationTag::new(&self.client_id);
        debug!("fetch {} from {} ({})", range, self.table, tag.comment());

        let mut sort = Document::new();
        sort.insert(self.time_field.clone(), 1);

        let cursor = self
            .collection
            .find(self.window_filter(range))
            .sort(sort)
            .max_time(self.query_timeout)
            .comment(Bson::String(tag.comment().to_string()))
            .await
            .map_err(|e| self.map_error("fetch", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| self.map_error("fetch", e))
    }

    fn table_name(&self) -> &str {
        &self.table
    }
}

/// Build `{field: {$gte: start, $lt: end}}`, joined with `filter` under `$and`.
pub fn build_window_filter(
    time_field: &str,
    filter: Option<&Document>,
    range: &TimeRange,
) -> Document {
    let bounds = doc! {
        "$gte": BsonDateTime::from_millis(range.start().timestamp_millis()),
        "$lt": BsonDateTime::from_millis(range.end().timestamp_millis()),
    };
    let mut window = Document::new();
    window.insert(time_field.to_string(), bounds);

    match filter {
        Some(extra) if !extra.is_empty() => doc! { "$and": [extra.clone(), window] },
        _ => window,
    }
}
