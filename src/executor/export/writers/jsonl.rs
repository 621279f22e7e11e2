//! JSON Lines writer for export operations
//!
//! Each document is written as one relaxed Extended JSON object per line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{ExportError, Result};

use super::{FormatWriter, create_writer, validate_path};

/// Writer for JSON Lines format
pub struct JsonLWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Number of documents written
    written: usize,
}

impl JsonLWriter {
    /// Create a new JSON Lines writer, truncating any existing file.
    ///
    /// # Arguments
    /// * `path` - Output file path
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn new(path: &Path) -> Result<Self> {
        validate_path(path)?;
        let writer = create_writer(path).await?;

        debug!("Created JSON Lines writer for: {}", path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

/// Serialize one document as a single line of relaxed Extended JSON.
pub fn document_to_line(doc: &Document) -> Result<String> {
    let value = Bson::Document(doc.clone()).into_relaxed_extjson();
    Ok(serde_json::to_string(&value)?)
}

#[async_trait]
impl FormatWriter for JsonLWriter {
    async fn write_batch(&mut self, docs: &[Document]) -> Result<usize> {
        for doc in docs {
            let line = document_to_line(doc)?;

            self.writer.write_all(line.as_bytes()).await.map_err(|e| {
                ExportError::SerializeFailed(format!("Failed to write to file: {}", e))
            })?;
            self.writer.write_all(b"\n").await.map_err(|e| {
                ExportError::SerializeFailed(format!("Failed to write newline: {}", e))
            })?;
        }

        self.written += docs.len();
        debug!(
            "Wrote {} documents to JSON Lines (total: {})",
            docs.len(),
            self.written
        );

        Ok(docs.len())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(|e| {
            ExportError::SerializeFailed(format!("Failed to flush file: {}", e))
        })?;

        debug!(
            "Finalized JSON Lines file: {} ({} documents)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            ExportError::SerializeFailed(format!("Failed to get file metadata: {}", e))
        })?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{DateTime, doc, oid::ObjectId};
    use tokio::fs;

    #[tokio::test]
    async fn test_jsonl_writer_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ndjson");
        let mut writer = JsonLWriter::new(&path).await.unwrap();

        let docs = vec![
            doc! { "level": "info", "n": 1 },
            doc! { "level": "warn", "n": 2 },
        ];
        assert_eq!(writer.write_batch(&docs).await.unwrap(), 2);
        writer.write_batch(&[doc! { "n": 3 }]).await.unwrap();
        writer.finalize().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(!content.starts_with('['));
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.is_object());
        }
        assert_eq!(writer.written(), 3);
        assert!(writer.file_size().await.unwrap() > 0);
    }

    #[test]
    fn test_document_to_line_uses_relaxed_extjson() {
        let oid = ObjectId::parse_str("65f0c0ffee0000000000abcd").unwrap();
        let doc = doc! {
            "_id": oid,
            "ts": DateTime::from_millis(0),
            "count": 5_i64,
        };
        let line = document_to_line(&doc).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["_id"]["$oid"], "65f0c0ffee0000000000abcd");
        assert!(value["ts"]["$date"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
        assert_eq!(value["count"], 5);
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn test_jsonl_writer_invalid_directory() {
        let result = JsonLWriter::new(Path::new("/nonexistent/directory/file.ndjson")).await;
        assert!(result.is_err());
    }
}
