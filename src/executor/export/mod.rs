//! Export of consolidated bins to compressed files
//!
//! The export system is built on three components:
//!
//! 1. **FormatWriter**: writes a bin's records as JSON Lines
//! 2. **Compressor**: turns the raw file into its `.gz` sibling
//! 3. **ManifestWriter**: appends one CSV row per exported file
//!
//! These are orchestrated by the **ExportCoordinator**, which walks the bins
//! in order and records per-bin failures without stopping the run.

pub mod coordinator;
pub mod manifest;
pub mod writers;

pub use coordinator::{BinFailure, BinOutcome, ExportCoordinator, ExportSummary};
pub use manifest::{MANIFEST_HEADER, ManifestEntry, ManifestWriter};
pub use writers::{Compressor, FormatWriter, GzipCompressor, JsonLWriter};
