//! Terminal output for binexport
//!
//! This module provides:
//! - A table of the planned bins
//! - Planning and export statistics

pub mod stats;
pub mod table;

pub use stats::{StatsFormatter, format_bytes};
pub use table::{PlanTableFormatter, TableStyle};
