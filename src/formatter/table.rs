//! Table formatting for planned bins using tabled
//!
//! One row per consolidated bin, with a trailing total row.

use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Columns, object::Rows},
};

use crate::planner::ConsolidatedBin;
use crate::utils::time::{format_duration, to_iso8601};

/// Available table styles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    /// Modern style with box drawing characters
    Modern,
    /// ASCII style with basic characters
    Ascii,
    /// Markdown style
    Markdown,
}

/// Table formatter for a bin plan
pub struct PlanTableFormatter {
    /// Table style
    style: TableStyle,
}

impl PlanTableFormatter {
    pub fn new() -> Self {
        Self {
            style: TableStyle::Modern,
        }
    }

    /// Set the table style
    pub fn with_style(mut self, style: TableStyle) -> Self {
        self.style = style;
        self
    }

    /// Render `bins` as a table
    ///
    /// # Arguments
    /// * `bins` - Bins in export order
    ///
    /// # Returns
    /// * `String` - Table, or a short note when there are no bins
    pub fn format(&self, bins: &[ConsolidatedBin]) -> String {
        if bins.is_empty() {
            return "(no bins planned)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Start", "End", "Width", "Records"]);

        for (index, bin) in bins.iter().enumerate() {
            builder.push_record([
                (index + 1).to_string(),
                to_iso8601(&bin.start()),
                to_iso8601(&bin.end()),
                format_duration(bin.range.width()),
                bin.count.to_string(),
            ]);
        }

        let total: u64 = bins.iter().map(|b| b.count).sum();
        builder.push_record([
            String::new(),
            String::new(),
            String::new(),
            "total".to_string(),
            total.to_string(),
        ]);

        let mut table = builder.build();
        self.apply_style(&mut table);
        table.with(Modify::new(Rows::first()).with(Alignment::center()));
        table.with(Modify::new(Columns::last()).with(Alignment::right()));

        table.to_string()
    }

    /// Apply table style
    fn apply_style(&self, table: &mut Table) {
        match self.style {
            TableStyle::Modern => table.with(Style::modern()),
            TableStyle::Ascii => table.with(Style::ascii()),
            TableStyle::Markdown => table.with(Style::markdown()),
        };
    }
}

impl Default for PlanTableFormatter {
    fn default() -> Self {
        Self::new()
    }
}
