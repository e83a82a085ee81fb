//! Compiled report of extracted receipt data

mod bundle;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::batch::ProcessResult;
use crate::naming::{ReceiptField, ERROR_DETAILS_KEY, FILE_NAME_KEY};

pub use bundle::ZipBundle;

/// Report file written into the save folder
pub const REPORT_FILE_NAME: &str = "compiled_receipts.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Csv,
    /// Do not write a report
    #[value(name = "none")]
    Disabled,
}

/// Rows of string cells under named columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row` in column `name`; empty if the column is absent
    pub fn cell(&self, row: usize, name: &str) -> &str {
        self.column_index(name)
            .and_then(|i| self.rows.get(row)?.get(i))
            .map_or("", String::as_str)
    }

    /// Append `other` below `self`. Columns are the union of both, in
    /// first-seen order; cells a row does not have are left empty.
    pub fn append(mut self, other: &Table) -> Table {
        for column in &other.columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
            }
        }
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        for r in 0..other.rows.len() {
            let row: Vec<String> = self.columns.iter().map(|c| other.cell(r, c).to_string()).collect();
            self.rows.push(row);
        }
        self
    }
}

/// Build the report table for a batch.
///
/// `File Name` holds the name the file ended up with. `Error Details` is
/// only added when at least one file failed extraction.
pub fn compile(results: &[ProcessResult]) -> Table {
    let mut columns: Vec<String> = ReceiptField::ALL
        .iter()
        .map(|f| f.key().to_string())
        .chain([FILE_NAME_KEY.to_string()])
        .collect();
    if results.iter().any(|r| r.fields.is_error()) {
        columns.push(ERROR_DETAILS_KEY.to_string());
    }

    let rows = results
        .iter()
        .map(|result| {
            columns
                .iter()
                .map(|column| {
                    if column == FILE_NAME_KEY {
                        result.final_name()
                    } else {
                        result.fields.get(column).unwrap_or_default().to_string()
                    }
                })
                .collect()
        })
        .collect();

    Table { columns, rows }
}

/// Read a CSV file written by [`write_csv`] (or edited by hand)
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open report {path:?}"))?;

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to read report {path:?}"))?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    Ok(Table { columns, rows })
}

/// Write `table` to `path`, appending to the rows already there.
///
/// Returns whether an existing report was appended to.
pub fn write_csv(path: &Path, table: &Table) -> Result<bool> {
    let (merged, appended) = if path.exists() {
        (read_csv(path)?.append(table), true)
    } else {
        (table.clone(), false)
    };

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to write {path:?}. Is it open in another program?"))?;
    writer.write_record(&merged.columns)?;
    for row in &merged.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    info!(path = ?path, rows = table.rows.len(), appended, "Saved report");
    Ok(appended)
}
