//! Tabular batch input.
//!
//! Layout: one task-id column, then three columns per required alias in
//! template alias order:
//! ```text
//! Task Unique ID (Optional) | <A> Site ID | <A> Global ID | <A> Site Name | <B> Site ID | ...
//! ```
//! The header is validated strictly. Rows never fail to decode: short rows
//! yield empty cells and bad values are left for alias resolution to report.

use crate::alias::SiteGroup;
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TASK_ID_COLUMN: &str = "Task Unique ID (Optional)";
const COLUMNS_PER_ALIAS: usize = 3;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

pub fn batch_header(aliases: &[String]) -> Vec<String> {
    let mut header = Vec::with_capacity(1 + COLUMNS_PER_ALIAS * aliases.len());
    header.push(TASK_ID_COLUMN.to_string());
    for alias in aliases {
        header.push(format!("{alias} Site ID"));
        header.push(format!("{alias} Global ID"));
        header.push(format!("{alias} Site Name"));
    }
    header
}

fn validate_header<S: AsRef<str>>(header: &[S], aliases: &[String]) -> Result<()> {
    let expected = batch_header(aliases);
    if header.len() != expected.len() {
        return Err(FlowError::MalformedHeader(format!(
            "expected {} columns (1 + 3 x {} aliases), found {}",
            expected.len(),
            aliases.len(),
            header.len()
        )));
    }
    for (i, (got, want)) in header.iter().zip(&expected).enumerate() {
        if !got.as_ref().trim().eq_ignore_ascii_case(want) {
            return Err(FlowError::MalformedHeader(format!(
                "column {} should be '{want}', found '{}'",
                i + 1,
                got.as_ref().trim()
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Display and audit data carried alongside a row; not used for resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDetails {
    pub site_id: String,
    pub global_id: String,
    pub site_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRow {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    pub group: SiteGroup,
    pub site_details: BTreeMap<String, SiteDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedBatch {
    pub rows: Vec<BatchRow>,
}

impl ParsedBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn groups(&self) -> Vec<SiteGroup> {
        self.rows.iter().map(|r| r.group.clone()).collect()
    }
}

/// Parse `table` (header first) against the template's required `aliases`.
///
/// Fully blank rows are skipped but still advance the row numbering, so row
/// numbers match the position in the caller's spreadsheet.
pub fn parse_batch<S: AsRef<str>>(table: &[Vec<S>], aliases: &[String]) -> Result<ParsedBatch> {
    let Some((header, body)) = table.split_first() else {
        return Err(FlowError::MalformedHeader("batch is empty".to_string()));
    };
    validate_header(header, aliases)?;

    let mut rows = Vec::new();
    for (i, cells) in body.iter().enumerate() {
        if cells.iter().all(|c| c.as_ref().trim().is_empty()) {
            continue;
        }
        rows.push(decode_row(i + 1, cells, aliases));
    }
    Ok(ParsedBatch { rows })
}

fn decode_row<S: AsRef<str>>(row: usize, cells: &[S], aliases: &[String]) -> BatchRow {
    let cell = |i: usize| -> String {
        cells
            .get(i)
            .map(|c| c.as_ref().trim().to_string())
            .unwrap_or_default()
    };

    let task_id = cell(0);
    let mut group = SiteGroup {
        client_task_id: (!task_id.is_empty()).then_some(task_id),
        ..SiteGroup::default()
    };
    let mut site_details = BTreeMap::new();

    for (n, alias) in aliases.iter().enumerate() {
        let base = 1 + n * COLUMNS_PER_ALIAS;
        let details = SiteDetails {
            site_id: cell(base),
            global_id: cell(base + 1),
            site_name: cell(base + 2),
        };
        group.sites.insert(alias.clone(), details.site_id.clone());
        site_details.insert(alias.clone(), details);
    }

    BatchRow {
        row,
        group,
        site_details,
    }
}

/// Read a CSV document into a table of cells. The header is returned as the
/// first row; rows may have differing lengths.
pub fn read_csv_table<R: std::io::Read>(reader: R) -> Result<Vec<Vec<String>>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut table = Vec::new();
    for record in csv.records() {
        let record = record?;
        table.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
