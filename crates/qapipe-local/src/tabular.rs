//! File-byte interpretation: spreadsheet grid, then delimited-text grid,
//! then plain text, then a binary notice.
//!
//! This is a total function over arbitrary bytes. Each attempt that fails
//! falls through to a less-structured representation; nothing here returns
//! an error, so the prompt always receives some context text.

use calamine::Reader;
use qapipe_core::FileOutcome;
use std::io::Cursor;

/// Character budget for the plain-text snippet.
pub const TEXT_SNIPPET_BUDGET: usize = 2000;

/// Data rows included in a tabular preview.
pub const PREVIEW_ROWS: usize = 50;

pub fn interpret_file_bytes(bytes: &[u8]) -> FileOutcome {
    if let Some(outcome) = try_spreadsheet(bytes) {
        return outcome;
    }
    if let Some(outcome) = try_delimited(bytes) {
        return outcome;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let (snippet, truncated) = truncate_chars(text, TEXT_SNIPPET_BUDGET);
            FileOutcome::PlainText { snippet, truncated }
        }
        Err(_) => FileOutcome::Binary {
            byte_count: bytes.len(),
        },
    }
}

/// First sheet of an xlsx/xls/ods workbook; first row is the header.
fn try_spreadsheet(bytes: &[u8]) -> Option<FileOutcome> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).ok()?;
    let range = workbook.worksheet_range_at(0)?.ok()?;

    let mut rows = range.rows();
    let columns: Vec<String> = rows.next()?.iter().map(|c| c.to_string()).collect();
    if columns.iter().all(|c| c.is_empty()) {
        return None;
    }
    let total_rows = range.height().saturating_sub(1);

    let mut preview = String::new();
    for row in rows.take(PREVIEW_ROWS) {
        let line = row
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        preview.push_str(&line);
        preview.push('\n');
    }

    Some(FileOutcome::Tabular {
        preview: preview.trim_end().to_string(),
        columns,
        total_rows,
    })
}

/// Comma-delimited grid. Strict about ragged rows: a parse error anywhere
/// means the bytes were not really a grid. A single-column "grid" is
/// indistinguishable from prose and falls through too.
fn try_delimited(bytes: &[u8]) -> Option<FileOutcome> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if columns.len() < 2 {
        return None;
    }

    let mut preview = String::new();
    let mut total_rows = 0usize;
    for record in reader.records() {
        let record = record.ok()?;
        if total_rows < PREVIEW_ROWS {
            let line = record
                .iter()
                .map(|f| f.trim())
                .collect::<Vec<_>>()
                .join(" | ");
            preview.push_str(&line);
            preview.push('\n');
        }
        total_rows += 1;
    }
    if total_rows == 0 {
        return None;
    }

    Some(FileOutcome::Tabular {
        preview: preview.trim_end().to_string(),
        columns,
        total_rows,
    })
}

fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    let mut out = String::new();
    for (n, ch) in s.chars().enumerate() {
        if n >= max_chars {
            return (out, true);
        }
        out.push(ch);
    }
    (out, false)
}
