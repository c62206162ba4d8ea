//! Quoted CSV representation with a fixed six-column header

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Trim, WriterBuilder};

use crate::error::CodecError;
use crate::types::{RawEntry, COLUMNS};

/// Header cells recognised when skipping the first row of a file
const HEADER_ALIASES: [&str; 3] = ["category", "类别", "分类"];

fn write_rows<'a, I>(rows: I, with_header: bool) -> Result<String, CodecError>
where
    I: IntoIterator<Item = &'a RawEntry>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        writer.write_record(COLUMNS)?;
    }
    for row in rows {
        writer.write_record(row.cells())?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CodecError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| CodecError::SyntaxError {
        location: "csv".to_string(),
        message: e.to_string(),
    })
}

/// Encode a whole file: header line followed by one line per entry
pub fn encode(rows: &[RawEntry]) -> Result<String, CodecError> {
    write_rows(rows, true)
}

/// Encode just the header line, for a freshly created file
pub fn encode_header() -> Result<String, CodecError> {
    write_rows(std::iter::empty(), true)
}

/// Encode a single data line, newline included
pub fn encode_row(row: &RawEntry) -> Result<String, CodecError> {
    write_rows(std::iter::once(row), false)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|cell| {
            let cell = cell.trim_start_matches('\u{feff}').trim().to_lowercase();
            HEADER_ALIASES.contains(&cell.as_str())
        })
        .unwrap_or(false)
}

/// Decode CSV text into entries
///
/// The header row (if any) is skipped and blank lines are ignored. A row the
/// CSV reader cannot decode comes back as an error in its slot so callers can
/// count it without aborting the rest of the file.
pub fn decode(content: &str) -> Vec<Result<RawEntry, CodecError>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                if index == 0 && is_header(&record) {
                    continue;
                }
                if record.iter().all(|cell| cell.is_empty()) {
                    continue;
                }
                rows.push(Ok(RawEntry::from_cells(record.iter())));
            }
            Err(e) => {
                log::debug!("csv row {} unreadable: {}", index + 1, e);
                rows.push(Err(CodecError::from(e)));
            }
        }
    }
    rows
}
