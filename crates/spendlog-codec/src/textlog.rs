//! Plain-text audit log lines

use crate::types::RawEntry;

/// One human-readable line per entry, newline included
pub fn format_line(row: &RawEntry) -> String {
    let mut line = format!(
        "{} {} [{}] {} {}",
        row.date, row.time, row.category, row.product, row.price
    );
    if !row.remark.is_empty() && row.remark != row.product {
        line.push_str(" - ");
        line.push_str(&row.remark.replace(['\r', '\n'], " "));
    }
    line.push('\n');
    line
}

pub fn format_lines(rows: &[RawEntry]) -> String {
    rows.iter().map(format_line).collect()
}
