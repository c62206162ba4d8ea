//! Wire-level entry shape shared by every format

use serde::{Deserialize, Serialize};

/// Column names, in on-disk order
pub const COLUMNS: [&str; 6] = ["category", "product", "price", "date", "time", "remark"];

/// One ledger entry as text, before any field is interpreted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub category: String,
    pub product: String,
    pub price: String,
    pub date: String,
    pub time: String,
    pub remark: String,
}

impl RawEntry {
    /// Build from positional cells; missing trailing cells become empty
    pub fn from_cells<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut it = cells.into_iter().map(|c| c.trim().to_string());
        RawEntry {
            category: it.next().unwrap_or_default(),
            product: it.next().unwrap_or_default(),
            price: it.next().unwrap_or_default(),
            date: it.next().unwrap_or_default(),
            time: it.next().unwrap_or_default(),
            remark: it.next().unwrap_or_default(),
        }
    }

    pub fn cells(&self) -> [&str; 6] {
        [
            &self.category,
            &self.product,
            &self.price,
            &self.date,
            &self.time,
            &self.remark,
        ]
    }
}
