//! Ledger entry formats
//!
//! Three representations of the same entry set live on disk: a quoted CSV
//! file with a fixed header, a JSON array used for machine reads, and a
//! free-form text log. This crate only deals with text; file handling and
//! typed records live in `spendlog-core`.

pub mod error;
pub mod extract;
pub mod fields;
pub mod structured;
pub mod tabular;
pub mod textlog;
pub mod types;

pub use error::CodecError;
pub use extract::{extract_fields, first_balanced_object, parse_flat_object};
pub use fields::{format_date, format_time, parse_amount, parse_date, parse_time};
pub use types::RawEntry;
