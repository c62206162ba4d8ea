//! Ledger persistence, summaries and recurring-charge detection

pub mod completion;
pub mod error;
pub mod ingest;
pub mod models;
pub mod periodic;
pub mod store;
pub mod summary;
pub mod time;

pub use completion::OllamaCompletion;
pub use error::{CoreError, CoreResult, ErrorCode, ErrorDetails, ErrorSeverity};
pub use ingest::{CompletionRef, Ingestor, TextCompletion};
pub use models::{entry_id, EntryKey, Flow, LedgerRecord, RecordPatch};
pub use periodic::{detect, DetectOptions, PeriodicCandidate};
pub use store::{ImportReport, LedgerStore, Mutation, StorePaths};
pub use summary::{CategoryTotal, Overview, Summary, SummaryEngine, SummaryKind};
pub use time::{resolve_window, Period, Window};
