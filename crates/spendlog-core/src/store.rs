//! File-backed ledger store
//!
//! The full entry set is kept in three files that are written together: a
//! quoted CSV table, a JSON array and a plain-text log. Reads prefer the JSON
//! file and fall back to the CSV table when it is missing or empty.
//!
//! Updates and deletes rewrite all three files from a fresh snapshot. Each
//! file is replaced through a temporary file and a rename, but the three
//! replacements are not one transaction: a crash between them leaves the
//! files disagreeing until the next mutation. The JSON file is always written
//! first so the representation read back is the newest one.
//!
//! One `LedgerStore` must be the only writer of its directory. Within a
//! process, mutations hold the write half of an internal lock and reads hold
//! the read half; there is no locking across processes.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use spendlog_codec::{structured, tabular, textlog, RawEntry};
use spendlog_config::Config;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{CoreError, CoreResult};
use crate::models::{EntryKey, LedgerRecord, RecordPatch};
use crate::time::now_minute;

/// Locations of the three ledger representations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub tabular: PathBuf,
    pub structured: PathBuf,
    pub text_log: PathBuf,
}

impl StorePaths {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tabular: config.tabular_path(),
            structured: config.structured_path(),
            text_log: config.text_log_path(),
        }
    }

    /// Default file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            tabular: dir.join("ledger.csv"),
            structured: dir.join("ledger.json"),
            text_log: dir.join("ledger.log"),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.tabular, &self.structured, &self.text_log]
    }
}

/// What `replace_matching` does to each matched record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Update(RecordPatch),
    Delete,
}

/// Outcome of a batch import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub entries_imported: usize,
    pub entries_skipped: usize,
}

pub struct LedgerStore {
    paths: StorePaths,
    lock: RwLock<()>,
}

impl LedgerStore {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            lock: RwLock::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(StorePaths::from_config(config))
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    // The guarded value is `()`, so a poisoned lock carries no broken state.
    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(|e| e.into_inner())
    }

    // ==================== Reads ====================

    /// Load every record
    pub fn read_all(&self) -> CoreResult<Vec<LedgerRecord>> {
        let _guard = self.read_guard();
        self.load_snapshot(now_minute())
    }

    /// Records dated inside `[start, end]`, ordered by date then time
    pub fn read_range(&self, start: NaiveDate, end: NaiveDate) -> CoreResult<Vec<LedgerRecord>> {
        let mut records: Vec<LedgerRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect();
        records.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        Ok(records)
    }

    fn load_snapshot(&self, now: NaiveDateTime) -> CoreResult<Vec<LedgerRecord>> {
        let rows = match self.read_structured()? {
            Some(rows) if !rows.is_empty() => rows,
            _ => self.read_tabular()?,
        };
        Ok(rows
            .iter()
            .map(|raw| LedgerRecord::from_raw_lenient(raw, now))
            .collect())
    }

    fn read_structured(&self) -> CoreResult<Option<Vec<RawEntry>>> {
        let path = &self.paths.structured;
        let Some(content) = read_if_exists(path)? else {
            return Ok(None);
        };
        match structured::decode(&content) {
            Ok(rows) => Ok(Some(rows)),
            Err(e) => {
                log::warn!("{} is unreadable ({}), falling back to the table", path.display(), e);
                Ok(None)
            }
        }
    }

    fn read_tabular(&self) -> CoreResult<Vec<RawEntry>> {
        let path = &self.paths.tabular;
        let Some(content) = read_if_exists(path)? else {
            return Ok(Vec::new());
        };
        let mut rows = Vec::new();
        for result in tabular::decode(&content) {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => log::warn!("skipping unreadable row in {}: {}", path.display(), e),
            }
        }
        Ok(rows)
    }

    // ==================== Mutations ====================

    /// Append one record to all three representations
    pub fn append(&self, record: &LedgerRecord) -> CoreResult<()> {
        let _guard = self.write_guard();
        self.append_records(std::slice::from_ref(record))?;
        log::info!("appended entry {}", record.id());
        Ok(())
    }

    fn append_records(&self, records: &[LedgerRecord]) -> CoreResult<()> {
        self.ensure_dir()?;
        let mut snapshot = self.load_snapshot(now_minute())?;
        snapshot.extend_from_slice(records);
        let raws: Vec<RawEntry> = records.iter().map(LedgerRecord::to_raw).collect();

        let all: Vec<RawEntry> = snapshot.iter().map(LedgerRecord::to_raw).collect();
        write_atomic(&self.paths.structured, &structured::encode(&all)?)?;

        let mut table = String::new();
        if is_missing_or_empty(&self.paths.tabular) {
            table.push_str(&tabular::encode_header()?);
        }
        for raw in &raws {
            table.push_str(&tabular::encode_row(raw)?);
        }
        append_text(&self.paths.tabular, &table)?;
        append_text(&self.paths.text_log, &textlog::format_lines(&raws))?;
        Ok(())
    }

    /// Apply `mutation` to every record matched by `key` and rewrite the store
    ///
    /// Returns how many records were affected; zero leaves the files untouched.
    /// Records sharing date, category and product are indistinguishable by
    /// id, so all of them are affected.
    pub fn replace_matching(&self, key: &EntryKey, mutation: &Mutation) -> CoreResult<usize> {
        let _guard = self.write_guard();
        let snapshot = self.load_snapshot(now_minute())?;

        let mut affected = 0;
        let mut next = Vec::with_capacity(snapshot.len());
        for mut record in snapshot {
            if !key.matches(&record) {
                next.push(record);
                continue;
            }
            affected += 1;
            match mutation {
                Mutation::Update(patch) => {
                    patch.apply(&mut record);
                    next.push(record);
                }
                Mutation::Delete => {}
            }
        }

        if affected == 0 {
            log::debug!("no entry matched {:?}", key);
            return Ok(0);
        }

        self.write_snapshot(&next)?;
        log::info!("{:?} applied to {} entries", mutation, affected);
        Ok(affected)
    }

    pub fn update(&self, id: &str, patch: &RecordPatch) -> CoreResult<usize> {
        let key = EntryKey::parse(id)?;
        self.replace_matching(&key, &Mutation::Update(patch.clone()))
    }

    pub fn delete(&self, id: &str) -> CoreResult<usize> {
        let key = EntryKey::parse(id)?;
        self.replace_matching(&key, &Mutation::Delete)
    }

    fn write_snapshot(&self, records: &[LedgerRecord]) -> CoreResult<()> {
        self.ensure_dir()?;
        let raws: Vec<RawEntry> = records.iter().map(LedgerRecord::to_raw).collect();
        write_atomic(&self.paths.structured, &structured::encode(&raws)?)?;
        write_atomic(&self.paths.tabular, &tabular::encode(&raws)?)?;
        write_atomic(&self.paths.text_log, &textlog::format_lines(&raws))?;
        Ok(())
    }

    // ==================== Import / export ====================

    /// Import external rows; rows missing a required field are skipped and counted
    pub fn import_batch<I>(&self, rows: I) -> CoreResult<ImportReport>
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let now = now_minute();
        let mut report = ImportReport::default();
        let mut accepted = Vec::new();

        for (index, raw) in rows.into_iter().enumerate() {
            match LedgerRecord::from_import(&raw, now) {
                Some(record) => accepted.push(record),
                None => {
                    log::debug!("import row {} skipped: {:?}", index + 1, raw);
                    report.entries_skipped += 1;
                }
            }
        }

        if !accepted.is_empty() {
            let _guard = self.write_guard();
            self.append_records(&accepted)?;
        }
        report.entries_imported = accepted.len();
        log::info!(
            "import finished: {} imported, {} skipped",
            report.entries_imported,
            report.entries_skipped
        );
        Ok(report)
    }

    /// Import a CSV file laid out like the ledger table
    pub fn import_file(&self, path: &Path) -> CoreResult<ImportReport> {
        let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let mut unreadable = 0;
        let rows: Vec<RawEntry> = tabular::decode(&content)
            .into_iter()
            .filter_map(|row| row.map_err(|_| unreadable += 1).ok())
            .collect();

        let mut report = self.import_batch(rows)?;
        report.entries_skipped += unreadable;
        Ok(report)
    }

    /// Write the current snapshot in the ledger table format to `path`
    pub fn export_tabular(&self, path: &Path) -> CoreResult<usize> {
        let records = self.read_all()?;
        let raws: Vec<RawEntry> = records.iter().map(LedgerRecord::to_raw).collect();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        write_atomic(path, &tabular::encode(&raws)?)?;
        Ok(raws.len())
    }

    fn ensure_dir(&self) -> CoreResult<()> {
        for path in self.paths.all() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
            }
        }
        Ok(())
    }
}

fn read_if_exists(path: &Path) -> CoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::io(path, e)),
    }
}

fn is_missing_or_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Replace `path` by writing a sibling temporary file and renaming it over
fn write_atomic(path: &Path, contents: &str) -> CoreResult<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents).map_err(|e| CoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;
    Ok(())
}

fn append_text(path: &Path, text: &str) -> CoreResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CoreError::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| CoreError::io(path, e))
}
