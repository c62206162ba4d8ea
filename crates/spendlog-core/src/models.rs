//! Ledger entry model and composite entry ids

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendlog_codec::{format_date, format_time, parse_amount, parse_date, parse_time, RawEntry};
use spendlog_config::CategoriesConfig;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// One dated income or expenditure line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub category: String,
    pub product: String,
    /// Signed or unsigned depending on who wrote it; see [`LedgerRecord::flow`]
    pub amount: Decimal,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub remark: String,
}

/// Direction of money derived from category membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Income,
    Expenditure,
    Unclassified,
}

impl LedgerRecord {
    /// Create a record; an empty remark falls back to the product
    ///
    /// Text fields are trimmed here, the same way every file format reads
    /// them back.
    pub fn new(
        category: impl Into<String>,
        product: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
        time: NaiveTime,
        remark: Option<String>,
    ) -> Self {
        let product = product.into().trim().to_string();
        let remark = remark
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| product.clone());
        Self {
            category: category.into().trim().to_string(),
            product,
            amount,
            date,
            time,
            remark,
        }
    }

    /// Composite id used to address this record for update and delete
    pub fn id(&self) -> String {
        entry_id(self.date, &self.category, &self.product)
    }

    pub fn flow(&self, categories: &CategoriesConfig) -> Flow {
        if categories.is_income(&self.category) {
            Flow::Income
        } else if categories.is_expenditure(&self.category) {
            Flow::Expenditure
        } else {
            Flow::Unclassified
        }
    }

    pub fn to_raw(&self) -> RawEntry {
        RawEntry {
            category: self.category.clone(),
            product: self.product.clone(),
            price: self.amount.normalize().to_string(),
            date: format_date(self.date),
            time: format_time(self.time),
            remark: self.remark.clone(),
        }
    }

    /// Rebuild a stored row, defaulting fields that do not parse
    ///
    /// Amount becomes zero, date becomes today and time becomes now, so one
    /// damaged row never aborts a full read.
    pub fn from_raw_lenient(raw: &RawEntry, now: NaiveDateTime) -> Self {
        let amount = parse_amount(&raw.price).unwrap_or_else(|| {
            log::debug!("unparseable amount '{}' read as 0", raw.price);
            Decimal::ZERO
        });
        let date = parse_date(&raw.date).unwrap_or_else(|| {
            log::debug!("unparseable date '{}' read as today", raw.date);
            now.date()
        });
        let time = parse_time(&raw.time).unwrap_or(now.time());
        LedgerRecord::new(
            raw.category.clone(),
            raw.product.clone(),
            amount,
            date,
            time,
            Some(raw.remark.clone()),
        )
    }

    /// Parse an externally supplied row, rejecting it when a required field fails
    ///
    /// Category, price and date are required; a missing or malformed time
    /// falls back to `now`.
    pub fn from_import(raw: &RawEntry, now: NaiveDateTime) -> Option<Self> {
        if raw.category.is_empty() {
            return None;
        }
        let amount = parse_amount(&raw.price)?;
        let date = parse_date(&raw.date)?;
        let time = parse_time(&raw.time).unwrap_or_else(|| {
            if !raw.time.is_empty() {
                log::debug!("unparseable time '{}' imported as now", raw.time);
            }
            now.time()
        });
        Some(LedgerRecord::new(
            raw.category.clone(),
            raw.product.clone(),
            amount,
            date,
            time,
            Some(raw.remark.clone()),
        ))
    }
}

impl fmt::Display for LedgerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:<6} {:<12} {:>10}  {}",
            format_date(self.date),
            format_time(self.time),
            self.category,
            self.product,
            self.amount.normalize(),
            self.remark
        )
    }
}

/// `<date>_<category>_<product>`, percent-encoded
///
/// Underscores inside the category or product are not escaped, so the id of
/// such an entry only matches as a whole; see [`EntryKey::matches`].
pub fn entry_id(date: NaiveDate, category: &str, product: &str) -> String {
    urlencoding::encode(&plain_id(date, category, product)).into_owned()
}

fn plain_id(date: NaiveDate, category: &str, product: &str) -> String {
    format!("{}_{}_{}", format_date(date), category, product)
}

/// Parsed composite id; missing trailing segments match anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub date: NaiveDate,
    pub category: Option<String>,
    pub product: Option<String>,
    /// Decoded id text, compared whole against each entry's id
    full: String,
}

impl EntryKey {
    pub fn exact(date: NaiveDate, category: &str, product: &str) -> Self {
        Self {
            date,
            category: Some(category.to_string()),
            product: Some(product.to_string()),
            full: plain_id(date, category, product),
        }
    }

    /// Parse a percent-encoded (or plain) id
    ///
    /// The first two underscores split the segments, so a category containing
    /// `_` can only be addressed by its full id.
    pub fn parse(id: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidEntryId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let decoded = urlencoding::decode(id.trim()).map_err(|_| invalid("not valid UTF-8"))?;
        let mut segments = decoded.splitn(3, '_');
        let date = segments
            .next()
            .and_then(parse_date)
            .ok_or_else(|| invalid("date segment missing or malformed"))?;
        let category = segments.next().filter(|s| !s.is_empty()).map(str::to_string);
        let product = segments.next().filter(|s| !s.is_empty()).map(str::to_string);

        if category.is_none() && product.is_some() {
            return Err(invalid("product given without category"));
        }

        Ok(Self {
            date,
            category,
            product,
            full: decoded.into_owned(),
        })
    }

    /// Segment-wise prefix match, or an exact match on the whole id
    pub fn matches(&self, record: &LedgerRecord) -> bool {
        if record.date != self.date {
            return false;
        }
        let by_segments = self.category.as_ref().map_or(true, |c| *c == record.category)
            && self.product.as_ref().map_or(true, |p| *p == record.product);
        by_segments || plain_id(record.date, &record.category, &record.product) == self.full
    }
}

impl FromStr for EntryKey {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryKey::parse(s)
    }
}

/// Field-level update; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub category: Option<String>,
    pub product: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub remark: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Overwrite the set fields; the result is normalised like a new record
    pub fn apply(&self, record: &mut LedgerRecord) {
        *record = LedgerRecord::new(
            self.category.as_deref().unwrap_or(&record.category),
            self.product.as_deref().unwrap_or(&record.product),
            self.amount.unwrap_or(record.amount),
            self.date.unwrap_or(record.date),
            self.time.unwrap_or(record.time),
            Some(self.remark.clone().unwrap_or_else(|| record.remark.clone())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_remark_defaults_to_product() {
        let record = LedgerRecord::new("餐饮", "午饭", Decimal::from(25), d(2024, 5, 1), t(12, 0), None);
        assert_eq!(record.remark, "午饭");
        let record = LedgerRecord::new("餐饮", "午饭", Decimal::from(25), d(2024, 5, 1), t(12, 0), Some("  ".into()));
        assert_eq!(record.remark, "午饭");
    }

    #[test]
    fn test_entry_id_is_pure_and_encoded() {
        let a = entry_id(d(2024, 1, 1), "通讯", "话费");
        let b = entry_id(d(2024, 1, 1), "通讯", "话费");
        assert_eq!(a, b);
        assert!(a.starts_with("2024-01-01_"));
        assert!(!a.contains('通'));
        assert_eq!(urlencoding::decode(&a).unwrap(), "2024-01-01_通讯_话费");

        let record = LedgerRecord::new("通讯", "话费", Decimal::from(-50), d(2024, 1, 1), t(9, 0), None);
        assert_eq!(record.id(), a);
    }

    #[test]
    fn test_entry_key_partial_segments() {
        let record = LedgerRecord::new("通讯", "话费", Decimal::from(-50), d(2024, 1, 1), t(9, 0), None);

        let full = EntryKey::parse(&record.id()).unwrap();
        assert_eq!(full, EntryKey::exact(d(2024, 1, 1), "通讯", "话费"));
        assert!(full.matches(&record));

        let by_date: EntryKey = "2024-01-01".parse().unwrap();
        assert!(by_date.category.is_none());
        assert!(by_date.matches(&record));

        let by_category = EntryKey::parse(&urlencoding::encode("2024-01-01_通讯")).unwrap();
        assert!(by_category.matches(&record));

        let other = EntryKey::parse("2024-01-01_餐饮").unwrap();
        assert!(!other.matches(&record));
    }

    #[test]
    fn test_entry_key_product_may_contain_underscore() {
        let key = EntryKey::parse("2024-01-01_通讯_话费_副卡").unwrap();
        assert_eq!(key.product.as_deref(), Some("话费_副卡"));
    }

    #[test]
    fn test_category_with_underscore_matches_by_full_id() {
        let record = LedgerRecord::new("work_lunch", "面", Decimal::from(-20), d(2024, 1, 1), t(12, 0), None);
        let key = EntryKey::parse(&record.id()).unwrap();
        assert_eq!(key.category.as_deref(), Some("work"));
        assert!(key.matches(&record));
        assert!(EntryKey::exact(d(2024, 1, 1), "work_lunch", "面").matches(&record));

        let partial = EntryKey::parse("2024-01-01_work").unwrap();
        assert!(!partial.matches(&record));
    }

    #[test]
    fn test_text_fields_trimmed_on_create_and_patch() {
        let mut record = LedgerRecord::new(" 餐饮", "午饭 ", Decimal::from(25), d(2024, 5, 1), t(12, 0), Some(" note ".into()));
        assert_eq!((record.category.as_str(), record.product.as_str(), record.remark.as_str()), ("餐饮", "午饭", "note"));

        let patch = RecordPatch {
            category: Some("  交通 ".to_string()),
            remark: Some("   ".to_string()),
            ..Default::default()
        };
        patch.apply(&mut record);
        assert_eq!(record.category, "交通");
        assert_eq!(record.remark, "午饭");
    }

    #[test]
    fn test_entry_key_rejects_bad_ids() {
        assert!(matches!(EntryKey::parse("yesterday_餐饮"), Err(CoreError::InvalidEntryId { .. })));
        assert!(matches!(EntryKey::parse(""), Err(CoreError::InvalidEntryId { .. })));
        assert!(matches!(EntryKey::parse("2024-01-01__话费"), Err(CoreError::InvalidEntryId { .. })));
    }

    #[test]
    fn test_lenient_read_defaults() {
        let now = d(2024, 6, 1).and_time(t(8, 15));
        let raw = RawEntry::from_cells(vec!["餐饮", "早饭", "n/a", "someday", "", ""]);
        let record = LedgerRecord::from_raw_lenient(&raw, now);
        assert_eq!(record.amount, Decimal::ZERO);
        assert_eq!(record.date, d(2024, 6, 1));
        assert_eq!(record.time, t(8, 15));
        assert_eq!(record.remark, "早饭");
    }

    #[test]
    fn test_import_requires_price_and_date() {
        let now = d(2024, 6, 1).and_time(t(8, 15));
        let ok = RawEntry::from_cells(vec!["交通", "地铁", "4", "2024/05/30", "0830", "通勤"]);
        let record = LedgerRecord::from_import(&ok, now).unwrap();
        assert_eq!(record.date, d(2024, 5, 30));
        assert_eq!(record.time, t(8, 30));

        let bad_price = RawEntry::from_cells(vec!["交通", "地铁", "four", "2024-05-30", "08:30", ""]);
        assert!(LedgerRecord::from_import(&bad_price, now).is_none());
        let bad_date = RawEntry::from_cells(vec!["交通", "地铁", "4", "30.05.2024", "08:30", ""]);
        assert!(LedgerRecord::from_import(&bad_date, now).is_none());
        let no_category = RawEntry::from_cells(vec!["", "地铁", "4", "2024-05-30", "08:30", ""]);
        assert!(LedgerRecord::from_import(&no_category, now).is_none());
    }

    #[test]
    fn test_flow_by_category() {
        let categories = CategoriesConfig::default();
        let salary = LedgerRecord::new("工资", "五月", Decimal::from(8000), d(2024, 5, 10), t(9, 0), None);
        let lunch = LedgerRecord::new("餐饮", "午饭", Decimal::from(-25), d(2024, 5, 10), t(12, 0), None);
        let odd = LedgerRecord::new("捐赠", "红十字", Decimal::from(-100), d(2024, 5, 10), t(12, 0), None);
        assert_eq!(salary.flow(&categories), Flow::Income);
        assert_eq!(lunch.flow(&categories), Flow::Expenditure);
        assert_eq!(odd.flow(&categories), Flow::Unclassified);
    }

    #[test]
    fn test_patch_apply() {
        let mut record = LedgerRecord::new("餐饮", "午饭", Decimal::from(25), d(2024, 5, 1), t(12, 0), None);
        let patch = RecordPatch {
            amount: Some(Decimal::from(30)),
            remark: Some("加了饮料".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut record);
        assert_eq!(record.amount, Decimal::from(30));
        assert_eq!(record.remark, "加了饮料");
        assert_eq!(record.product, "午饭");
        assert!(RecordPatch::default().is_empty());
    }
}
