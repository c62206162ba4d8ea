//! Free-text ingestion through an external text-completion collaborator

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use spendlog_codec::{extract_fields, format_date, parse_amount, parse_date, parse_time, RawEntry};
use spendlog_config::CompletionConfig;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::completion::OllamaCompletion;
use crate::error::{CoreError, CoreResult};
use crate::models::LedgerRecord;
use crate::periodic::PeriodicCandidate;
use crate::store::{ImportReport, LedgerStore};
use crate::summary::Summary;
use crate::time::now_minute;

pub const DEFAULT_CATEGORY: &str = "其他";
pub const DEFAULT_PRODUCT: &str = "未指定";

/// Completion reference type
pub type CompletionRef = Arc<dyn TextCompletion>;

/// Prompt in, free text out; no structure is promised
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> CoreResult<String>;
}

const CATEGORY_KEYS: &[&str] = &["category", "类别", "分类"];
const PRODUCT_KEYS: &[&str] = &["product", "商品", "item"];
const PRICE_KEYS: &[&str] = &["price", "amount", "金额", "价格"];
const DATE_KEYS: &[&str] = &["date", "日期"];
const TIME_KEYS: &[&str] = &["time", "时间"];
const REMARK_KEYS: &[&str] = &["remark", "备注", "note"];

/// Prompt asking for a single flat JSON object describing `text`
pub fn structuring_prompt(text: &str, today: NaiveDate) -> String {
    format!(
        "今天是 {today}。请把下面这条消费或收入描述整理成一个 JSON 对象，只包含以下键：\n\
         category（类别）、product（商品）、price（金额，支出为负数，收入为正数）、\n\
         date（yyyy-MM-dd）、time（HH:mm）、remark（备注）。\n\
         不要嵌套对象或数组，只输出这一个 JSON 对象。\n\n\
         描述：{text}",
        today = format_date(today),
        text = text.trim()
    )
}

fn pick<'a>(fields: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .map(String::as_str)
        .find(|value| !value.is_empty())
}

/// Turn a raw completion reply into a record
///
/// Prose around the first `{...}` span is ignored. Missing or unparseable
/// fields take their defaults; only a reply with no usable object fails.
pub fn record_from_reply(reply: &str, original: &str, now: NaiveDateTime) -> CoreResult<LedgerRecord> {
    let fields = extract_fields(reply).map_err(|e| CoreError::StructuringFailure {
        message: e.to_string(),
    })?;

    let amount = match pick(&fields, PRICE_KEYS) {
        Some(price) => parse_amount(price).unwrap_or_else(|| {
            log::warn!("completion returned unparseable price '{}', using 0", price);
            Decimal::ZERO
        }),
        None => Decimal::ZERO,
    };
    let date = pick(&fields, DATE_KEYS)
        .and_then(parse_date)
        .unwrap_or_else(|| now.date());
    let time = pick(&fields, TIME_KEYS)
        .and_then(parse_time)
        .unwrap_or_else(|| now.time());
    let remark = pick(&fields, REMARK_KEYS)
        .map(str::to_string)
        .unwrap_or_else(|| original.trim().to_string());

    Ok(LedgerRecord::new(
        pick(&fields, CATEGORY_KEYS).unwrap_or(DEFAULT_CATEGORY),
        pick(&fields, PRODUCT_KEYS).unwrap_or(DEFAULT_PRODUCT),
        amount,
        date,
        time,
        Some(remark),
    ))
}

/// Prompt asking for spending advice from a summary and upcoming charges
pub fn advice_prompt(summary: &Summary, upcoming: &[PeriodicCandidate]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "以下是我在 {} 的{}情况，合计 {}：",
        summary.description,
        match summary.kind {
            crate::summary::SummaryKind::Expenditure => "支出",
            crate::summary::SummaryKind::Income => "收入",
        },
        summary.total.normalize()
    );
    for category in &summary.categories {
        let _ = writeln!(
            prompt,
            "- {}: {} ({}%, {} 笔)",
            category.category,
            category.amount.normalize(),
            category.percentage.normalize(),
            category.count
        );
    }
    if !upcoming.is_empty() {
        let _ = writeln!(prompt, "\n近期可能出现的周期性账单：");
        for candidate in upcoming {
            let _ = writeln!(
                prompt,
                "- {} {}: 约 {}，每 {} 天一次，预计 {}（{} 天后）",
                candidate.category,
                candidate.product,
                candidate.amount.abs().normalize(),
                candidate.interval_days,
                format_date(candidate.next_date),
                candidate.days_until_next
            );
        }
    }
    prompt.push_str("\n请给出简短、具体的理财建议。");
    prompt
}

/// Drives the completion collaborator with a bounded wait
pub struct Ingestor {
    completion: CompletionRef,
    timeout: Duration,
}

impl Ingestor {
    pub fn new(completion: CompletionRef, timeout: Duration) -> Self {
        Self { completion, timeout }
    }

    /// Ingestor backed by an Ollama-compatible HTTP endpoint
    pub fn from_config(config: &CompletionConfig) -> CoreResult<Self> {
        let completion = OllamaCompletion::new(&config.endpoint, &config.model)?;
        Ok(Self::new(
            Arc::new(completion),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    async fn complete(&self, prompt: &str) -> CoreResult<String> {
        match tokio::time::timeout(self.timeout, self.completion.complete(prompt)).await {
            Ok(reply) => reply,
            Err(_) => {
                log::warn!("completion call exceeded {:?}", self.timeout);
                Err(CoreError::CompletionTimeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Structure a free-text description into a record; nothing is stored
    pub async fn structure_from_text(&self, text: &str) -> CoreResult<LedgerRecord> {
        if text.trim().is_empty() {
            return Err(CoreError::StructuringFailure {
                message: "description is empty".to_string(),
            });
        }
        let now = now_minute();
        let reply = self.complete(&structuring_prompt(text, now.date())).await?;
        log::debug!("completion reply: {}", reply);
        let record = record_from_reply(&reply, text, now)?;
        log::info!("structured '{}' as {}", text.trim(), record.id());
        Ok(record)
    }

    /// Free-text advice; the reply is returned as is
    pub async fn advise(&self, summary: &Summary, upcoming: &[PeriodicCandidate]) -> CoreResult<String> {
        let reply = self.complete(&advice_prompt(summary, upcoming)).await?;
        Ok(reply.trim().to_string())
    }

    /// Batch import of externally supplied rows, bypassing completion
    pub fn import_batch(&self, store: &LedgerStore, rows: Vec<RawEntry>) -> CoreResult<ImportReport> {
        store.import_batch(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorePaths;
    use crate::summary::{SummaryEngine, SummaryKind};
    use chrono::NaiveTime;
    use spendlog_config::CategoriesConfig;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedCompletion {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> CoreResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct SlowCompletion;

    #[async_trait]
    impl TextCompletion for SlowCompletion {
        async fn complete(&self, _prompt: &str) -> CoreResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 19)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_reply_with_surrounding_prose() {
        let reply = "好的，整理如下：\n{\"category\": \"餐饮\", \"product\": \"午饭\", \"price\": -25.5, \
                     \"date\": \"2024-05-18\", \"time\": \"12:10\", \"remark\": \"和同事\"}\n希望有帮助！";
        let record = record_from_reply(reply, "昨天中午和同事吃饭25.5", now()).unwrap();
        assert_eq!(record.category, "餐饮");
        assert_eq!(record.product, "午饭");
        assert_eq!(record.amount, "-25.5".parse::<Decimal>().unwrap());
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 5, 18).unwrap());
        assert_eq!(record.time, NaiveTime::from_hms_opt(12, 10, 0).unwrap());
        assert_eq!(record.remark, "和同事");
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let record = record_from_reply("{}", "  随便买了点东西 ", now()).unwrap();
        assert_eq!(record.category, DEFAULT_CATEGORY);
        assert_eq!(record.product, DEFAULT_PRODUCT);
        assert_eq!(record.amount, Decimal::ZERO);
        assert_eq!(record.date, now().date());
        assert_eq!(record.time, now().time());
        assert_eq!(record.remark, "随便买了点东西");
    }

    #[test]
    fn test_chinese_keys_and_bad_values() {
        let reply = r#"{"类别": "交通", "商品": "地铁", "金额": "¥4", "日期": "not a date"}"#;
        let record = record_from_reply(reply, "地铁4块", now()).unwrap();
        assert_eq!(record.category, "交通");
        assert_eq!(record.product, "地铁");
        assert_eq!(record.amount, Decimal::from(4));
        assert_eq!(record.date, now().date());
    }

    #[test]
    fn test_unstructurable_replies() {
        for reply in ["I cannot help with that.", "{\"category\": [\"a\", \"b\"]}", "{\"category\": "] {
            let err = record_from_reply(reply, "x", now()).unwrap_err();
            assert!(matches!(err, CoreError::StructuringFailure { .. }), "{}", reply);
        }
    }

    #[tokio::test]
    async fn test_structure_from_text_sends_description() {
        let completion = ScriptedCompletion::new(r#"{"category":"餐饮","product":"咖啡","price":"-18"}"#);
        let ingestor = Ingestor::new(completion.clone(), Duration::from_secs(5));
        let record = ingestor.structure_from_text("一杯咖啡18").await.unwrap();
        assert_eq!(record.product, "咖啡");
        assert_eq!(record.remark, "一杯咖啡18");

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("一杯咖啡18"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_calling_out() {
        let completion = ScriptedCompletion::new("{}");
        let ingestor = Ingestor::new(completion.clone(), Duration::from_secs(5));
        let err = ingestor.structure_from_text("   ").await.unwrap_err();
        assert!(matches!(err, CoreError::StructuringFailure { .. }));
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_completion_times_out() {
        let ingestor = Ingestor::new(Arc::new(SlowCompletion), Duration::from_millis(50));
        let err = ingestor.structure_from_text("打车30").await.unwrap_err();
        assert!(matches!(err, CoreError::CompletionTimeout { .. }));
    }

    #[tokio::test]
    async fn test_advise_includes_summary_and_upcoming() {
        let categories = CategoriesConfig::default();
        let day = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let records = vec![LedgerRecord::new(
            "通讯",
            "话费",
            Decimal::from(-50),
            day,
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            None,
        )];
        let summary = SummaryEngine::new(&categories)
            .summarize(&records, SummaryKind::Expenditure, Some("month"), None, None, day)
            .unwrap();
        let upcoming = vec![PeriodicCandidate {
            category: "通讯".to_string(),
            product: "话费".to_string(),
            amount: Decimal::from(-50),
            interval_days: 30,
            occurrences: 3,
            last_date: day,
            next_date: NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            days_until_next: 30,
        }];

        let completion = ScriptedCompletion::new("  少打电话。\n");
        let ingestor = Ingestor::new(completion.clone(), Duration::from_secs(5));
        let advice = ingestor.advise(&summary, &upcoming).await.unwrap();
        assert_eq!(advice, "少打电话。");

        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("通讯: 50"));
        assert!(prompts[0].contains("2024-04-19"));
    }

    #[test]
    fn test_import_batch_goes_to_store() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(StorePaths::in_dir(dir.path()));
        let ingestor = Ingestor::new(ScriptedCompletion::new("{}"), Duration::from_secs(1));
        let rows = vec![
            RawEntry::from_cells(["餐饮", "面包", "-8", "2024-05-01", "08:00", ""]),
            RawEntry::from_cells(["", "无类别", "-1", "2024-05-01", "", ""]),
        ];
        let report = ingestor.import_batch(&store, rows).unwrap();
        assert_eq!(report.entries_imported, 1);
        assert_eq!(report.entries_skipped, 1);
        assert_eq!(store.read_all().unwrap().len(), 1);
    }
}
