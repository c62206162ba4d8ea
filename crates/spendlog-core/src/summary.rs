//! Category totals over a date window

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendlog_config::CategoriesConfig;
use std::collections::HashMap;
use std::fmt;

use crate::error::CoreResult;
use crate::models::{Flow, LedgerRecord};
use crate::time::{resolve_window, Window};

/// Which category set a summary covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Expenditure,
    Income,
}

impl std::str::FromStr for SummaryKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expenditure" | "expense" | "expenses" | "支出" => Ok(SummaryKind::Expenditure),
            "income" | "收入" => Ok(SummaryKind::Income),
            _ => Err(format!("Invalid summary kind: {}", s)),
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryKind::Expenditure => write!(f, "expenditure"),
            SummaryKind::Income => write!(f, "income"),
        }
    }
}

impl SummaryKind {
    fn flow(&self) -> Flow {
        match self {
            SummaryKind::Expenditure => Flow::Expenditure,
            SummaryKind::Income => Flow::Income,
        }
    }
}

/// One category's share of a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: Decimal,
    /// Share of the window total, two decimal places
    pub percentage: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub kind: SummaryKind,
    pub period: String,
    pub window: Window,
    pub total: Decimal,
    /// Largest amount first
    pub categories: Vec<CategoryTotal>,
    /// Human-readable window, for diagnostics only
    pub description: String,
}

/// Income against expenditure for one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    pub period: String,
    pub window: Window,
    pub income: Decimal,
    pub expenditure: Decimal,
    pub net: Decimal,
    pub description: String,
}

/// Aggregates records using fixed category membership lists
///
/// Amounts are summed as magnitudes: the category decides whether a record is
/// income or expenditure, whatever sign it was stored with. Categories in
/// neither list are left out of both views.
pub struct SummaryEngine<'a> {
    categories: &'a CategoriesConfig,
}

impl<'a> SummaryEngine<'a> {
    pub fn new(categories: &'a CategoriesConfig) -> Self {
        Self { categories }
    }

    pub fn summarize(
        &self,
        records: &[LedgerRecord],
        kind: SummaryKind,
        period: Option<&str>,
        explicit_start: Option<NaiveDate>,
        explicit_end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> CoreResult<Summary> {
        let (label, window) = resolve_window(period, explicit_start, explicit_end, today)?;
        let flow = kind.flow();

        let mut totals: HashMap<&str, (Decimal, usize)> = HashMap::new();
        for record in records
            .iter()
            .filter(|r| r.flow(self.categories) == flow)
            .filter(|r| window.contains(&r.date))
        {
            let entry = totals.entry(record.category.as_str()).or_insert((Decimal::ZERO, 0));
            entry.0 += record.amount.abs();
            entry.1 += 1;
        }

        let total: Decimal = totals.values().map(|(amount, _)| *amount).sum();
        let mut categories: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(category, (amount, count))| CategoryTotal {
                category: category.to_string(),
                amount,
                percentage: percentage_of(amount, total),
                count,
            })
            .collect();
        categories.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.category.cmp(&b.category))
        });

        log::debug!(
            "{} summary for {}: {} categories, total {}",
            kind,
            window.description(),
            categories.len(),
            total
        );

        Ok(Summary {
            kind,
            period: label,
            window,
            total,
            categories,
            description: window.description(),
        })
    }

    pub fn overview(
        &self,
        records: &[LedgerRecord],
        period: Option<&str>,
        explicit_start: Option<NaiveDate>,
        explicit_end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> CoreResult<Overview> {
        let income = self.summarize(records, SummaryKind::Income, period, explicit_start, explicit_end, today)?;
        let expenditure =
            self.summarize(records, SummaryKind::Expenditure, period, explicit_start, explicit_end, today)?;
        Ok(Overview {
            period: income.period,
            window: income.window,
            income: income.total,
            expenditure: expenditure.total,
            net: income.total - expenditure.total,
            description: income.description,
        })
    }
}

fn percentage_of(amount: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (amount * Decimal::ONE_HUNDRED / total).round_dp(2)
}
