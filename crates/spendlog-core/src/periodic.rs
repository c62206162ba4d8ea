//! Recurring-charge detection
//!
//! Entries are grouped by (category, product). Within a group the gaps
//! between consecutive dates are clustered greedily: each gap joins the first
//! existing cluster whose representative is within the tolerance, or starts a
//! new one. The cluster with the most gaps wins, ties going to the smaller
//! representative. The representative must be a positive gap of at most a
//! year; the cluster's mean gap is the cycle length used to project the next
//! occurrence.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendlog_config::PeriodicConfig;
use std::collections::BTreeMap;

use crate::models::LedgerRecord;

/// Longest cycle still treated as recurring
pub const MAX_INTERVAL_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectOptions {
    pub horizon_days: i64,
    pub tolerance_days: i64,
    pub min_occurrences: usize,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            tolerance_days: 2,
            min_occurrences: 2,
        }
    }
}

impl From<&PeriodicConfig> for DetectOptions {
    fn from(config: &PeriodicConfig) -> Self {
        Self {
            horizon_days: config.horizon_days,
            tolerance_days: config.tolerance_days,
            min_occurrences: config.min_occurrences,
        }
    }
}

/// A (category, product) pair expected to recur soon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicCandidate {
    pub category: String,
    pub product: String,
    /// Amount of the most recent occurrence
    pub amount: Decimal,
    pub interval_days: i64,
    pub occurrences: usize,
    pub last_date: NaiveDate,
    pub next_date: NaiveDate,
    pub days_until_next: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GapCluster {
    representative: i64,
    count: usize,
    sum: i64,
}

impl GapCluster {
    /// Mean gap, rounded half up
    fn interval(&self) -> i64 {
        let count = self.count as i64;
        (2 * self.sum + count) / (2 * count)
    }
}

fn consecutive_gaps(dates: &[NaiveDate]) -> Vec<i64> {
    dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .collect()
}

fn cluster_gaps(gaps: &[i64], tolerance: i64) -> Vec<GapCluster> {
    let mut clusters: Vec<GapCluster> = Vec::new();
    for &gap in gaps {
        match clusters
            .iter_mut()
            .find(|c| (c.representative - gap).abs() <= tolerance)
        {
            Some(cluster) => {
                cluster.count += 1;
                cluster.sum += gap;
            }
            None => clusters.push(GapCluster {
                representative: gap,
                count: 1,
                sum: gap,
            }),
        }
    }
    clusters
}

fn dominant(clusters: &[GapCluster]) -> Option<GapCluster> {
    clusters.iter().copied().max_by(|a, b| {
        a.count
            .cmp(&b.count)
            .then_with(|| b.representative.cmp(&a.representative))
    })
}

/// Find recurring pairs whose next occurrence falls within the horizon
///
/// Overdue projections are dropped rather than clamped. The result is sorted
/// soonest first, then by category and product.
pub fn detect(
    records: &[LedgerRecord],
    today: NaiveDate,
    options: &DetectOptions,
) -> Vec<PeriodicCandidate> {
    let mut groups: BTreeMap<(&str, &str), Vec<&LedgerRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.category.as_str(), record.product.as_str()))
            .or_default()
            .push(record);
    }

    let mut candidates: Vec<PeriodicCandidate> = groups
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .filter_map(|((category, product), mut group)| {
            group.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
            let dates: Vec<NaiveDate> = group.iter().map(|r| r.date).collect();
            let clusters = cluster_gaps(&consecutive_gaps(&dates), options.tolerance_days);
            let winner = dominant(&clusters)?;
            let interval = winner.interval();

            if winner.count < options.min_occurrences
                || winner.representative <= 0
                || winner.representative > MAX_INTERVAL_DAYS
                || interval <= 0
            {
                log::debug!(
                    "{}/{}: no cycle (best {} days x{})",
                    category,
                    product,
                    interval,
                    winner.count
                );
                return None;
            }

            let last = group.last()?;
            let next_date = last.date + Duration::days(interval);
            let days_until_next = (next_date - today).num_days();
            if days_until_next <= 0 || days_until_next > options.horizon_days {
                return None;
            }

            Some(PeriodicCandidate {
                category: category.to_string(),
                product: product.to_string(),
                amount: last.amount,
                interval_days: interval,
                occurrences: group.len(),
                last_date: last.date,
                next_date,
                days_until_next,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.days_until_next
            .cmp(&b.days_until_next)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.product.cmp(&b.product))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rec(category: &str, product: &str, amount: i64, date: NaiveDate) -> LedgerRecord {
        LedgerRecord::new(
            category,
            product,
            Decimal::from(amount),
            date,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            None,
        )
    }

    fn phone_bills() -> Vec<LedgerRecord> {
        vec![
            rec("通讯", "话费", -50, d(2024, 1, 1)),
            rec("通讯", "话费", -50, d(2024, 2, 1)),
            rec("通讯", "话费", -58, d(2024, 3, 2)),
        ]
    }

    #[test]
    fn test_monthly_bill_detected() {
        let today = d(2024, 3, 20);
        let found = detect(&phone_bills(), today, &DetectOptions::default());
        assert_eq!(found.len(), 1);

        let candidate = &found[0];
        assert_eq!(candidate.category, "通讯");
        assert_eq!(candidate.product, "话费");
        assert_eq!(candidate.interval_days, 30);
        assert_eq!(candidate.next_date, d(2024, 4, 1));
        assert_eq!(candidate.days_until_next, (d(2024, 4, 1) - today).num_days());
        assert_eq!(candidate.days_until_next, 12);
        assert_eq!(candidate.amount, Decimal::from(-58));
        assert_eq!(candidate.occurrences, 3);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut records = phone_bills();
        records.reverse();
        let found = detect(&records, d(2024, 3, 20), &DetectOptions::default());
        assert_eq!(found[0].next_date, d(2024, 4, 1));
    }

    #[test]
    fn test_single_occurrence_ignored() {
        let records = vec![rec("住房", "房租", -3000, d(2024, 3, 1))];
        assert!(detect(&records, d(2024, 3, 10), &DetectOptions::default()).is_empty());
    }

    #[test]
    fn test_two_records_are_not_enough_by_default() {
        let records = vec![
            rec("住房", "房租", -3000, d(2024, 2, 1)),
            rec("住房", "房租", -3000, d(2024, 3, 1)),
        ];
        assert!(detect(&records, d(2024, 3, 10), &DetectOptions::default()).is_empty());
    }

    #[test]
    fn test_interval_over_a_year_ignored() {
        let records = vec![
            rec("教育", "学费", -5000, d(2020, 1, 1)),
            rec("教育", "学费", -5000, d(2021, 6, 1)),
            rec("教育", "学费", -5000, d(2022, 11, 1)),
        ];
        let options = DetectOptions {
            horizon_days: 1000,
            ..Default::default()
        };
        assert!(detect(&records, d(2023, 1, 1), &options).is_empty());
    }

    #[test]
    fn test_same_day_repeat_then_short_gap_is_not_a_cycle() {
        // Gaps [0, 2] cluster under 0 even though their mean rounds to 1
        let records = vec![
            rec("餐饮", "奶茶", -15, d(2024, 3, 1)),
            rec("餐饮", "奶茶", -15, d(2024, 3, 1)),
            rec("餐饮", "奶茶", -15, d(2024, 3, 3)),
        ];
        assert!(detect(&records, d(2024, 3, 3), &DetectOptions::default()).is_empty());
    }

    #[test]
    fn test_cycle_cap_applies_to_first_gap() {
        // Gaps [366, 364] cluster under 366 even though their mean is 365
        let records = vec![
            rec("保险", "车险", -4000, d(2024, 1, 1)),
            rec("保险", "车险", -4000, d(2025, 1, 1)),
            rec("保险", "车险", -4000, d(2025, 12, 31)),
        ];
        let options = DetectOptions {
            horizon_days: 400,
            ..Default::default()
        };
        assert!(detect(&records, d(2026, 1, 1), &options).is_empty());
    }

    #[test]
    fn test_yearly_cycle_at_cap_is_kept() {
        let records = vec![
            rec("保险", "车险", -4000, d(2022, 3, 1)),
            rec("保险", "车险", -4000, d(2023, 3, 1)),
            rec("保险", "车险", -4000, d(2024, 2, 29)),
        ];
        let found = detect(&records, d(2025, 2, 20), &DetectOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].interval_days, 365);
        assert_eq!(found[0].next_date, d(2025, 2, 28));
    }

    #[test]
    fn test_overdue_projection_excluded() {
        // Next bill was due 2024-04-01
        assert!(detect(&phone_bills(), d(2024, 4, 5), &DetectOptions::default()).is_empty());
        // Due today counts as overdue, not upcoming
        assert!(detect(&phone_bills(), d(2024, 4, 1), &DetectOptions::default()).is_empty());
    }

    #[test]
    fn test_beyond_horizon_excluded() {
        let options = DetectOptions {
            horizon_days: 10,
            ..Default::default()
        };
        assert!(detect(&phone_bills(), d(2024, 3, 20), &options).is_empty());
    }

    #[test]
    fn test_same_day_duplicates_do_not_form_a_cycle() {
        let records = vec![
            rec("餐饮", "咖啡", -18, d(2024, 3, 1)),
            rec("餐饮", "咖啡", -18, d(2024, 3, 1)),
            rec("餐饮", "咖啡", -18, d(2024, 3, 1)),
        ];
        assert!(detect(&records, d(2024, 3, 2), &DetectOptions::default()).is_empty());
    }

    #[test]
    fn test_sorted_soonest_first() {
        let mut records = phone_bills();
        records.extend([
            rec("娱乐", "视频会员", -25, d(2024, 2, 22)),
            rec("娱乐", "视频会员", -25, d(2024, 2, 29)),
            rec("娱乐", "视频会员", -25, d(2024, 3, 7)),
            rec("娱乐", "视频会员", -25, d(2024, 3, 14)),
        ]);
        let found = detect(&records, d(2024, 3, 20), &DetectOptions::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].product, "视频会员");
        assert_eq!(found[0].interval_days, 7);
        assert_eq!(found[0].days_until_next, 1);
        assert!(found.windows(2).all(|w| w[0].days_until_next <= w[1].days_until_next));
    }

    #[test]
    fn test_cluster_tie_prefers_smaller_gap() {
        let clusters = cluster_gaps(&[30, 7, 31, 8], 2);
        assert_eq!(clusters.len(), 2);
        let winner = dominant(&clusters).unwrap();
        assert_eq!(winner.representative, 7);
        assert_eq!(winner.interval(), 8);
    }

    #[test]
    fn test_greedy_clustering_joins_first_match() {
        // 3 is within 2 of both 1 and 5; it joins the first-seen cluster
        let clusters = cluster_gaps(&[1, 5, 3], 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn test_options_from_config() {
        let config = PeriodicConfig {
            horizon_days: 14,
            tolerance_days: 1,
            min_occurrences: 3,
        };
        let options = DetectOptions::from(&config);
        assert_eq!(options.horizon_days, 14);
        assert_eq!(options.min_occurrences, 3);
    }
}
