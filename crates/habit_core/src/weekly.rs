use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::ledger::CompletionLedger;

/// Fixed day-of-month bucket. Ignores weekdays and month length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeekOfMonth {
    First,
    Second,
    Third,
    Fourth,
}

impl WeekOfMonth {
    pub fn from_day(day: u32) -> Self {
        match day {
            0..=7 => WeekOfMonth::First,
            8..=14 => WeekOfMonth::Second,
            15..=21 => WeekOfMonth::Third,
            _ => WeekOfMonth::Fourth,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            WeekOfMonth::First => 1,
            WeekOfMonth::Second => 2,
            WeekOfMonth::Third => 3,
            WeekOfMonth::Fourth => 4,
        }
    }
}

impl fmt::Display for WeekOfMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Week {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekTotal {
    pub week: WeekOfMonth,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum WeeklyPolicy {
    /// Linear scan in ledger order; a week label seen again after another
    /// week starts a new bucket.
    #[default]
    Scan,
    /// One bucket per week label, in week order.
    Grouped,
}

pub fn weekly_totals(ledger: &CompletionLedger) -> Vec<WeekTotal> {
    let mut weeks = Vec::new();
    let mut current: Option<WeekOfMonth> = None;
    let mut accumulated = 0u32;

    for entry in ledger.entries() {
        let week = WeekOfMonth::from_day(entry.date.day());
        if current == Some(week) {
            accumulated = accumulated.saturating_add(entry.count);
            continue;
        }
        if let Some(previous) = current {
            if accumulated > 0 {
                weeks.push(WeekTotal {
                    week: previous,
                    total: accumulated,
                });
            }
        }
        current = Some(week);
        accumulated = entry.count;
    }

    if let Some(week) = current {
        if accumulated > 0 {
            weeks.push(WeekTotal {
                week,
                total: accumulated,
            });
        }
    }
    weeks
}

pub fn weekly_totals_with(ledger: &CompletionLedger, policy: WeeklyPolicy) -> Vec<WeekTotal> {
    match policy {
        WeeklyPolicy::Scan => weekly_totals(ledger),
        WeeklyPolicy::Grouped => grouped_totals(ledger),
    }
}

fn grouped_totals(ledger: &CompletionLedger) -> Vec<WeekTotal> {
    let mut totals = [0u32; 4];
    for entry in ledger.entries() {
        let week = WeekOfMonth::from_day(entry.date.day());
        let slot = &mut totals[usize::from(week.number() - 1)];
        *slot = slot.saturating_add(entry.count);
    }
    [
        WeekOfMonth::First,
        WeekOfMonth::Second,
        WeekOfMonth::Third,
        WeekOfMonth::Fourth,
    ]
    .into_iter()
    .zip(totals)
    .filter(|(_, total)| *total > 0)
    .map(|(week, total)| WeekTotal { week, total })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::parse_date_key;

    fn ledger(entries: &[(&str, u32)]) -> CompletionLedger {
        CompletionLedger::from_entries(
            entries
                .iter()
                .map(|(key, count)| (parse_date_key(key).unwrap(), *count)),
        )
    }

    fn pairs(totals: &[WeekTotal]) -> Vec<(String, u32)> {
        totals.iter().map(|t| (t.week.to_string(), t.total)).collect()
    }

    #[test]
    fn day_of_month_buckets() {
        assert_eq!(WeekOfMonth::from_day(1), WeekOfMonth::First);
        assert_eq!(WeekOfMonth::from_day(7), WeekOfMonth::First);
        assert_eq!(WeekOfMonth::from_day(8), WeekOfMonth::Second);
        assert_eq!(WeekOfMonth::from_day(14), WeekOfMonth::Second);
        assert_eq!(WeekOfMonth::from_day(15), WeekOfMonth::Third);
        assert_eq!(WeekOfMonth::from_day(21), WeekOfMonth::Third);
        assert_eq!(WeekOfMonth::from_day(22), WeekOfMonth::Fourth);
        assert_eq!(WeekOfMonth::from_day(31), WeekOfMonth::Fourth);
        assert_eq!(WeekOfMonth::Third.to_string(), "Week 3");
    }

    #[test]
    fn ordered_entries_merge_within_a_week() {
        let ledger = ledger(&[
            ("2024-03-01", 1),
            ("2024-03-06", 2),
            ("2024-03-09", 4),
            ("2024-03-29", 1),
        ]);
        assert_eq!(
            pairs(&weekly_totals(&ledger)),
            [
                ("Week 1".to_string(), 3),
                ("Week 2".to_string(), 4),
                ("Week 4".to_string(), 1),
            ]
        );
    }

    #[test]
    fn out_of_order_entries_are_not_merged() {
        let ledger = ledger(&[("2024-03-05", 2), ("2024-03-20", 3), ("2024-03-03", 1)]);
        assert_eq!(
            pairs(&weekly_totals(&ledger)),
            [
                ("Week 1".to_string(), 2),
                ("Week 3".to_string(), 3),
                ("Week 1".to_string(), 1),
            ]
        );
    }

    #[test]
    fn grouped_policy_merges_labels() {
        let ledger = ledger(&[("2024-03-05", 2), ("2024-03-20", 3), ("2024-03-03", 1)]);
        assert_eq!(
            pairs(&weekly_totals_with(&ledger, WeeklyPolicy::Grouped)),
            [("Week 1".to_string(), 3), ("Week 3".to_string(), 3)]
        );
    }

    #[test]
    fn buckets_ignore_month_boundaries() {
        let ledger = ledger(&[("2024-02-03", 1), ("2024-03-04", 2)]);
        assert_eq!(pairs(&weekly_totals(&ledger)), [("Week 1".to_string(), 3)]);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let ledger = ledger(&[("2024-03-05", u32::MAX), ("2024-03-06", 1), ("2024-03-07", 2)]);
        assert_eq!(
            weekly_totals(&ledger),
            [WeekTotal {
                week: WeekOfMonth::First,
                total: u32::MAX,
            }]
        );
        assert_eq!(
            weekly_totals_with(&ledger, WeeklyPolicy::Grouped),
            [WeekTotal {
                week: WeekOfMonth::First,
                total: u32::MAX,
            }]
        );
    }

    #[test]
    fn empty_ledger_has_no_weeks() {
        assert!(weekly_totals(&CompletionLedger::new()).is_empty());
        assert!(weekly_totals_with(&CompletionLedger::new(), WeeklyPolicy::Grouped).is_empty());
    }
}
