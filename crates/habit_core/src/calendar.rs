use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ledger::CompletionLedger;

pub const DAYS_PER_ROW: usize = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayCell {
    pub day: u32,
    pub date: NaiveDate,
    pub is_completed: bool,
    pub habit_count: u32,
}

impl DayCell {
    /// Count text shown under the day number; empty days show nothing.
    pub fn count_label(&self) -> Option<String> {
        (self.habit_count > 0).then(|| self.habit_count.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayCell>,
}

impl CalendarMonth {
    pub fn build(reference: NaiveDate, ledger: &CompletionLedger) -> Self {
        Self {
            year: reference.year(),
            month: reference.month(),
            days: month_days(reference, ledger),
        }
    }

    /// Grid rows of seven cells starting at day 1. The last row may be short.
    pub fn rows(&self) -> impl Iterator<Item = &[DayCell]> {
        self.days.chunks(DAYS_PER_ROW)
    }

    pub fn title(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => first.format("%B %Y").to_string(),
            None => format!("{:04}-{:02}", self.year, self.month),
        }
    }
}

/// Expands the month containing `reference` into annotated day cells.
pub fn month_days(reference: NaiveDate, ledger: &CompletionLedger) -> Vec<DayCell> {
    let year = reference.year();
    let month = reference.month();
    (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| DayCell {
            day: date.day(),
            date,
            is_completed: ledger.is_completed(date),
            habit_count: ledger.count(date),
        })
        .collect()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerDelta;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_length_follows_calendar() {
        let ledger = CompletionLedger::new();
        assert_eq!(month_days(date(2024, 1, 15), &ledger).len(), 31);
        assert_eq!(month_days(date(2024, 2, 1), &ledger).len(), 29);
        assert_eq!(month_days(date(2023, 2, 28), &ledger).len(), 28);
        assert_eq!(month_days(date(1900, 2, 10), &ledger).len(), 28);
        assert_eq!(month_days(date(2000, 2, 10), &ledger).len(), 29);
        assert_eq!(month_days(date(2024, 4, 30), &ledger).len(), 30);
    }

    #[test]
    fn cells_carry_completion_and_count() {
        let mut ledger = CompletionLedger::new();
        ledger.record(date(2024, 3, 5), LedgerDelta::Increment).unwrap();
        ledger.record(date(2024, 3, 5), LedgerDelta::Increment).unwrap();
        ledger.record(date(2024, 4, 5), LedgerDelta::Increment).unwrap();

        let cells = month_days(date(2024, 3, 20), &ledger);
        let fifth = cells[4];
        assert_eq!(fifth.day, 5);
        assert_eq!(fifth.date, date(2024, 3, 5));
        assert!(fifth.is_completed);
        assert_eq!(fifth.habit_count, 2);
        assert_eq!(fifth.count_label().as_deref(), Some("2"));

        assert_eq!(cells.iter().filter(|cell| cell.is_completed).count(), 1);
        assert_eq!(cells[5].count_label(), None);
    }

    #[test]
    fn rows_chunk_by_week_width() {
        let month = CalendarMonth::build(date(2024, 3, 1), &CompletionLedger::new());
        let rows: Vec<&[DayCell]> = month.rows().collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0][0].day, 1);
        assert_eq!(rows[4].len(), 3);
        assert_eq!(month.title(), "March 2024");
    }
}
