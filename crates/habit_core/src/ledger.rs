use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LedgerDelta {
    Increment,
    Decrement,
}

/// Decides when a decrement drops a date from the completed-dates set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PresencePolicy {
    /// Every decrement removes the date, even while other habits are still
    /// complete for it.
    #[default]
    Unconditional,
    /// The date stays while its count is above zero.
    Counted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub count: u32,
}

/// Per-date completion counts, kept in insertion order, plus the set of
/// dates flagged as completed for calendar colouring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionLedger {
    entries: Vec<LedgerEntry>,
    completed_dates: BTreeSet<NaiveDate>,
    policy: PresencePolicy,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: PresencePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Builds a ledger from `(date, count)` pairs in the given order. Zero
    /// counts are skipped. Every date is marked completed.
    pub fn from_entries(entries: impl IntoIterator<Item = (NaiveDate, u32)>) -> Self {
        let mut ledger = Self::default();
        for (date, count) in entries {
            if count == 0 {
                continue;
            }
            match ledger.entry_index(date) {
                Some(idx) => {
                    let existing = &mut ledger.entries[idx].count;
                    *existing = existing.saturating_add(count);
                }
                None => ledger.entries.push(LedgerEntry { date, count }),
            }
            ledger.completed_dates.insert(date);
        }
        ledger
    }

    /// Applies one completion change for `date` and returns the new count.
    ///
    /// A decrement with nothing recorded is clamped: no entry is left behind
    /// and `InconsistentState` is returned after the presence rule is applied.
    pub fn record(&mut self, date: NaiveDate, delta: LedgerDelta) -> Result<u32> {
        match delta {
            LedgerDelta::Increment => {
                self.completed_dates.insert(date);
                let count = match self.entry_index(date) {
                    Some(idx) => {
                        let count = &mut self.entries[idx].count;
                        *count = count.saturating_add(1);
                        self.entries[idx].count
                    }
                    None => {
                        self.entries.push(LedgerEntry { date, count: 1 });
                        1
                    }
                };
                Ok(count)
            }
            LedgerDelta::Decrement => {
                let outcome = match self.entry_index(date) {
                    Some(idx) => {
                        let remaining = self.entries[idx].count - 1;
                        if remaining == 0 {
                            self.entries.remove(idx);
                        } else {
                            self.entries[idx].count = remaining;
                        }
                        Ok(remaining)
                    }
                    None => Err(TrackerError::InconsistentState { date }),
                };
                let remaining = outcome.as_ref().copied().unwrap_or(0);
                match self.policy {
                    PresencePolicy::Unconditional => {
                        self.completed_dates.remove(&date);
                    }
                    PresencePolicy::Counted => {
                        if remaining == 0 {
                            self.completed_dates.remove(&date);
                        }
                    }
                }
                outcome
            }
        }
    }

    pub fn count(&self, date: NaiveDate) -> u32 {
        self.entry_index(date)
            .map(|idx| self.entries[idx].count)
            .unwrap_or(0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entry_index(date).is_some()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn is_completed(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }

    pub fn completed_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.completed_dates.iter().copied()
    }

    pub fn total(&self) -> u32 {
        self.entries
            .iter()
            .fold(0u32, |total, entry| total.saturating_add(entry.count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_index(&self, date: NaiveDate) -> Option<usize> {
        self.entries.iter().position(|entry| entry.date == date)
    }
}

pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    let trimmed = key.trim();
    if trimmed.len() != 10 {
        return Err(TrackerError::InvalidDate(key.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_KEY_FORMAT)
        .map_err(|_| TrackerError::InvalidDate(key.to_string()))
}

pub fn format_date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}
