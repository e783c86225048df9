use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("habit name must not be empty")]
    EmptyName,
    #[error("habit index {index} is out of range (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("ledger count for {date} would drop below zero")]
    InconsistentState { date: NaiveDate },
    #[error("invalid date key `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
