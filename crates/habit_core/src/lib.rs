pub mod calendar;
pub mod clock;
pub mod error;
pub mod habit;
pub mod ledger;
pub mod notifications;
pub mod service;
pub mod weekly;

pub use crate::error::TrackerError;
pub use crate::service::{HabitService, HabitServiceBuilder, TrackerSnapshot};
