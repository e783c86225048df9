use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::HabitId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrackerChange {
    HabitAdded {
        id: HabitId,
    },
    HabitRenamed {
        id: HabitId,
    },
    HabitRemoved {
        id: HabitId,
    },
    CompletionChanged {
        id: HabitId,
        completed: bool,
        date: NaiveDate,
    },
}

/// Presentation layers implement this to re-render after a mutation.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self, change: &TrackerChange);
}
