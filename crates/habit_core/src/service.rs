use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    calendar::{self, CalendarMonth, DayCell},
    clock::{Clock, LocalClock},
    error::{Result, TrackerError},
    habit::{Habit, HabitId, HabitStore},
    ledger::{format_date_key, CompletionLedger, LedgerDelta, PresencePolicy},
    notifications::{ChangeObserver, TrackerChange},
    weekly::{self, WeekTotal, WeeklyPolicy},
};

/// Everything the presentation layer reads after a mutation. Also the unit
/// of state a persistence layer would write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub today: NaiveDate,
    pub habits: Vec<Habit>,
    pub ledger: Vec<(String, u32)>,
    pub completed_dates: Vec<String>,
    pub completed_count: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    store: HabitStore,
    ledger: CompletionLedger,
}

pub struct HabitService {
    state: RwLock<TrackerState>,
    clock: Box<dyn Clock>,
    weekly_policy: WeeklyPolicy,
    observers: Vec<Box<dyn ChangeObserver>>,
}

pub struct HabitServiceBuilder {
    clock: Option<Box<dyn Clock>>,
    presence_policy: PresencePolicy,
    weekly_policy: WeeklyPolicy,
    observers: Vec<Box<dyn ChangeObserver>>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            presence_policy: PresencePolicy::default(),
            weekly_policy: WeeklyPolicy::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn with_presence_policy(mut self, policy: PresencePolicy) -> Self {
        self.presence_policy = policy;
        self
    }

    pub fn with_weekly_policy(mut self, policy: WeeklyPolicy) -> Self {
        self.weekly_policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ChangeObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> HabitService {
        debug!(
            presence = ?self.presence_policy,
            weekly = ?self.weekly_policy,
            observers = self.observers.len(),
            "building habit service"
        );
        HabitService {
            state: RwLock::new(TrackerState {
                store: HabitStore::new(),
                ledger: CompletionLedger::with_policy(self.presence_policy),
            }),
            clock: self.clock.unwrap_or_else(|| Box::new(LocalClock)),
            weekly_policy: self.weekly_policy,
            observers: self.observers,
        }
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    #[instrument(skip(self, name))]
    pub fn add_habit(&self, name: impl Into<String>) -> Result<HabitId> {
        let id = self.state.write().store.add(name)?;
        info!(%id, "habit added");
        self.notify(&TrackerChange::HabitAdded { id });
        Ok(id)
    }

    #[instrument(skip(self, new_name))]
    pub fn edit_habit(&self, index: usize, new_name: impl Into<String>) -> Result<()> {
        let id = {
            let mut state = self.state.write();
            state.store.edit(index, new_name)?;
            state.store.get(index)?.id
        };
        info!(%id, "habit renamed");
        self.notify(&TrackerChange::HabitRenamed { id });
        Ok(())
    }

    /// Removes the habit at `index`. Completions it already recorded stay in
    /// the ledger.
    #[instrument(skip(self))]
    pub fn delete_habit(&self, index: usize) -> Result<Habit> {
        let removed = self.state.write().store.delete(index)?;
        info!(id = %removed.id, "habit deleted");
        self.notify(&TrackerChange::HabitRemoved { id: removed.id });
        Ok(removed)
    }

    /// Sets the completion flag and records the transition against today.
    /// Returns `false` when the flag already had that value.
    #[instrument(skip(self))]
    pub fn set_completion(&self, index: usize, completed: bool) -> Result<bool> {
        let today = self.clock.today();
        let id = {
            let mut state = self.state.write();
            if !state.store.set_completion(index, completed)? {
                debug!("completion unchanged");
                return Ok(false);
            }
            let delta = if completed {
                LedgerDelta::Increment
            } else {
                LedgerDelta::Decrement
            };
            match state.ledger.record(today, delta) {
                Ok(count) => debug!(date = %today, count, "ledger updated"),
                Err(err @ TrackerError::InconsistentState { .. }) => {
                    warn!(%err, "ledger count clamped at zero");
                }
                Err(err) => return Err(err),
            }
            let habit = state.store.get_mut(index)?;
            if completed {
                habit.mark_completed_on(today);
            } else {
                habit.clear_completed_on(today);
            }
            habit.id
        };
        info!(%id, completed, "completion toggled");
        self.notify(&TrackerChange::CompletionChanged {
            id,
            completed,
            date: today,
        });
        Ok(true)
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.state.read().store.habits().to_vec()
    }

    pub fn habit(&self, index: usize) -> Result<Habit> {
        self.state.read().store.get(index).cloned()
    }

    pub fn position(&self, id: HabitId) -> Option<usize> {
        self.state.read().store.position(id)
    }

    pub fn completed_count(&self) -> usize {
        self.state.read().store.completed_count()
    }

    pub fn total(&self) -> usize {
        self.state.read().store.len()
    }

    pub fn ledger(&self) -> CompletionLedger {
        self.state.read().ledger.clone()
    }

    pub fn month_days(&self, reference: NaiveDate) -> Vec<DayCell> {
        calendar::month_days(reference, &self.state.read().ledger)
    }

    pub fn current_month(&self) -> CalendarMonth {
        CalendarMonth::build(self.clock.today(), &self.state.read().ledger)
    }

    pub fn weekly_totals(&self) -> Vec<WeekTotal> {
        weekly::weekly_totals_with(&self.state.read().ledger, self.weekly_policy)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.state.read();
        TrackerSnapshot {
            today: self.clock.today(),
            habits: state.store.habits().to_vec(),
            ledger: state
                .ledger
                .entries()
                .iter()
                .map(|entry| (format_date_key(entry.date), entry.count))
                .collect(),
            completed_dates: state.ledger.completed_dates().map(format_date_key).collect(),
            completed_count: state.store.completed_count(),
            total: state.store.len(),
        }
    }

    fn notify(&self, change: &TrackerChange) {
        for observer in &self.observers {
            observer.on_change(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::clock::FixedClock;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
    }

    fn service() -> HabitService {
        HabitService::builder()
            .with_clock(FixedClock(today()))
            .build()
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<TrackerChange>>>);

    impl ChangeObserver for Recorder {
        fn on_change(&self, change: &TrackerChange) {
            self.0.lock().push(change.clone());
        }
    }

    #[test]
    fn toggle_round_trip_leaves_no_trace() {
        let service = service();
        service.add_habit("Drink water").unwrap();
        assert!(service.set_completion(0, true).unwrap());
        assert!(service.set_completion(0, false).unwrap());

        let ledger = service.ledger();
        assert!(!ledger.contains(today()));
        assert!(!ledger.is_completed(today()));
        assert!(service.habit(0).unwrap().completed_dates.is_empty());
    }

    #[test]
    fn repeated_toggle_does_not_double_count() {
        let service = service();
        service.add_habit("Read").unwrap();
        service.set_completion(0, true).unwrap();
        assert!(!service.set_completion(0, true).unwrap());
        assert_eq!(service.ledger().count(today()), 1);
        assert_eq!(service.habit(0).unwrap().completed_dates, [today()]);
    }

    #[test]
    fn unchecking_without_todays_entry_is_clamped() {
        let service = service();
        service.add_habit("Walk").unwrap();
        // Flagged on an earlier day, so nothing is recorded for today.
        service.state.write().store.set_completion(0, true).unwrap();

        assert!(service.set_completion(0, false).unwrap());
        assert!(!service.habit(0).unwrap().is_completed);
        assert!(!service.ledger().contains(today()));
        assert!(service.ledger().is_empty());
    }

    #[test]
    fn observers_see_applied_changes_only() {
        let recorder = Recorder::default();
        let service = HabitService::builder()
            .with_clock(FixedClock(today()))
            .with_observer(Box::new(recorder.clone()))
            .build();

        let id = service.add_habit("Stretch").unwrap();
        assert!(service.add_habit(" ").is_err());
        service.set_completion(0, true).unwrap();
        service.set_completion(0, true).unwrap();
        service.edit_habit(0, "Stretch 10 min").unwrap();
        assert!(service.edit_habit(4, "nope").is_err());
        service.delete_habit(0).unwrap();

        let changes = recorder.0.lock().clone();
        assert_eq!(
            changes,
            [
                TrackerChange::HabitAdded { id },
                TrackerChange::CompletionChanged {
                    id,
                    completed: true,
                    date: today(),
                },
                TrackerChange::HabitRenamed { id },
                TrackerChange::HabitRemoved { id },
            ]
        );
    }

    #[test]
    fn delete_keeps_recorded_completions() {
        let service = service();
        service.add_habit("a").unwrap();
        service.set_completion(0, true).unwrap();
        service.delete_habit(0).unwrap();
        assert_eq!(service.total(), 0);
        assert_eq!(service.completed_count(), 0);
        assert_eq!(service.ledger().count(today()), 1);
    }

    #[test]
    fn snapshot_serializes_dates_as_keys() {
        let service = service();
        service.add_habit("Read").unwrap();
        service.set_completion(0, true).unwrap();
        let snapshot = service.snapshot();
        assert_eq!(snapshot.ledger, [("2024-03-12".to_string(), 1)]);
        assert_eq!(snapshot.completed_dates, ["2024-03-12".to_string()]);
        assert_eq!((snapshot.completed_count, snapshot.total), (1, 1));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["today"], "2024-03-12");
        assert_eq!(json["habits"][0]["completed_dates"][0], "2024-03-12");
        let back: TrackerSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
