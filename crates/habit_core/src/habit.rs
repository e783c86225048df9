use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Identity assigned when a habit is created. Survives renames and the
/// index shifts caused by deleting other habits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HabitId(pub u64);

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "habit-{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub is_completed: bool,
    pub completed_dates: Vec<NaiveDate>,
}

impl Habit {
    fn new(id: HabitId, name: String) -> Self {
        Self {
            id,
            name,
            is_completed: false,
            completed_dates: Vec::new(),
        }
    }

    pub(crate) fn mark_completed_on(&mut self, date: NaiveDate) {
        if !self.completed_dates.contains(&date) {
            self.completed_dates.push(date);
        }
    }

    pub(crate) fn clear_completed_on(&mut self, date: NaiveDate) {
        self.completed_dates.retain(|existing| *existing != date);
    }
}

/// Ordered list of habits addressed by position.
#[derive(Debug, Clone, Default)]
pub struct HabitStore {
    habits: Vec<Habit>,
    next_id: u64,
}

impl HabitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>) -> Result<HabitId> {
        let name = validate_name(name.into())?;
        self.next_id += 1;
        let id = HabitId(self.next_id);
        self.habits.push(Habit::new(id, name));
        Ok(id)
    }

    /// Renames the habit at `index`. Completion state and history are kept.
    pub fn edit(&mut self, index: usize, new_name: impl Into<String>) -> Result<()> {
        let new_name = validate_name(new_name.into())?;
        let habit = self.get_mut(index)?;
        habit.name = new_name;
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<Habit> {
        self.check_index(index)?;
        Ok(self.habits.remove(index))
    }

    /// Returns whether the flag actually changed.
    pub fn set_completion(&mut self, index: usize, completed: bool) -> Result<bool> {
        let habit = self.get_mut(index)?;
        if habit.is_completed == completed {
            return Ok(false);
        }
        habit.is_completed = completed;
        Ok(true)
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn get(&self, index: usize) -> Result<&Habit> {
        let len = self.habits.len();
        self.habits
            .get(index)
            .ok_or(TrackerError::IndexOutOfRange { index, len })
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut Habit> {
        let len = self.habits.len();
        self.habits
            .get_mut(index)
            .ok_or(TrackerError::IndexOutOfRange { index, len })
    }

    pub fn position(&self, id: HabitId) -> Option<usize> {
        self.habits.iter().position(|habit| habit.id == id)
    }

    pub fn len(&self) -> usize {
        self.habits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.habits.iter().filter(|habit| habit.is_completed).count()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.habits.len() {
            Ok(())
        } else {
            Err(TrackerError::IndexOutOfRange {
                index,
                len: self.habits.len(),
            })
        }
    }
}

fn validate_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(TrackerError::EmptyName);
    }
    Ok(name)
}
