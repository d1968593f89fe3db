use std::collections::{BTreeSet, HashSet};

use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, Local, NaiveDate};
use uuid::Uuid;

use crate::models::{
    AcneRisk, BreakoutRecord, DaySummary, MealGroup, MealRecord, MealType, UpdateBreakout,
    UpdateMeal,
};

/// In-memory record store. Everything here is lost when the process exits.
#[derive(Debug, Default)]
pub struct RecordStore {
    meals: Vec<MealRecord>,
    breakouts: Vec<BreakoutRecord>,
}

fn same_day(date: &DateTime<Local>, day: NaiveDate) -> bool {
    date.date_naive() == day
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Meals ---

    pub fn append_meal(&mut self, record: MealRecord) -> MealRecord {
        self.meals.push(record.clone());
        record
    }

    #[must_use]
    pub fn get_meal(&self, id: Uuid) -> Option<&MealRecord> {
        self.meals.iter().find(|m| m.id == id)
    }

    /// Replace the meal stored under `id`. The stored id never changes, even
    /// if `record` carries a different one.
    pub fn replace_meal(&mut self, id: Uuid, record: MealRecord) -> Result<MealRecord> {
        let Some(slot) = self.meals.iter_mut().find(|m| m.id == id) else {
            bail!("Meal {id} not found");
        };
        *slot = MealRecord { id, ..record };
        Ok(slot.clone())
    }

    pub fn update_meal(&mut self, id: Uuid, update: &UpdateMeal) -> Result<MealRecord> {
        let Some(current) = self.get_meal(id) else {
            bail!("Meal {id} not found");
        };
        let mut record = current.clone();
        if let Some(foods) = &update.foods {
            record.foods.clone_from(foods);
        }
        if let Some(selected) = &update.selected_ingredients {
            record.selected_ingredients.clone_from(selected);
        }
        if let Some(date) = update.date {
            record.date = date;
        }
        if let Some(meal_type) = update.meal_type {
            record.meal_type = meal_type;
        }
        self.replace_meal(id, record)
    }

    pub fn delete_meal(&mut self, id: Uuid) -> bool {
        let before = self.meals.len();
        self.meals.retain(|m| m.id != id);
        self.meals.len() != before
    }

    /// Meals eaten on `day` (local calendar day), earliest first.
    #[must_use]
    pub fn meals_for_day(&self, day: NaiveDate) -> Vec<MealRecord> {
        let mut meals: Vec<MealRecord> = self
            .meals
            .iter()
            .filter(|m| same_day(&m.date, day))
            .cloned()
            .collect();
        meals.sort_by_key(|m| m.date);
        meals
    }

    #[must_use]
    pub fn meal_count(&self) -> usize {
        self.meals.len()
    }

    // --- Breakouts ---

    pub fn append_breakout(&mut self, record: BreakoutRecord) -> BreakoutRecord {
        self.breakouts.push(record.clone());
        record
    }

    #[must_use]
    pub fn get_breakout(&self, id: Uuid) -> Option<&BreakoutRecord> {
        self.breakouts.iter().find(|b| b.id == id)
    }

    pub fn update_breakout(&mut self, id: Uuid, update: &UpdateBreakout) -> Result<BreakoutRecord> {
        let Some(slot) = self.breakouts.iter_mut().find(|b| b.id == id) else {
            bail!("Breakout {id} not found");
        };
        if let Some(date) = update.date {
            slot.date = date;
        }
        if let Some(severity) = update.severity {
            slot.severity = severity;
        }
        if let Some(notes) = &update.notes {
            slot.notes = notes.clone().filter(|n| !n.trim().is_empty());
        }
        Ok(slot.clone())
    }

    pub fn delete_breakout(&mut self, id: Uuid) -> bool {
        let before = self.breakouts.len();
        self.breakouts.retain(|b| b.id != id);
        self.breakouts.len() != before
    }

    #[must_use]
    pub fn breakouts_for_day(&self, day: NaiveDate) -> Vec<BreakoutRecord> {
        let mut breakouts: Vec<BreakoutRecord> = self
            .breakouts
            .iter()
            .filter(|b| same_day(&b.date, day))
            .cloned()
            .collect();
        breakouts.sort_by_key(|b| b.date);
        breakouts
    }

    // --- Calendar ---

    #[must_use]
    pub fn build_day_summary(&self, day: NaiveDate) -> DaySummary {
        let meals = self.meals_for_day(day);

        let mut seen = HashSet::new();
        let high_risk_ingredients: Vec<String> = meals
            .iter()
            .flat_map(|m| &m.selected_ingredients)
            .filter(|a| a.acne_risk == AcneRisk::High)
            .filter(|a| seen.insert(a.name.to_lowercase()))
            .map(|a| a.name.clone())
            .collect();

        let groups = MealType::ALL
            .iter()
            .filter_map(|&meal_type| {
                let entries: Vec<MealRecord> = meals
                    .iter()
                    .filter(|m| m.meal_type == meal_type)
                    .cloned()
                    .collect();
                if entries.is_empty() {
                    None
                } else {
                    Some(MealGroup {
                        meal_type,
                        entries,
                    })
                }
            })
            .collect();

        DaySummary {
            date: day,
            meals: groups,
            breakouts: self.breakouts_for_day(day),
            high_risk_ingredients,
        }
    }

    /// Days of the given month that have at least one meal or breakout.
    #[must_use]
    pub fn days_with_entries(&self, year: i32, month: u32) -> Vec<NaiveDate> {
        let meal_days = self.meals.iter().map(|m| m.date.date_naive());
        let breakout_days = self.breakouts.iter().map(|b| b.date.date_naive());
        meal_days
            .chain(breakout_days)
            .filter(|d| d.year() == year && d.month() == month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
