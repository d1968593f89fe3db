use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::models::{DishAnalysis, IngredientAssessment, MealRecord, MealType};
use crate::selection::{Bucket, SelectionIndex};
use crate::store::RecordStore;

/// A user-typed ingredient, either still being analyzed or resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ManualIngredient {
    /// Shown with risk `analyzing`. Never stored in a [`MealRecord`].
    Pending { id: Uuid, name: String },
    Resolved(IngredientAssessment),
}

impl ManualIngredient {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::Pending { id, .. } => *id,
            Self::Resolved(a) => a.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pending { name, .. } => name,
            Self::Resolved(a) => &a.name,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Risk label for display; pending entries read `analyzing`.
    #[must_use]
    pub fn risk_label(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "analyzing",
            Self::Resolved(a) => a.acne_risk.as_str(),
        }
    }
}

/// Handle for a manual ingredient lookup that was just started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIngredient {
    pub id: Uuid,
    pub name: String,
}

/// Handle for a dish analysis that was just started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub generation: u64,
    pub description: String,
}

/// State of one meal-logging flow. Analysis results come back through
/// [`LoggingSession::apply_analysis`] and
/// [`LoggingSession::resolve_manual_ingredient`], matched by a correlation key.
#[derive(Debug)]
pub struct LoggingSession {
    foods: Vec<String>,
    meal_type: MealType,
    date: DateTime<Local>,
    dishes: Vec<DishAnalysis>,
    manual: Vec<ManualIngredient>,
    selection: SelectionIndex,
    last_error: Option<String>,
    generation: u64,
}

impl LoggingSession {
    #[must_use]
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            foods: Vec::new(),
            meal_type: MealType::default(),
            date: now,
            dishes: Vec::new(),
            manual: Vec::new(),
            selection: SelectionIndex::new(),
            last_error: None,
            generation: 0,
        }
    }

    /// Start over. Results of work started before the reset are ignored.
    pub fn reset(&mut self, now: DateTime<Local>) {
        let generation = self.generation + 1;
        *self = Self::new(now);
        self.generation = generation;
    }

    // --- Foods and meal details ---

    pub fn add_food(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.foods.push(name.to_string());
        true
    }

    pub fn remove_food(&mut self, index: usize) -> Option<String> {
        (index < self.foods.len()).then(|| self.foods.remove(index))
    }

    #[must_use]
    pub fn foods(&self) -> &[String] {
        &self.foods
    }

    pub fn set_meal_type(&mut self, meal_type: MealType) {
        self.meal_type = meal_type;
    }

    #[must_use]
    pub fn meal_type(&self) -> MealType {
        self.meal_type
    }

    pub fn set_date(&mut self, date: DateTime<Local>) {
        self.date = date;
    }

    #[must_use]
    pub fn date(&self) -> DateTime<Local> {
        self.date
    }

    // --- Dish analysis ---

    /// Description to analyze, or `None` when no food has been entered.
    #[must_use]
    pub fn begin_analysis(&self) -> Option<AnalysisTicket> {
        if self.foods.is_empty() {
            return None;
        }
        Some(AnalysisTicket {
            generation: self.generation,
            description: self.foods.join(", "),
        })
    }

    /// Apply the outcome of a dish analysis. Returns `false` when the ticket
    /// predates the last reset.
    pub fn apply_analysis(
        &mut self,
        generation: u64,
        result: Result<Vec<DishAnalysis>, AnalysisError>,
    ) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale analysis");
            return false;
        }
        match result {
            Ok(dishes) => {
                self.selection.clear_dishes();
                self.dishes = dishes;
                self.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "meal analysis failed");
                self.last_error = Some(format!("Analysis failed: {e}"));
            }
        }
        true
    }

    #[must_use]
    pub fn dishes(&self) -> &[DishAnalysis] {
        &self.dishes
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // --- Selection ---

    pub fn toggle(&mut self, id: Uuid, bucket: &Bucket) {
        self.selection.toggle(id, bucket);
    }

    #[must_use]
    pub fn is_selected(&self, id: Uuid, bucket: &Bucket) -> bool {
        self.selection.is_selected(id, bucket)
    }

    /// Confirmed assessments: dish buckets in dish order, then the manual
    /// bucket. Pending manual entries are never part of the result.
    #[must_use]
    pub fn selected_ingredients(&self) -> Vec<IngredientAssessment> {
        let mut selected: Vec<IngredientAssessment> = self
            .dishes
            .iter()
            .flat_map(|d| {
                self.selection
                    .collect_selected(&Bucket::dish(d.dish.as_str()), &d.ingredients)
            })
            .collect();
        selected.extend(
            self.selection
                .collect_selected(&Bucket::Manual, &self.resolved_manual()),
        );
        selected
    }

    // --- Manual ingredients ---

    /// Add a placeholder for `name` and return the handle to analyze it with.
    ///
    /// Blank names and names already in the manual list (ignoring case) are
    /// rejected with `None`.
    pub fn add_manual_ingredient(&mut self, name: &str) -> Option<PendingIngredient> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let lower = name.to_lowercase();
        if self.manual.iter().any(|m| m.name().to_lowercase() == lower) {
            debug!(name, "manual ingredient already listed");
            return None;
        }
        let id = Uuid::new_v4();
        self.manual.push(ManualIngredient::Pending {
            id,
            name: name.to_string(),
        });
        Some(PendingIngredient {
            id,
            name: name.to_string(),
        })
    }

    /// Replace the placeholder `id` with the lookup result, or with a
    /// medium-risk default when the lookup failed.
    ///
    /// Returns `false` when the placeholder no longer exists.
    pub fn resolve_manual_ingredient(
        &mut self,
        id: Uuid,
        result: Result<IngredientAssessment, AnalysisError>,
    ) -> bool {
        let Some(slot) = self
            .manual
            .iter_mut()
            .find(|m| m.is_pending() && m.id() == id)
        else {
            debug!(%id, "no placeholder for resolved ingredient");
            return false;
        };
        let name = slot.name().to_string();
        let assessment = match result {
            Ok(a) => IngredientAssessment { id, ..a },
            Err(e) => {
                warn!(error = %e, name = %name, "ingredient analysis failed, using default risk");
                IngredientAssessment::fallback(id, name)
            }
        };
        *slot = ManualIngredient::Resolved(assessment);
        true
    }

    pub fn remove_manual_ingredient(&mut self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();
        let Some(pos) = self
            .manual
            .iter()
            .position(|m| m.name().to_lowercase() == lower)
        else {
            return false;
        };
        let removed = self.manual.remove(pos);
        self.selection.remove(removed.id());
        true
    }

    #[must_use]
    pub fn manual_ingredients(&self) -> &[ManualIngredient] {
        &self.manual
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.manual.iter().any(ManualIngredient::is_pending)
    }

    fn resolved_manual(&self) -> Vec<IngredientAssessment> {
        self.manual
            .iter()
            .filter_map(|m| match m {
                ManualIngredient::Resolved(a) => Some(a.clone()),
                ManualIngredient::Pending { .. } => None,
            })
            .collect()
    }

    // --- Lifecycle ---

    /// Turn the session into a [`MealRecord`], append it to `store` and reset.
    pub fn save(&mut self, store: &mut RecordStore, now: DateTime<Local>) -> Result<MealRecord> {
        let selected = self.selected_ingredients();
        if self.foods.is_empty() && selected.is_empty() {
            bail!("Nothing to save. Add a food or select an ingredient first");
        }
        let record = MealRecord::new(self.foods.clone(), selected, self.date, self.meal_type);
        let record = store.append_meal(record);
        self.reset(now);
        Ok(record)
    }

    pub fn cancel(&mut self, now: DateTime<Local>) {
        self.reset(now);
    }
}
