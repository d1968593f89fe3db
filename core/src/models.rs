use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub const RISK_LEVELS: &[&str] = &["low", "medium", "high"];

pub const SEVERITIES: &[&str] = &["mild", "moderate", "severe"];

/// Explanation attached to a manual ingredient whose lookup failed.
pub const ANALYSIS_FAILED_EXPLANATION: &str = "Analysis failed - using default risk level";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
}

impl MealType {
    /// Canonical display order for day summaries.
    pub const ALL: [MealType; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = anyhow::Error;

    fn from_str(meal: &str) -> Result<Self> {
        match meal.trim().to_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            _ => bail!(
                "Invalid meal type '{meal}'. Must be one of: {}",
                MEAL_TYPES.join(", ")
            ),
        }
    }
}

/// Acne risk of a single ingredient as judged by the analysis provider.
///
/// The in-flight `analyzing` state is deliberately not a variant here; see
/// [`crate::session::ManualIngredient::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcneRisk {
    Low,
    Medium,
    High,
}

impl AcneRisk {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for AcneRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcneRisk {
    type Err = anyhow::Error;

    fn from_str(risk: &str) -> Result<Self> {
        match risk.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => bail!(
                "Invalid risk level '{risk}'. Must be one of: {}",
                RISK_LEVELS.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(severity: &str) -> Result<Self> {
        match severity.trim().to_lowercase().as_str() {
            "mild" => Ok(Self::Mild),
            "moderate" => Ok(Self::Moderate),
            "severe" => Ok(Self::Severe),
            _ => bail!(
                "Invalid severity '{severity}'. Must be one of: {}",
                SEVERITIES.join(", ")
            ),
        }
    }
}

/// One analyzed ingredient. Two assessments with equal name and risk are
/// still distinct records; the id is what selection tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAssessment {
    pub id: Uuid,
    pub name: String,
    pub acne_risk: AcneRisk,
    pub explanation: String,
}

impl IngredientAssessment {
    #[must_use]
    pub fn new(name: impl Into<String>, acne_risk: AcneRisk, explanation: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            acne_risk,
            explanation: explanation.into(),
        }
    }

    /// Medium-risk stand-in used when a single-ingredient lookup fails.
    #[must_use]
    pub fn fallback(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            acne_risk: AcneRisk::Medium,
            explanation: ANALYSIS_FAILED_EXPLANATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishAnalysis {
    pub dish: String,
    pub ingredients: Vec<IngredientAssessment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: Uuid,
    pub foods: Vec<String>,
    pub selected_ingredients: Vec<IngredientAssessment>,
    pub date: DateTime<Local>,
    pub meal_type: MealType,
}

impl MealRecord {
    #[must_use]
    pub fn new(
        foods: Vec<String>,
        selected_ingredients: Vec<IngredientAssessment>,
        date: DateTime<Local>,
        meal_type: MealType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            foods,
            selected_ingredients,
            date,
            meal_type,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMeal {
    pub foods: Option<Vec<String>>,
    pub selected_ingredients: Option<Vec<IngredientAssessment>>,
    pub date: Option<DateTime<Local>>,
    pub meal_type: Option<MealType>,
}

impl UpdateMeal {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foods.is_none()
            && self.selected_ingredients.is_none()
            && self.date.is_none()
            && self.meal_type.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutRecord {
    pub id: Uuid,
    pub date: DateTime<Local>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

impl BreakoutRecord {
    #[must_use]
    pub fn new(date: DateTime<Local>, severity: Severity, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            severity,
            notes: notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateBreakout {
    pub date: Option<DateTime<Local>>,
    pub severity: Option<Severity>,
    pub notes: Option<Option<String>>,
}

impl UpdateBreakout {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.severity.is_none() && self.notes.is_none()
    }
}

// --- Calendar views ---

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal_type: MealType,
    pub entries: Vec<MealRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub meals: Vec<MealGroup>,
    pub breakouts: Vec<BreakoutRecord>,
    /// Distinct names of saved high-risk ingredients, first-seen order.
    pub high_risk_ingredients: Vec<String>,
}

impl DaySummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meals.is_empty() && self.breakouts.is_empty()
    }
}

/// Trim food names and drop blank ones. Fails when nothing is left.
pub fn validate_foods(foods: &[String]) -> Result<Vec<String>> {
    let cleaned: Vec<String> = foods
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if cleaned.is_empty() {
        bail!("At least one food is required");
    }
    Ok(cleaned)
}

/// Parse a timestamp given as RFC 3339 or as local wall-clock time
/// (`YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM`, seconds optional).
pub fn parse_local_datetime(s: &str) -> Result<DateTime<Local>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Local));
    }
    let naive = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok());
    let Some(naive) = naive else {
        bail!("Invalid date/time '{s}'. Use 'YYYY-MM-DD HH:MM' or RFC 3339");
    };
    match Local.from_local_datetime(&naive).earliest() {
        Some(dt) => Ok(dt),
        None => bail!("'{s}' does not exist in the local timezone"),
    }
}
