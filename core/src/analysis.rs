use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::models::{AcneRisk, DishAnalysis, IngredientAssessment};

/// Dish name used when the provider answers with a bare `ingredients` list.
pub const LEGACY_DISH_NAME: &str = "Meal";

#[derive(Debug, Deserialize)]
struct MealAnalysisPayload {
    meals: Vec<DishPayload>,
}

#[derive(Debug, Deserialize)]
struct DishPayload {
    dish: String,
    ingredients: Vec<IngredientPayload>,
}

#[derive(Debug, Deserialize)]
struct IngredientPayload {
    name: String,
    #[serde(rename = "acneRisk")]
    acne_risk: AcneRisk,
    explanation: String,
}

impl From<IngredientPayload> for IngredientAssessment {
    fn from(p: IngredientPayload) -> Self {
        IngredientAssessment::new(p.name, p.acne_risk, p.explanation)
    }
}

/// Remove a surrounding Markdown code fence (with optional language tag).
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag, if any, up to the end of the fence line.
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse a multi-dish analysis answer: strip code fences, decode strictly,
/// then fall back to walking the JSON tree.
///
/// Dishes that end up without ingredients are dropped on both the strict and
/// the tolerant path; an answer with no remaining dish is a parse error.
pub fn parse_meal_analysis(raw: &str) -> Result<Vec<DishAnalysis>, AnalysisError> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<MealAnalysisPayload>(cleaned) {
        Ok(payload) => {
            let dishes: Vec<DishAnalysis> = payload
                .meals
                .into_iter()
                .filter(|d| !d.ingredients.is_empty())
                .map(|d| DishAnalysis {
                    dish: d.dish,
                    ingredients: d.ingredients.into_iter().map(Into::into).collect(),
                })
                .collect();
            if !dishes.is_empty() {
                debug!(dishes = dishes.len(), "decoded meal analysis");
                return Ok(dishes);
            }
            debug!("strict decode found no dish with ingredients");
        }
        Err(e) => debug!(error = %e, "strict meal decode failed, trying tolerant extraction"),
    }

    let dishes = extract_dishes(cleaned);
    if dishes.is_empty() {
        return Err(AnalysisError::parse("no dishes with ingredients found", cleaned));
    }
    warn!(dishes = dishes.len(), "meal analysis recovered by tolerant extraction");
    Ok(dishes)
}

/// Parse a single-ingredient analysis answer.
pub fn parse_ingredient_analysis(raw: &str) -> Result<IngredientAssessment, AnalysisError> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<IngredientPayload>(cleaned) {
        Ok(payload) => return Ok(payload.into()),
        Err(e) => debug!(error = %e, "strict ingredient decode failed, trying tolerant extraction"),
    }

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| AnalysisError::parse(format!("invalid JSON: {e}"), cleaned))?;
    value
        .as_object()
        .and_then(extract_ingredient)
        .ok_or_else(|| {
            AnalysisError::parse(
                "expected name, acneRisk and explanation strings",
                cleaned,
            )
        })
}

fn extract_dishes(cleaned: &str) -> Vec<DishAnalysis> {
    let Ok(value) = serde_json::from_str::<Value>(cleaned) else {
        return Vec::new();
    };
    let Some(root) = value.as_object() else {
        return Vec::new();
    };

    if let Some(meals) = root.get("meals") {
        return meals
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(extract_dish)
                    .collect()
            })
            .unwrap_or_default();
    }

    // Older answers listed ingredients without dishes.
    let ingredients = root
        .get("ingredients")
        .map(extract_ingredients)
        .unwrap_or_default();
    if ingredients.is_empty() {
        return Vec::new();
    }
    vec![DishAnalysis {
        dish: LEGACY_DISH_NAME.to_string(),
        ingredients,
    }]
}

fn extract_dish(entry: &Map<String, Value>) -> Option<DishAnalysis> {
    let dish = entry.get("dish")?.as_str()?;
    let ingredients = extract_ingredients(entry.get("ingredients")?);
    if ingredients.is_empty() {
        return None;
    }
    Some(DishAnalysis {
        dish: dish.to_string(),
        ingredients,
    })
}

fn extract_ingredients(value: &Value) -> Vec<IngredientAssessment> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(extract_ingredient)
                .collect()
        })
        .unwrap_or_default()
}

fn extract_ingredient(entry: &Map<String, Value>) -> Option<IngredientAssessment> {
    let name = entry.get("name")?.as_str()?;
    let risk = entry.get("acneRisk")?.as_str()?;
    let explanation = entry.get("explanation")?.as_str()?;
    Some(IngredientAssessment::new(
        name,
        lenient_risk(risk),
        explanation,
    ))
}

/// Case-insensitive risk label; anything unrecognised counts as medium.
fn lenient_risk(label: &str) -> AcneRisk {
    label.parse().unwrap_or_else(|_| {
        warn!(label, "unknown acne risk label, assuming medium");
        AcneRisk::Medium
    })
}
